//! Subscriber Preference Store port.

use async_trait::async_trait;

use crate::domain::{InstrumentKey, SettingChange, SubscriberId, SubscriberSettings};
use crate::error::Result;

/// Read-mostly access to subscriber preferences and the instrument
/// ignore-list. The store owns the subscriber lifecycle; the engine only
/// reads snapshots and writes validated setting changes through it.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Settings for every active or trial subscriber.
    async fn load_active(&self) -> Result<Vec<SubscriberSettings>>;

    /// Persist one validated setting change.
    async fn update_setting(&self, id: SubscriberId, change: SettingChange) -> Result<()>;

    /// Externally maintained ignore-list of instruments.
    async fn list_ignored(&self) -> Result<Vec<InstrumentKey>>;
}
