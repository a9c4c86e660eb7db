//! In-memory subscriber store.
//!
//! Reference adapter for single-process deployments and tests; the port is
//! async so a database-backed store can replace it without touching the
//! engine.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{InstrumentKey, SettingChange, SubscriberId, SubscriberSettings};
use crate::error::Result;
use crate::port::SubscriberStore;

#[derive(Default)]
pub struct MemorySubscriberStore {
    subscribers: RwLock<Vec<SubscriberSettings>>,
    ignored: RwLock<Vec<InstrumentKey>>,
}

impl MemorySubscriberStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, settings: SubscriberSettings) {
        let mut subscribers = self.subscribers.write();
        match subscribers.iter_mut().find(|s| s.id == settings.id) {
            Some(existing) => *existing = settings,
            None => subscribers.push(settings),
        }
    }

    pub fn remove(&self, id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    pub fn ignore(&self, instrument: InstrumentKey) {
        let mut ignored = self.ignored.write();
        if !ignored.contains(&instrument) {
            ignored.push(instrument);
        }
    }
}

#[async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn load_active(&self) -> Result<Vec<SubscriberSettings>> {
        Ok(self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.status.may_receive_alerts())
            .cloned()
            .collect())
    }

    async fn update_setting(&self, id: SubscriberId, change: SettingChange) -> Result<()> {
        let mut subscribers = self.subscribers.write();
        if let Some(subscriber) = subscribers.iter_mut().find(|s| s.id == id) {
            subscriber.apply(change);
        }
        Ok(())
    }

    async fn list_ignored(&self) -> Result<Vec<InstrumentKey>> {
        Ok(self.ignored.read().clone())
    }
}
