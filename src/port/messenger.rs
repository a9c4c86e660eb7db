//! Messaging Gateway port.

use async_trait::async_trait;

use crate::domain::SubscriberId;

/// Structured outcome of one delivery attempt.
///
/// The dispatcher branches on these variants; no string matching on error
/// text anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered.
    Sent,
    /// Gateway flood control: pause this recipient for the given seconds,
    /// then redeliver.
    RetryAfter(u64),
    /// Recipient has blocked the bot; suppress until they re-subscribe.
    Blocked,
    /// Anything else. Logged and reported, message dropped.
    Failed(String),
}

/// Outbound message delivery.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver `text` (HTML) to a subscriber chat.
    async fn send(&self, recipient: SubscriberId, text: &str) -> SendOutcome;

    /// Deliver plain text to the operator channel. Failures here are
    /// logged by the implementation and never propagate.
    async fn send_operator(&self, text: &str);
}
