//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports are the seams between the engine and its external collaborators:
//! the exchange market-data gateways, the messaging gateway, the subscriber
//! preference store, and the wall clock. Adapters implement them.

mod clock;
mod market;
mod messenger;
mod subscriber;

pub use clock::{until_next_minute, Clock, SystemClock};
pub use market::MarketData;
pub use messenger::{Messenger, SendOutcome};
pub use subscriber::SubscriberStore;
