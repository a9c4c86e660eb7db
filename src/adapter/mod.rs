//! Outbound adapters: exchange gateways, message delivery, subscriber store.

mod binance;
mod bybit;
mod memory;
#[cfg(feature = "telegram")]
mod telegram;

pub use binance::BinanceGateway;
pub use bybit::BybitGateway;
pub use memory::MemorySubscriberStore;
#[cfg(feature = "telegram")]
pub use telegram::TelegramMessenger;
