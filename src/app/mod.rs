//! Application layer: the cycle engine, alert delivery, message rendering.

mod dispatcher;
mod engine;
pub mod format;
mod retry;

pub use dispatcher::{CycleStats, Dispatcher};
pub use engine::Engine;
pub use retry::RetryPolicy;
