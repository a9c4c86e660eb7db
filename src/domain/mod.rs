//! Exchange-agnostic domain logic.

mod evaluator;
mod gate;
mod ids;
mod signal;
mod subscriber;
mod window;

// Core domain types
pub use ids::{ExchangeId, InstrumentKey, SubscriberId, Symbol};

// Sliding-window store
pub use window::{ObservationWindow, WindowStore, DEFAULT_WINDOW_CAPACITY};

// Subscriber preferences
pub use subscriber::{
    parse_setting, AccountStatus, AlertLimit, DetectionRule, SettingChange, SettingField,
    SubscriberSettings, DEFAULT_ALERT_CAP,
};

// Threshold evaluator
pub use evaluator::{dump_signal, oi_signal, percent_change, pump_signal};

// Signals and gating
pub use gate::AlertGate;
pub use signal::{ConditionKind, FiredAlert, OiDirection, Signal};
