use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Market Data Gateway errors.
///
/// Settlement is a permanent per-instrument condition: the instrument is
/// dropped from tracking rather than retried. Everything else is transient
/// for the current cycle.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Instrument is in delivery/settlement; drop it, do not retry.
    #[error("instrument {symbol} is in delivery/settlement")]
    Settlement { symbol: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected payload: {0}")]
    Payload(String),
}

impl MarketError {
    /// Transient errors are retried a bounded number of times, then
    /// abandoned for the cycle.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Settlement { .. })
    }
}

/// Rejected subscriber input. The message is user-facing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("please choose a number from {min} to {max} for the {field}")]
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("subscriber store error: {0}")]
    SubscriberStore(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_is_permanent() {
        let err = MarketError::Settlement {
            symbol: "BTCUSDT".into(),
        };
        assert!(!err.is_transient());
        assert!(MarketError::Payload("truncated".into()).is_transient());
    }

    #[test]
    fn settings_error_message_is_user_facing() {
        let err = SettingsError::OutOfRange {
            field: "pump period",
            min: 1,
            max: 30,
        };
        assert_eq!(
            err.to_string(),
            "please choose a number from 1 to 30 for the pump period"
        );
    }
}
