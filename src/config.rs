//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file with environment variable
//! overrides for sensitive values like `TELEGRAM_BOT_TOKEN`.

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::domain::ExchangeId;
use crate::error::{ConfigError, Result};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Alert recipients for deployments without an external subscriber
    /// store. Each entry starts from the stock thresholds.
    #[serde(default)]
    pub subscribers: Vec<SubscriberEntry>,
}

/// One alert recipient declared in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberEntry {
    /// Telegram chat id.
    pub chat_id: i64,
    /// "all" for unlimited, otherwise a daily cap per instrument.
    #[serde(default)]
    pub alert_limit: Option<String>,
}

/// Polling cycle and instrument-universe settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Exchanges to track.
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<ExchangeId>,
    /// Observations kept per instrument; also the deepest usable lookback.
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// Minutes between instrument-universe reinitializations.
    #[serde(default = "default_reinit_every_minutes")]
    pub reinit_every_minutes: u32,
    /// Attempts for transient gateway errors before abandoning the cycle.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    /// Fixed delay between retry attempts, in seconds.
    #[serde(default = "default_fetch_retry_delay_secs")]
    pub fetch_retry_delay_secs: u64,
    /// Whether to poll open interest alongside prices.
    #[serde(default = "default_true")]
    pub track_open_interest: bool,
}

fn default_exchanges() -> Vec<ExchangeId> {
    vec![ExchangeId::Binance, ExchangeId::Bybit]
}

fn default_window_capacity() -> usize {
    crate::domain::DEFAULT_WINDOW_CAPACITY
}

fn default_reinit_every_minutes() -> u32 {
    60
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_fetch_retry_delay_secs() -> u64 {
    5
}

const fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exchanges: default_exchanges(),
            window_capacity: default_window_capacity(),
            reinit_every_minutes: default_reinit_every_minutes(),
            fetch_retries: default_fetch_retries(),
            fetch_retry_delay_secs: default_fetch_retry_delay_secs(),
            track_open_interest: true,
        }
    }
}

/// Outbound rate limits.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Messages per wall-clock second across all recipients.
    #[serde(default = "default_global_per_second")]
    pub global_messages_per_second: u32,
    /// Messages per recipient per cycle before the rest are dropped.
    #[serde(default = "default_per_recipient_per_minute")]
    pub recipient_messages_per_minute: u32,
    /// Minimum gap between consecutive sends to one recipient, milliseconds.
    #[serde(default = "default_recipient_gap_ms")]
    pub recipient_gap_ms: u64,
    /// Minimum seconds between operator error digests.
    #[serde(default = "default_error_digest_interval_secs")]
    pub error_digest_interval_secs: u64,
}

fn default_global_per_second() -> u32 {
    30
}

fn default_per_recipient_per_minute() -> u32 {
    15
}

fn default_recipient_gap_ms() -> u64 {
    1000
}

fn default_error_digest_interval_secs() -> u64 {
    60
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            global_messages_per_second: default_global_per_second(),
            recipient_messages_per_minute: default_per_recipient_per_minute(),
            recipient_gap_ms: default_recipient_gap_ms(),
            error_digest_interval_secs: default_error_digest_interval_secs(),
        }
    }
}

/// Telegram gateway settings. The bot token always comes from the
/// `TELEGRAM_BOT_TOKEN` env var, never from the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    #[serde(skip)]
    pub bot_token: Option<String>,
    /// Chat that receives operator summaries and error digests.
    pub operator_chat_id: Option<i64>,
}

impl TelegramConfig {
    fn load_env(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.bot_token = Some(token);
        }
        if self.operator_chat_id.is_none() {
            self.operator_chat_id = std::env::var("TELEGRAM_OPERATOR_CHAT_ID")
                .ok()
                .and_then(|v| i64::from_str(&v).ok());
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.telegram.load_env();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.exchanges.is_empty() {
            return Err(ConfigError::MissingField {
                field: "engine.exchanges",
            }
            .into());
        }
        if self.engine.window_capacity < 2 {
            return Err(ConfigError::InvalidValue {
                field: "engine.window_capacity",
                reason: "need at least 2 observations to compare".into(),
            }
            .into());
        }
        if self.delivery.global_messages_per_second == 0 {
            return Err(ConfigError::InvalidValue {
                field: "delivery.global_messages_per_second",
                reason: "must be positive".into(),
            }
            .into());
        }
        if self.delivery.recipient_messages_per_minute == 0 {
            return Err(ConfigError::InvalidValue {
                field: "delivery.recipient_messages_per_minute",
                reason: "must be positive".into(),
            }
            .into());
        }
        Ok(())
    }

    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            delivery: DeliveryConfig::default(),
            telegram: TelegramConfig::default(),
            logging: LoggingConfig::default(),
            subscribers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_limits() {
        let config = Config::default();
        assert_eq!(config.engine.window_capacity, 30);
        assert_eq!(config.engine.reinit_every_minutes, 60);
        assert_eq!(config.delivery.global_messages_per_second, 30);
        assert_eq!(config.delivery.recipient_messages_per_minute, 15);
        assert_eq!(config.delivery.recipient_gap_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            exchanges = ["binance"]
            reinit_every_minutes = 30

            [delivery]
            recipient_messages_per_minute = 10

            [telegram]
            operator_chat_id = 111
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.exchanges, vec![ExchangeId::Binance]);
        assert_eq!(config.engine.reinit_every_minutes, 30);
        assert_eq!(config.delivery.recipient_messages_per_minute, 10);
        assert_eq!(config.delivery.global_messages_per_second, 30);
        assert_eq!(config.telegram.operator_chat_id, Some(111));
    }

    #[test]
    fn rejects_empty_exchange_list() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            exchanges = []
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_degenerate_window() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            window_capacity = 1
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
