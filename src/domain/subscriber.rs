//! Per-subscriber alert preferences.
//!
//! Settings live in the external preference store; the engine holds a
//! read-mostly snapshot refreshed once per evaluation cycle, so a setting
//! change made mid-cycle applies from the next cycle onward.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::ids::{ExchangeId, SubscriberId};
use crate::error::SettingsError;

/// Numeric default stored for subscribers who never configured a cap.
/// Distinct from [`AlertLimit::Unlimited`], which is an explicit choice.
pub const DEFAULT_ALERT_CAP: u32 = 100;

/// Bounds accepted for subscriber-initiated setting changes.
pub const LOOKBACK_RANGE: std::ops::RangeInclusive<u32> = 1..=30;
pub const THRESHOLD_RANGE: std::ops::RangeInclusive<u32> = 1..=100;
pub const ALERT_CAP_RANGE: std::ops::RangeInclusive<u32> = 1..=20;

/// Daily per-instrument alert cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLimit {
    /// No cap; the subscriber asked for every alert.
    Unlimited,
    /// At most this many alerts per instrument per day.
    Capped(u32),
}

impl AlertLimit {
    pub fn allows(&self, sent_today: u32) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Capped(cap) => sent_today < *cap,
        }
    }
}

impl Default for AlertLimit {
    fn default() -> Self {
        Self::Capped(DEFAULT_ALERT_CAP)
    }
}

impl fmt::Display for AlertLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Capped(cap) if *cap == DEFAULT_ALERT_CAP => f.write_str("not set"),
            Self::Capped(cap) => write!(f, "{cap} per day"),
        }
    }
}

/// One pump/dump/OI detection rule: how far back to look and how big a move
/// counts, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionRule {
    /// Polling cycles back used as the comparison baseline.
    pub lookback: u32,
    /// Percentage-change magnitude that fires the rule.
    pub threshold: Decimal,
}

impl DetectionRule {
    pub fn new(lookback: u32, threshold: Decimal) -> Self {
        Self {
            lookback,
            threshold,
        }
    }
}

/// Account standing as reported by the preference store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountStatus {
    /// Paid or trial access currently active.
    pub active: bool,
    /// Inside a trial period.
    pub trial: bool,
    /// Operator-blocked; never receives alerts.
    pub blocked: bool,
}

impl AccountStatus {
    pub fn may_receive_alerts(&self) -> bool {
        self.active && !self.blocked
    }
}

/// Full per-subscriber record handed to the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberSettings {
    pub id: SubscriberId,
    pub pump: DetectionRule,
    pub dump: DetectionRule,
    pub open_interest: DetectionRule,
    pub alert_limit: AlertLimit,
    pub status: AccountStatus,
    binance_enabled: bool,
    bybit_enabled: bool,
}

impl SubscriberSettings {
    /// Defaults assigned on first interaction: pump 3 min / 5%,
    /// dump 2 min / 8%, OI 5 min / 10%, both exchanges enabled.
    pub fn with_defaults(id: SubscriberId) -> Self {
        Self {
            id,
            pump: DetectionRule::new(3, dec!(5)),
            dump: DetectionRule::new(2, dec!(8)),
            open_interest: DetectionRule::new(5, dec!(10)),
            alert_limit: AlertLimit::default(),
            status: AccountStatus {
                active: true,
                trial: true,
                blocked: false,
            },
            binance_enabled: true,
            bybit_enabled: true,
        }
    }

    pub fn exchange_enabled(&self, exchange: ExchangeId) -> bool {
        match exchange {
            ExchangeId::Binance => self.binance_enabled,
            ExchangeId::Bybit => self.bybit_enabled,
        }
    }

    pub fn set_exchange_enabled(&mut self, exchange: ExchangeId, enabled: bool) {
        match exchange {
            ExchangeId::Binance => self.binance_enabled = enabled,
            ExchangeId::Bybit => self.bybit_enabled = enabled,
        }
    }

    /// Apply a validated setting change.
    pub fn apply(&mut self, change: SettingChange) {
        match change {
            SettingChange::PumpLookback(v) => self.pump.lookback = v,
            SettingChange::PumpThreshold(v) => self.pump.threshold = v,
            SettingChange::DumpLookback(v) => self.dump.lookback = v,
            SettingChange::DumpThreshold(v) => self.dump.threshold = v,
            SettingChange::OiLookback(v) => self.open_interest.lookback = v,
            SettingChange::OiThreshold(v) => self.open_interest.threshold = v,
            SettingChange::AlertLimit(v) => self.alert_limit = v,
        }
    }
}

/// Which setting a subscriber is changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    PumpLookback,
    PumpThreshold,
    DumpLookback,
    DumpThreshold,
    OiLookback,
    OiThreshold,
    AlertLimit,
}

impl SettingField {
    fn label(&self) -> &'static str {
        match self {
            Self::PumpLookback => "pump period",
            Self::PumpThreshold => "pump percentage",
            Self::DumpLookback => "dump period",
            Self::DumpThreshold => "dump percentage",
            Self::OiLookback => "open interest period",
            Self::OiThreshold => "open interest percentage",
            Self::AlertLimit => "alert limit",
        }
    }
}

/// A validated setting change ready to apply and persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingChange {
    PumpLookback(u32),
    PumpThreshold(Decimal),
    DumpLookback(u32),
    DumpThreshold(Decimal),
    OiLookback(u32),
    OiThreshold(Decimal),
    AlertLimit(AlertLimit),
}

/// Validate raw subscriber input for a setting field.
///
/// Rejected input yields a user-facing [`SettingsError`] and no state change.
pub fn parse_setting(field: SettingField, input: &str) -> Result<SettingChange, SettingsError> {
    let input = input.trim();

    if field == SettingField::AlertLimit && input.eq_ignore_ascii_case("all") {
        return Ok(SettingChange::AlertLimit(AlertLimit::Unlimited));
    }

    let range = match field {
        SettingField::PumpLookback | SettingField::DumpLookback | SettingField::OiLookback => {
            LOOKBACK_RANGE
        }
        SettingField::PumpThreshold
        | SettingField::DumpThreshold
        | SettingField::OiThreshold => THRESHOLD_RANGE,
        SettingField::AlertLimit => ALERT_CAP_RANGE,
    };

    let out_of_range = || SettingsError::OutOfRange {
        field: field.label(),
        min: *range.start(),
        max: *range.end(),
    };

    match field {
        SettingField::PumpThreshold | SettingField::DumpThreshold | SettingField::OiThreshold => {
            // Thresholds accept fractional percentages, e.g. "7.5".
            let value: Decimal = input.parse().map_err(|_| out_of_range())?;
            if value < Decimal::from(*range.start()) || value > Decimal::from(*range.end()) {
                return Err(out_of_range());
            }
            Ok(match field {
                SettingField::PumpThreshold => SettingChange::PumpThreshold(value),
                SettingField::DumpThreshold => SettingChange::DumpThreshold(value),
                _ => SettingChange::OiThreshold(value),
            })
        }
        _ => {
            let value: u32 = input.parse().map_err(|_| out_of_range())?;
            if !range.contains(&value) {
                return Err(out_of_range());
            }
            Ok(match field {
                SettingField::PumpLookback => SettingChange::PumpLookback(value),
                SettingField::DumpLookback => SettingChange::DumpLookback(value),
                SettingField::OiLookback => SettingChange::OiLookback(value),
                _ => SettingChange::AlertLimit(AlertLimit::Capped(value)),
            })
        }
    }
}
