//! Fired detection conditions.

use rust_decimal::Decimal;

use super::ids::InstrumentKey;

/// Kind of condition a cooldown counter guards.
///
/// Pump and dump are mutually exclusive within one evaluation cycle; the
/// open-interest condition is independent of both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Pump,
    Dump,
    OpenInterest,
}

/// Direction of an open-interest swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OiDirection {
    Increase,
    Decrease,
}

/// A condition that fired for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Pump {
        change_percent: Decimal,
        lookback: u32,
        old: Decimal,
        new: Decimal,
    },
    Dump {
        change_percent: Decimal,
        lookback: u32,
        old: Decimal,
        new: Decimal,
    },
    OpenInterest {
        direction: OiDirection,
        change_percent: Decimal,
        lookback: u32,
        old: Decimal,
        new: Decimal,
    },
}

impl Signal {
    pub fn kind(&self) -> ConditionKind {
        match self {
            Self::Pump { .. } => ConditionKind::Pump,
            Self::Dump { .. } => ConditionKind::Dump,
            Self::OpenInterest { .. } => ConditionKind::OpenInterest,
        }
    }

    /// Lookback that triggered the signal; becomes the cooldown length.
    pub fn lookback(&self) -> u32 {
        match self {
            Self::Pump { lookback, .. }
            | Self::Dump { lookback, .. }
            | Self::OpenInterest { lookback, .. } => *lookback,
        }
    }
}

/// A signal bound to the instrument it fired for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredAlert {
    pub instrument: InstrumentKey,
    pub signal: Signal,
    /// Ordinal of this alert for the (subscriber, instrument) pair today.
    pub alert_number: u32,
}
