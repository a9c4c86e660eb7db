//! Threshold evaluation over observation windows.
//!
//! Pure decision functions: they read a window and a subscriber's rules and
//! decide whether a condition fires. No side effects; cooldown and quota
//! bookkeeping lives in [`crate::domain::gate`].

use rust_decimal::Decimal;

use super::signal::{OiDirection, Signal};
use super::subscriber::DetectionRule;
use super::window::ObservationWindow;

/// Percentage change from `baseline` to `latest`.
///
/// `None` when the baseline is zero; a zero-valued historical sample makes
/// the change undefined and the condition non-firing.
pub fn percent_change(latest: Decimal, baseline: Decimal) -> Option<Decimal> {
    if baseline.is_zero() {
        return None;
    }
    Some((latest - baseline) / baseline * Decimal::ONE_HUNDRED)
}

/// Change at `lookback` cycles, or `None` when the window is too short or
/// the baseline is zero.
fn change_at(window: &ObservationWindow, lookback: u32) -> Option<(Decimal, Decimal, Decimal)> {
    let lookback = lookback as usize;
    // Fewer than lookback+1 observations: not evaluable, not an error.
    if window.len() <= lookback {
        return None;
    }
    let latest = window.latest()?;
    let baseline = window.at(lookback)?;
    percent_change(latest, baseline).map(|change| (change, baseline, latest))
}

/// Decide whether the pump rule fires.
pub fn pump_signal(window: &ObservationWindow, rule: &DetectionRule) -> Option<Signal> {
    let (change, old, new) = change_at(window, rule.lookback)?;
    (change >= rule.threshold).then(|| Signal::Pump {
        change_percent: change,
        lookback: rule.lookback,
        old,
        new,
    })
}

/// Decide whether the dump rule fires.
pub fn dump_signal(window: &ObservationWindow, rule: &DetectionRule) -> Option<Signal> {
    let (change, old, new) = change_at(window, rule.lookback)?;
    (change <= -rule.threshold).then(|| Signal::Dump {
        change_percent: change,
        lookback: rule.lookback,
        old,
        new,
    })
}

/// Decide whether the open-interest rule fires, in either direction.
pub fn oi_signal(window: &ObservationWindow, rule: &DetectionRule) -> Option<Signal> {
    let (change, old, new) = change_at(window, rule.lookback)?;
    (change.abs() >= rule.threshold).then(|| Signal::OpenInterest {
        direction: if change >= Decimal::ZERO {
            OiDirection::Increase
        } else {
            OiDirection::Decrease
        },
        change_percent: change,
        lookback: rule.lookback,
        old,
        new,
    })
}
