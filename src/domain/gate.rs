//! Cooldown suppression and daily alert quotas.
//!
//! The gate sits between the evaluator and the dispatcher: it decides whether
//! a subscriber/instrument pair may be evaluated at all this cycle, whether a
//! specific condition is still cooling down, and records fires so the same
//! condition stays quiet for its lookback length.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::ids::{InstrumentKey, SubscriberId};
use super::signal::ConditionKind;
use super::subscriber::SubscriberSettings;

type CooldownKey = (InstrumentKey, SubscriberId, ConditionKind);

/// Cooldown counters plus daily per-(subscriber, instrument) alert counts.
///
/// Not internally synchronized; the engine mutates it only inside the
/// evaluation phase of a cycle.
pub struct AlertGate {
    /// Remaining suppressed cycles per condition. Never negative.
    cooldowns: HashMap<CooldownKey, u32>,
    /// Alerts sent today per (subscriber, instrument).
    daily: HashMap<(SubscriberId, InstrumentKey), u32>,
    /// Date of the last process-wide daily reset.
    last_reset: NaiveDate,
}

impl AlertGate {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            cooldowns: HashMap::new(),
            daily: HashMap::new(),
            last_reset: today,
        }
    }

    /// Start an evaluation cycle: lazily reset daily counters when the
    /// calendar date advanced, then decrement every live cooldown by one.
    ///
    /// The daily reset is global (all subscribers, all instruments) and
    /// happens at most once per date change.
    pub fn begin_cycle(&mut self, today: NaiveDate) {
        if today != self.last_reset {
            self.daily.clear();
            self.last_reset = today;
        }
        for counter in self.cooldowns.values_mut() {
            *counter = counter.saturating_sub(1);
        }
        self.cooldowns.retain(|_, counter| *counter > 0);
    }

    /// Whether the subscriber may be evaluated for this instrument at all:
    /// account standing, exchange enablement, daily cap.
    pub fn admits(&self, subscriber: &SubscriberSettings, instrument: &InstrumentKey) -> bool {
        if !subscriber.status.may_receive_alerts() {
            return false;
        }
        if !subscriber.exchange_enabled(instrument.exchange) {
            return false;
        }
        subscriber.alert_limit.allows(self.sent_today(subscriber.id, instrument))
    }

    /// Whether a specific condition is out of cooldown.
    pub fn condition_ready(
        &self,
        instrument: &InstrumentKey,
        subscriber: SubscriberId,
        kind: ConditionKind,
    ) -> bool {
        self.cooldown(instrument, subscriber, kind) == 0
    }

    /// Record a fire: cooldown := triggering lookback, daily counter += 1.
    /// Returns the alert's ordinal for today.
    pub fn record_fire(
        &mut self,
        instrument: &InstrumentKey,
        subscriber: SubscriberId,
        kind: ConditionKind,
        lookback: u32,
    ) -> u32 {
        self.cooldowns
            .insert((instrument.clone(), subscriber, kind), lookback);
        let count = self.daily.entry((subscriber, instrument.clone())).or_insert(0);
        *count += 1;
        *count
    }

    pub fn cooldown(
        &self,
        instrument: &InstrumentKey,
        subscriber: SubscriberId,
        kind: ConditionKind,
    ) -> u32 {
        self.cooldowns
            .get(&(instrument.clone(), subscriber, kind))
            .copied()
            .unwrap_or(0)
    }

    pub fn sent_today(&self, subscriber: SubscriberId, instrument: &InstrumentKey) -> u32 {
        self.daily
            .get(&(subscriber, instrument.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Garbage-collect all state for an instrument that left the universe.
    pub fn drop_instrument(&mut self, instrument: &InstrumentKey) {
        self.cooldowns.retain(|(key, _, _), _| key != instrument);
        self.daily.retain(|(_, key), _| key != instrument);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::ExchangeId;
    use crate::domain::subscriber::AlertLimit;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn btc() -> InstrumentKey {
        InstrumentKey::new(ExchangeId::Binance, "BTCUSDT")
    }

    fn subscriber() -> SubscriberSettings {
        SubscriberSettings::with_defaults(SubscriberId::new(7))
    }

    #[test]
    fn cooldown_counts_down_and_reopens_after_lookback_cycles() {
        let mut gate = AlertGate::new(date("2026-08-31"));
        let sub = SubscriberId::new(7);
        let key = btc();

        gate.record_fire(&key, sub, ConditionKind::Pump, 3);
        assert_eq!(gate.cooldown(&key, sub, ConditionKind::Pump), 3);
        assert!(!gate.condition_ready(&key, sub, ConditionKind::Pump));

        for remaining in [2, 1, 0] {
            gate.begin_cycle(date("2026-08-31"));
            assert_eq!(gate.cooldown(&key, sub, ConditionKind::Pump), remaining);
        }
        assert!(gate.condition_ready(&key, sub, ConditionKind::Pump));
    }

    #[test]
    fn cooldowns_are_independent_per_condition_kind() {
        let mut gate = AlertGate::new(date("2026-08-31"));
        let sub = SubscriberId::new(7);
        let key = btc();

        gate.record_fire(&key, sub, ConditionKind::Pump, 5);
        assert!(gate.condition_ready(&key, sub, ConditionKind::Dump));
        assert!(gate.condition_ready(&key, sub, ConditionKind::OpenInterest));
    }

    #[test]
    fn daily_counter_resets_only_on_date_change() {
        let mut gate = AlertGate::new(date("2026-08-31"));
        let sub = SubscriberId::new(7);
        let key = btc();

        gate.record_fire(&key, sub, ConditionKind::Pump, 1);
        gate.begin_cycle(date("2026-08-31"));
        gate.record_fire(&key, sub, ConditionKind::Pump, 1);
        assert_eq!(gate.sent_today(sub, &key), 2);

        // Same date: no reset, however many cycles pass.
        gate.begin_cycle(date("2026-08-31"));
        assert_eq!(gate.sent_today(sub, &key), 2);

        // New date: reset exactly once, for everyone.
        gate.begin_cycle(date("2026-09-01"));
        assert_eq!(gate.sent_today(sub, &key), 0);
    }

    #[test]
    fn capped_subscriber_is_refused_at_limit() {
        let mut gate = AlertGate::new(date("2026-08-31"));
        let mut sub = subscriber();
        sub.alert_limit = AlertLimit::Capped(2);
        let key = btc();

        assert!(gate.admits(&sub, &key));
        gate.record_fire(&key, sub.id, ConditionKind::Pump, 1);
        gate.record_fire(&key, sub.id, ConditionKind::Dump, 1);
        assert!(!gate.admits(&sub, &key));

        // Next day the cap opens again.
        gate.begin_cycle(date("2026-09-01"));
        assert!(gate.admits(&sub, &key));
    }

    #[test]
    fn admits_honors_status_and_exchange_flags() {
        let gate = AlertGate::new(date("2026-08-31"));
        let key = btc();

        let mut blocked = subscriber();
        blocked.status.blocked = true;
        assert!(!gate.admits(&blocked, &key));

        let mut inactive = subscriber();
        inactive.status.active = false;
        assert!(!gate.admits(&inactive, &key));

        let mut no_binance = subscriber();
        no_binance.set_exchange_enabled(ExchangeId::Binance, false);
        assert!(!gate.admits(&no_binance, &key));
        assert!(gate.admits(
            &no_binance,
            &InstrumentKey::new(ExchangeId::Bybit, "BTCUSDT")
        ));
    }

    #[test]
    fn drop_instrument_clears_cooldowns_and_daily_counts() {
        let mut gate = AlertGate::new(date("2026-08-31"));
        let sub = SubscriberId::new(7);
        let key = btc();

        gate.record_fire(&key, sub, ConditionKind::Pump, 5);
        gate.drop_instrument(&key);
        assert_eq!(gate.cooldown(&key, sub, ConditionKind::Pump), 0);
        assert_eq!(gate.sent_today(sub, &key), 0);
    }
}
