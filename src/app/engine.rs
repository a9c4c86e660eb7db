//! The polling/evaluate/dispatch cycle and the reinitialization scheduler.
//!
//! One cycle per wall-clock minute: poll tracked instruments, evaluate every
//! (subscriber, instrument) pair against the freshly recorded windows, then
//! drain the delivery queue. On its own schedule (hourly, plus once at
//! startup) a reinitialization cycle replaces the polling phase: it refreshes
//! the tradable universe, drops delisted/ignored instruments, and seeds new
//! ones with a single observation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::{DeliveryConfig, EngineConfig};
use crate::domain::{
    dump_signal, oi_signal, pump_signal, AlertGate, ConditionKind, ExchangeId, FiredAlert,
    InstrumentKey, SubscriberSettings, Symbol, WindowStore,
};
use crate::error::{MarketError, Result};
use crate::port::{until_next_minute, Clock, MarketData, Messenger, SubscriberStore};

use super::dispatcher::Dispatcher;
use super::format::{render_alert, render_cycle_summary, render_error_digest, render_reinit_summary};
use super::retry::RetryPolicy;

/// Delay before retrying a cycle after an unexpected cycle-level error.
const CYCLE_RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct Engine {
    config: EngineConfig,
    store: WindowStore,
    gate: AlertGate,
    dispatcher: Dispatcher,
    markets: Vec<Arc<dyn MarketData>>,
    subscribers: Arc<dyn SubscriberStore>,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    /// Snapshot of subscriber settings used for the current cycle. Replaced
    /// atomically between cycles so the evaluator never sees a half-updated
    /// record.
    snapshot: Vec<SubscriberSettings>,
    last_reinit: Option<DateTime<Utc>>,
    /// Transient fetch errors collected during the cycle.
    fetch_errors: Vec<String>,
    last_error_digest: Option<DateTime<Utc>>,
    error_digest_interval: chrono::Duration,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        delivery: DeliveryConfig,
        markets: Vec<Arc<dyn MarketData>>,
        subscribers: Arc<dyn SubscriberStore>,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let retry = RetryPolicy::new(
            config.fetch_retries,
            Duration::from_secs(config.fetch_retry_delay_secs),
        );
        let error_digest_interval =
            chrono::Duration::seconds(delivery.error_digest_interval_secs as i64);
        Self {
            store: WindowStore::new(config.window_capacity),
            gate: AlertGate::new(clock.now().date_naive()),
            dispatcher: Dispatcher::new(delivery, clock.clone()),
            config,
            markets,
            subscribers,
            messenger,
            clock,
            retry,
            snapshot: Vec::new(),
            last_reinit: None,
            fetch_errors: Vec::new(),
            last_error_digest: None,
            error_digest_interval,
        }
    }

    /// Run cycles until the surrounding task is cancelled (shutdown signal).
    pub async fn run(mut self) -> Result<()> {
        // Align to the next minute boundary before the first cycle.
        self.clock.sleep(until_next_minute(self.clock.now())).await;

        loop {
            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "unexpected error in cycle, retrying shortly");
                self.messenger
                    .send_operator(&format!("An unexpected error occurred in the main loop: {e}"))
                    .await;
                self.clock.sleep(CYCLE_RETRY_DELAY).await;
                continue;
            }
            self.clock.sleep(until_next_minute(self.clock.now())).await;
        }
    }

    /// One full cycle: Polling (or Reinitialization) -> Evaluating ->
    /// Dispatching.
    pub async fn run_cycle(&mut self) -> Result<()> {
        let started = self.clock.now();
        self.fetch_errors.clear();
        self.dispatcher.begin_cycle();

        let fetched = if self.reinit_due(started) {
            self.reinitialize().await
        } else {
            self.poll().await
        };

        self.refresh_snapshot().await;
        self.evaluate();

        let stats = self.dispatcher.drain(self.messenger.as_ref()).await;

        let finished = self.clock.now();
        self.messenger
            .send_operator(&render_cycle_summary(
                &started.format("%H:%M:%S").to_string(),
                &finished.format("%H:%M:%S").to_string(),
                &fetched,
                stats.queued,
                stats.sent,
                self.snapshot.len(),
            ))
            .await;

        self.report_fetch_errors(finished).await;
        Ok(())
    }

    fn reinit_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_reinit {
            None => true, // startup
            Some(last) => {
                now - last >= chrono::Duration::minutes(i64::from(self.config.reinit_every_minutes))
            }
        }
    }

    /// Ordinary polling phase: one batched ticker fetch per exchange, then
    /// per-instrument open interest. Missing entries mean "no data this
    /// cycle" and are skipped.
    async fn poll(&mut self) -> Vec<(ExchangeId, usize)> {
        let mut fetched = Vec::new();

        for market in self.markets.clone() {
            let exchange = market.exchange();
            let symbols: Vec<Symbol> = self
                .store
                .tracked()
                .into_iter()
                .filter(|key| key.exchange == exchange)
                .map(|key| key.symbol)
                .collect();
            if symbols.is_empty() {
                fetched.push((exchange, 0));
                continue;
            }

            let prices = match self
                .retry
                .run(&self.clock, "batch ticker fetch", MarketError::is_transient, || {
                    market.batch_fetch_last(&symbols)
                })
                .await
            {
                Ok(prices) => prices,
                Err(e) => {
                    self.fetch_errors
                        .push(format!("{exchange}: bulk price fetch failed: {e}"));
                    fetched.push((exchange, 0));
                    continue;
                }
            };

            let mut count = 0;
            for symbol in &symbols {
                let key = InstrumentKey::new(exchange, symbol.clone());
                if let Some(price) = prices.get(symbol) {
                    self.store.record_price(&key, *price);
                    count += 1;
                }
                if self.config.track_open_interest {
                    self.record_open_interest(market.as_ref(), &key).await;
                }
            }
            fetched.push((exchange, count));
        }

        fetched
    }

    /// Fetch and record open interest for one instrument. Settlement drops
    /// the instrument; transient errors are collected for the digest.
    async fn record_open_interest(&mut self, market: &dyn MarketData, key: &InstrumentKey) {
        match market.fetch_open_interest(&key.symbol).await {
            Ok(Some(oi)) => self.store.record_open_interest(key, oi),
            Ok(None) => debug!(instrument = %key, "no open interest this cycle"),
            Err(MarketError::Settlement { .. }) => {
                warn!(instrument = %key, "dropping instrument in delivery/settlement");
                self.drop_instrument(key);
            }
            Err(e) => {
                self.fetch_errors.push(format!("{key}: OI fetch failed: {e}"));
            }
        }
    }

    /// Reinitialization phase: refresh the universe, drop stale/ignored
    /// instruments, seed new ones with a single fresh observation. Fetch
    /// failures degrade to the error digest; they never abort the cycle.
    async fn reinitialize(&mut self) -> Vec<(ExchangeId, usize)> {
        let started = self.clock.now();
        let ignored: HashSet<InstrumentKey> = self
            .subscribers
            .list_ignored()
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "ignore-list unavailable, keeping previous universe");
                Vec::new()
            })
            .into_iter()
            .collect();

        let mut universe: HashMap<ExchangeId, Vec<Symbol>> = HashMap::new();
        for market in self.markets.clone() {
            let exchange = market.exchange();
            match self
                .retry
                .run(&self.clock, "instrument listing", MarketError::is_transient, || {
                    market.list_instruments()
                })
                .await
            {
                Ok(symbols) => {
                    universe.insert(exchange, symbols);
                }
                Err(e) => {
                    // Keep this exchange's old universe for the cycle.
                    self.fetch_errors
                        .push(format!("{exchange}: instrument listing failed: {e}"));
                    let kept = self
                        .store
                        .tracked()
                        .into_iter()
                        .filter(|key| key.exchange == exchange)
                        .map(|key| key.symbol)
                        .collect();
                    universe.insert(exchange, kept);
                }
            }
        }

        // Drop instruments that left the universe or got ignored; their
        // cooldown and daily state goes with them.
        let dropped = self.store.retain(|key| {
            !ignored.contains(key)
                && universe
                    .get(&key.exchange)
                    .map_or(false, |symbols| symbols.contains(&key.symbol))
        });
        for key in &dropped {
            self.gate.drop_instrument(key);
        }
        if !dropped.is_empty() {
            info!(count = dropped.len(), "dropped stale or ignored instruments");
        }

        let mut fetched_per_exchange = Vec::new();
        let mut total_fetched = 0;
        let mut skipped = 0;
        let mut ignored_count = 0;

        for market in self.markets.clone() {
            let exchange = market.exchange();
            let symbols = universe.remove(&exchange).unwrap_or_default();
            let (tracked, ignored_here): (Vec<_>, Vec<_>) = symbols
                .into_iter()
                .partition(|s| !ignored.contains(&InstrumentKey::new(exchange, s.clone())));
            ignored_count += ignored_here.len();

            let prices = match self
                .retry
                .run(&self.clock, "batch ticker fetch", MarketError::is_transient, || {
                    market.batch_fetch_last(&tracked)
                })
                .await
            {
                Ok(prices) => prices,
                Err(e) => {
                    self.fetch_errors
                        .push(format!("{exchange}: bulk price fetch failed: {e}"));
                    fetched_per_exchange.push((exchange, 0));
                    continue;
                }
            };

            let mut count = 0;
            for symbol in tracked {
                let key = InstrumentKey::new(exchange, symbol.clone());
                match prices.get(&symbol) {
                    Some(price) => {
                        let is_new = !self.store.contains(&key);
                        self.store.record_price(&key, *price);
                        count += 1;
                        if is_new && self.config.track_open_interest {
                            self.record_open_interest(market.as_ref(), &key).await;
                        }
                    }
                    None => skipped += 1,
                }
            }
            total_fetched += count;
            fetched_per_exchange.push((exchange, count));
        }

        self.last_reinit = Some(self.clock.now());
        let finished = self.clock.now();
        self.messenger
            .send_operator(&render_reinit_summary(
                &started.format("%H:%M:%S").to_string(),
                &finished.format("%H:%M:%S").to_string(),
                total_fetched,
                skipped,
                ignored_count,
            ))
            .await;

        fetched_per_exchange
    }

    /// Remove every trace of an instrument: windows, cooldowns, daily counts.
    fn drop_instrument(&mut self, key: &InstrumentKey) {
        self.store.drop_instrument(key);
        self.gate.drop_instrument(key);
    }

    /// Replace the per-cycle settings snapshot. On store failure the previous
    /// snapshot stays in effect for this cycle.
    async fn refresh_snapshot(&mut self) {
        match self.subscribers.load_active().await {
            Ok(snapshot) => self.snapshot = snapshot,
            Err(e) => {
                warn!(error = %e, "subscriber store unavailable, reusing previous snapshot");
                self.fetch_errors
                    .push(format!("subscriber snapshot refresh failed: {e}"));
            }
        }
    }

    /// Evaluate every (instrument, subscriber) pair and enqueue alerts for
    /// fired conditions.
    fn evaluate(&mut self) {
        self.gate.begin_cycle(self.clock.now().date_naive());
        let snapshot = self.snapshot.clone();

        for key in self.store.tracked() {
            let Some(price_window) = self.store.price_window(&key) else {
                continue;
            };
            if price_window.is_empty() {
                continue;
            }
            let oi_window = if self.config.track_open_interest {
                self.store.oi_window(&key)
            } else {
                None
            };

            for subscriber in &snapshot {
                if !self.gate.admits(subscriber, &key) {
                    continue;
                }

                // Pump first; a pump fire suppresses the dump check for this
                // cycle (one directional alert per instrument per cycle).
                let price_fired = if self
                    .gate
                    .condition_ready(&key, subscriber.id, ConditionKind::Pump)
                {
                    pump_signal(&price_window, &subscriber.pump)
                } else {
                    None
                };

                let price_fired = match price_fired {
                    Some(signal) => Some(signal),
                    None => {
                        if self
                            .gate
                            .condition_ready(&key, subscriber.id, ConditionKind::Dump)
                        {
                            dump_signal(&price_window, &subscriber.dump)
                        } else {
                            None
                        }
                    }
                };

                if let Some(signal) = price_fired {
                    self.fire(&key, subscriber, signal);
                }

                // Open interest is independent of the price conditions.
                if let Some(window) = &oi_window {
                    if self
                        .gate
                        .condition_ready(&key, subscriber.id, ConditionKind::OpenInterest)
                    {
                        if let Some(signal) = oi_signal(window, &subscriber.open_interest) {
                            self.fire(&key, subscriber, signal);
                        }
                    }
                }
            }
        }
    }

    fn fire(
        &mut self,
        key: &InstrumentKey,
        subscriber: &SubscriberSettings,
        signal: crate::domain::Signal,
    ) {
        let alert_number =
            self.gate
                .record_fire(key, subscriber.id, signal.kind(), signal.lookback());
        let alert = FiredAlert {
            instrument: key.clone(),
            signal,
            alert_number,
        };
        self.dispatcher.enqueue(subscriber.id, render_alert(&alert));
    }

    /// Send a digest of transient fetch errors, at most once per interval.
    async fn report_fetch_errors(&mut self, now: DateTime<Utc>) {
        if self.fetch_errors.is_empty() {
            return;
        }
        let due = self
            .last_error_digest
            .map_or(true, |last| now - last > self.error_digest_interval);
        if due {
            self.messenger
                .send_operator(&render_error_digest(&self.fetch_errors))
                .await;
            self.last_error_digest = Some(now);
        }
    }

    // Test hooks: integration tests drive single cycles and inspect state.

    pub fn store(&self) -> &WindowStore {
        &self.store
    }

    pub fn gate(&self) -> &AlertGate {
        &self.gate
    }
}
