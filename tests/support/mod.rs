//! Shared test doubles: virtual clock, scripted messenger, scripted market.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use pumpwatch::domain::{ExchangeId, SubscriberId, Symbol};
use pumpwatch::error::MarketError;
use pumpwatch::port::{Clock, MarketData, Messenger, SendOutcome};

/// Virtual clock. `sleep` advances time instantly and records the duration,
/// so pacing logic is observable without real waits.
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
    slept: Mutex<Vec<Duration>>,
}

impl MockClock {
    pub fn at(start: &str) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(start.parse().expect("valid RFC 3339 timestamp")),
            slept: Mutex::new(Vec::new()),
        })
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(duration).expect("in-range duration");
    }

    pub fn total_slept(&self) -> Duration {
        self.slept.lock().iter().sum()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.slept.lock().push(duration);
    }
}

/// Messenger that replies with scripted outcomes and records all traffic.
#[derive(Default)]
pub struct MockMessenger {
    /// Outcomes consumed front-to-back per recipient; [`SendOutcome::Sent`]
    /// once the script runs out.
    scripts: Mutex<HashMap<SubscriberId, Vec<SendOutcome>>>,
    pub sent: Mutex<Vec<(SubscriberId, String)>>,
    pub operator: Mutex<Vec<String>>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, recipient: SubscriberId, outcomes: Vec<SendOutcome>) {
        self.scripts.lock().insert(recipient, outcomes);
    }

    pub fn sent_to(&self, recipient: SubscriberId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(r, _)| *r == recipient)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn operator_messages(&self) -> Vec<String> {
        self.operator.lock().clone()
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send(&self, recipient: SubscriberId, text: &str) -> SendOutcome {
        let outcome = {
            let mut scripts = self.scripts.lock();
            match scripts.get_mut(&recipient) {
                Some(script) if !script.is_empty() => script.remove(0),
                _ => SendOutcome::Sent,
            }
        };
        if outcome == SendOutcome::Sent {
            self.sent.lock().push((recipient, text.to_string()));
        }
        outcome
    }

    async fn send_operator(&self, text: &str) {
        self.operator.lock().push(text.to_string());
    }
}

/// Market gateway fed from mutable in-test state.
pub struct MockMarket {
    exchange: ExchangeId,
    pub instruments: Mutex<Vec<Symbol>>,
    pub prices: Mutex<HashMap<Symbol, Decimal>>,
    pub open_interest: Mutex<HashMap<Symbol, Decimal>>,
    /// Symbols whose OI fetch reports delivery/settlement.
    pub settling: Mutex<Vec<Symbol>>,
}

impl MockMarket {
    pub fn new(exchange: ExchangeId) -> Arc<Self> {
        Arc::new(Self {
            exchange,
            instruments: Mutex::new(Vec::new()),
            prices: Mutex::new(HashMap::new()),
            open_interest: Mutex::new(HashMap::new()),
            settling: Mutex::new(Vec::new()),
        })
    }

    pub fn list(&self, symbols: &[&str]) {
        *self.instruments.lock() = symbols.iter().map(|s| Symbol::new(*s)).collect();
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().insert(Symbol::new(symbol), price);
    }

    pub fn set_open_interest(&self, symbol: &str, oi: Decimal) {
        self.open_interest.lock().insert(Symbol::new(symbol), oi);
    }

    pub fn drop_symbol(&self, symbol: &str) {
        let symbol = Symbol::new(symbol);
        self.instruments.lock().retain(|s| *s != symbol);
        self.prices.lock().remove(&symbol);
        self.open_interest.lock().remove(&symbol);
    }

    pub fn mark_settling(&self, symbol: &str) {
        self.settling.lock().push(Symbol::new(symbol));
    }
}

#[async_trait]
impl MarketData for MockMarket {
    fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    async fn list_instruments(&self) -> Result<Vec<Symbol>, MarketError> {
        Ok(self.instruments.lock().clone())
    }

    async fn batch_fetch_last(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, Decimal>, MarketError> {
        let prices = self.prices.lock();
        Ok(symbols
            .iter()
            .filter_map(|s| prices.get(s).map(|p| (s.clone(), *p)))
            .collect())
    }

    async fn fetch_open_interest(&self, symbol: &Symbol) -> Result<Option<Decimal>, MarketError> {
        if self.settling.lock().contains(symbol) {
            return Err(MarketError::Settlement {
                symbol: symbol.as_str().to_string(),
            });
        }
        Ok(self.open_interest.lock().get(symbol).copied())
    }
}
