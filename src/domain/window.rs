//! Bounded sliding-window store for observed prices and open interest.
//!
//! Each tracked instrument owns up to two [`ObservationWindow`]s (price and
//! open interest), newest sample first. All mutation happens behind a single
//! mutex so that the evaluator, which runs after the write phase of a cycle,
//! never observes a partially updated series.

use std::collections::HashMap;
use std::collections::VecDeque;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::ids::InstrumentKey;

/// Default number of observations kept per instrument, one per polling cycle.
pub const DEFAULT_WINDOW_CAPACITY: usize = 30;

/// Newest-first bounded sequence of samples.
#[derive(Debug, Clone)]
pub struct ObservationWindow {
    samples: VecDeque<Decimal>,
    capacity: usize,
}

impl ObservationWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Front-insert a sample, evicting the oldest beyond capacity.
    pub fn push(&mut self, value: Decimal) {
        self.samples.push_front(value);
        while self.samples.len() > self.capacity {
            self.samples.pop_back();
        }
    }

    /// Newest sample, if any.
    pub fn latest(&self) -> Option<Decimal> {
        self.samples.front().copied()
    }

    /// Sample `lookback` cycles before the newest one.
    pub fn at(&self, lookback: usize) -> Option<Decimal> {
        self.samples.get(lookback).copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Default)]
struct InstrumentSeries {
    price: Option<ObservationWindow>,
    open_interest: Option<ObservationWindow>,
}

/// Thread-safe store of per-instrument observation windows.
///
/// One exclusive critical section covers the polling write phase of a cycle;
/// reinitialization takes the same lock and therefore never interleaves with
/// ordinary polling writes.
pub struct WindowStore {
    capacity: usize,
    series: Mutex<HashMap<InstrumentKey, InstrumentSeries>>,
}

impl WindowStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            series: Mutex::new(HashMap::new()),
        }
    }

    /// Append a price observation, creating the series on first record.
    pub fn record_price(&self, key: &InstrumentKey, value: Decimal) {
        let mut series = self.series.lock();
        let entry = series.entry(key.clone()).or_default();
        entry
            .price
            .get_or_insert_with(|| ObservationWindow::new(self.capacity))
            .push(value);
    }

    /// Append an open-interest observation, creating the series on first record.
    pub fn record_open_interest(&self, key: &InstrumentKey, value: Decimal) {
        let mut series = self.series.lock();
        let entry = series.entry(key.clone()).or_default();
        entry
            .open_interest
            .get_or_insert_with(|| ObservationWindow::new(self.capacity))
            .push(value);
    }

    /// Snapshot of the price window, or `None` if untracked.
    pub fn price_window(&self, key: &InstrumentKey) -> Option<ObservationWindow> {
        self.series.lock().get(key).and_then(|s| s.price.clone())
    }

    /// Snapshot of the open-interest window, or `None` if untracked.
    pub fn oi_window(&self, key: &InstrumentKey) -> Option<ObservationWindow> {
        self.series
            .lock()
            .get(key)
            .and_then(|s| s.open_interest.clone())
    }

    /// Whether the instrument has any recorded state.
    pub fn contains(&self, key: &InstrumentKey) -> bool {
        self.series.lock().contains_key(key)
    }

    /// Remove all state for an instrument (delisting, ignore-list change).
    pub fn drop_instrument(&self, key: &InstrumentKey) {
        self.series.lock().remove(key);
    }

    /// Keys of all tracked instruments.
    pub fn tracked(&self) -> Vec<InstrumentKey> {
        self.series.lock().keys().cloned().collect()
    }

    /// Keep only instruments the predicate accepts, returning the dropped keys.
    pub fn retain<F>(&self, mut keep: F) -> Vec<InstrumentKey>
    where
        F: FnMut(&InstrumentKey) -> bool,
    {
        let mut series = self.series.lock();
        let mut dropped = Vec::new();
        series.retain(|key, entry| {
            // Stale entries (no price obtainable) go too.
            let empty = entry.price.as_ref().map_or(true, |w| w.is_empty());
            if keep(key) && !empty {
                true
            } else {
                dropped.push(key.clone());
                false
            }
        });
        dropped
    }

    pub fn len(&self) -> usize {
        self.series.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
