//! Outbound delivery pipeline.
//!
//! A FIFO queue drained once per cycle under three limits: a global
//! per-second throughput cap, a one-second gap between consecutive sends to
//! the same recipient, and a per-recipient-per-cycle cap. Flood-controlled
//! recipients are paused and their messages requeued; recipients who blocked
//! the bot are collected into a single operator digest.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::DeliveryConfig;
use crate::domain::SubscriberId;
use crate::port::{Clock, Messenger, SendOutcome};

use super::format::render_blocked_digest;

/// A queued (recipient, rendered text) pair. Lives only between enqueue and
/// send/requeue; never persisted.
#[derive(Debug, Clone)]
struct Outbound {
    recipient: SubscriberId,
    text: String,
}

/// Delivery counters for one cycle, reported in the operator summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub queued: usize,
    pub sent: usize,
    pub dropped: usize,
    pub deferred: usize,
}

pub struct Dispatcher {
    config: DeliveryConfig,
    clock: Arc<dyn Clock>,
    queue: VecDeque<Outbound>,
    /// Instant of the last send per recipient; cleared each cycle.
    last_send: HashMap<SubscriberId, DateTime<Utc>>,
    /// Sends per recipient this cycle.
    sent_this_cycle: HashMap<SubscriberId, u32>,
    /// Recipients that hit the per-cycle cap; their remaining messages drop.
    rate_limited: HashSet<SubscriberId>,
    /// Flood-control resume instants. Survives cycle resets until expired.
    flood_until: HashMap<SubscriberId, DateTime<Utc>>,
    /// Recipients that blocked the bot, digested once per drain.
    blocked: HashSet<SubscriberId>,
    stats: CycleStats,
    /// Global throughput window: second start and sends within it.
    second_start: Option<DateTime<Utc>>,
    sends_this_second: u32,
}

impl Dispatcher {
    pub fn new(config: DeliveryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            queue: VecDeque::new(),
            last_send: HashMap::new(),
            sent_this_cycle: HashMap::new(),
            rate_limited: HashSet::new(),
            flood_until: HashMap::new(),
            blocked: HashSet::new(),
            stats: CycleStats::default(),
            second_start: None,
            sends_this_second: 0,
        }
    }

    /// Reset per-cycle state. Messages requeued by flood control stay in the
    /// queue; flood deadlines are pruned once they expire so redelivery can
    /// happen.
    pub fn begin_cycle(&mut self) {
        let now = self.clock.now();
        self.last_send.clear();
        self.sent_this_cycle.clear();
        self.rate_limited.clear();
        self.flood_until.retain(|_, until| *until > now);
        self.stats = CycleStats {
            queued: self.queue.len(),
            ..CycleStats::default()
        };
        self.second_start = None;
        self.sends_this_second = 0;
    }

    /// Append a rendered message to the delivery queue.
    pub fn enqueue(&mut self, recipient: SubscriberId, text: String) {
        self.queue.push_back(Outbound { recipient, text });
        self.stats.queued += 1;
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue. One pass over the messages present when the drain
    /// starts; flood-deferred messages go to the back for the next cycle.
    /// Per-message failures never abort the loop.
    pub async fn drain(&mut self, messenger: &dyn Messenger) -> CycleStats {
        let mut remaining = self.queue.len();

        while remaining > 0 {
            remaining -= 1;
            let Some(message) = self.queue.pop_front() else {
                break;
            };
            let recipient = message.recipient;

            // Flood-controlled recipient: defer, do not drop.
            if let Some(until) = self.flood_until.get(&recipient) {
                if self.clock.now() < *until {
                    self.stats.deferred += 1;
                    self.queue.push_back(message);
                    continue;
                }
                self.flood_until.remove(&recipient);
            }

            // Per-recipient cap for this cycle: drop the rest.
            let sent = self.sent_this_cycle.get(&recipient).copied().unwrap_or(0);
            if sent >= self.config.recipient_messages_per_minute {
                if self.rate_limited.insert(recipient) {
                    debug!(recipient = %recipient, "per-cycle cap reached, dropping surplus");
                }
                self.stats.dropped += 1;
                continue;
            }

            self.pace_global().await;
            self.pace_recipient(recipient).await;

            match messenger.send(recipient, &message.text).await {
                SendOutcome::Sent => {
                    let now = self.clock.now();
                    self.last_send.insert(recipient, now);
                    *self.sent_this_cycle.entry(recipient).or_insert(0) += 1;
                    self.note_global_send(now);
                    self.stats.sent += 1;
                }
                SendOutcome::RetryAfter(seconds) => {
                    let until = self.clock.now() + chrono::Duration::seconds(seconds as i64);
                    warn!(recipient = %recipient, seconds, "flood control, pausing recipient");
                    self.flood_until.insert(recipient, until);
                    self.stats.deferred += 1;
                    self.queue.push_back(message);
                }
                SendOutcome::Blocked => {
                    self.blocked.insert(recipient);
                    self.stats.dropped += 1;
                }
                SendOutcome::Failed(reason) => {
                    error!(recipient = %recipient, reason = %reason, "delivery failed");
                    messenger
                        .send_operator(&format!("Error sending to {recipient}: {reason}"))
                        .await;
                    self.stats.dropped += 1;
                }
            }
        }

        if !self.blocked.is_empty() {
            let mut blocked: Vec<SubscriberId> = self.blocked.drain().collect();
            blocked.sort();
            info!(count = blocked.len(), "recipients blocked the bot");
            messenger.send_operator(&render_blocked_digest(&blocked)).await;
        }

        self.stats
    }

    /// Hold until at least `recipient_gap_ms` has passed since the last send
    /// to this recipient.
    async fn pace_recipient(&self, recipient: SubscriberId) {
        let Some(last) = self.last_send.get(&recipient) else {
            return;
        };
        let gap = chrono::Duration::milliseconds(self.config.recipient_gap_ms as i64);
        let resume = *last + gap;
        let now = self.clock.now();
        if now < resume {
            let wait = (resume - now).to_std().unwrap_or(Duration::ZERO);
            self.clock.sleep(wait).await;
        }
    }

    /// Hold when the global per-second budget for the current wall-clock
    /// second is spent.
    async fn pace_global(&mut self) {
        let now = self.clock.now();
        match self.second_start {
            Some(start) if now - start < chrono::Duration::seconds(1) => {
                if self.sends_this_second >= self.config.global_messages_per_second {
                    let resume = start + chrono::Duration::seconds(1);
                    let wait = (resume - now).to_std().unwrap_or(Duration::ZERO);
                    self.clock.sleep(wait).await;
                    self.second_start = Some(self.clock.now());
                    self.sends_this_second = 0;
                }
            }
            _ => {
                self.second_start = Some(now);
                self.sends_this_second = 0;
            }
        }
    }

    fn note_global_send(&mut self, now: DateTime<Utc>) {
        match self.second_start {
            Some(start) if now - start < chrono::Duration::seconds(1) => {
                self.sends_this_second += 1;
            }
            _ => {
                self.second_start = Some(now);
                self.sends_this_second = 1;
            }
        }
    }
}
