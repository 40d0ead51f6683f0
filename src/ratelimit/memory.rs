//! In-process counter store.
//!
//! Counters live in a `DashMap`; the charge-and-check runs while holding the
//! key's entry guard, which serializes every operation on that key. Expiry is
//! lazy: an expired record is treated as absent and replaced on the next
//! charge, and `purge_expired` reclaims memory for keys nobody touches again.
//!
//! This store is only shared within one process. Deployments running more
//! than one instance need the Redis store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::backend::{ChargeOutcome, CounterStore};
use super::clock::{Clock, SystemClock};
use super::key::WindowKey;
use super::policy::MAX_WINDOW_SECONDS;
use crate::error::Result;

/// One window's counter.
#[derive(Debug, Clone, Copy)]
struct CounterRecord {
    count: u64,
    expires_at: Instant,
}

impl CounterRecord {
    fn armed(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            expires_at: now + window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Remaining lifetime, rounded up to whole seconds.
    fn ttl_seconds(&self, now: Instant) -> u64 {
        let remaining = self.expires_at.saturating_duration_since(now);
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }
}

/// Counter store kept in process memory.
#[derive(Debug)]
pub struct InMemoryCounterStore {
    counters: DashMap<String, CounterRecord>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    /// Create a store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a store driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            clock,
        }
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.counters.len();
        self.counters.retain(|_, record| !record.is_expired(now));
        before.saturating_sub(self.counters.len())
    }

    /// Number of records held, expired ones included.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Periodically purge expired records until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.purge_expired();
                if removed > 0 {
                    debug!(removed, remaining = self.len(), "Purged expired counters");
                }
            }
        })
    }

    fn live_record(&self, key: &WindowKey) -> Option<CounterRecord> {
        let now = self.clock.now();
        self.counters
            .get(key.as_str())
            .map(|record| *record)
            .filter(|record| !record.is_expired(now))
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn charge_if_under_limit(
        &self,
        key: &WindowKey,
        cost: u64,
        limit: u64,
        window_seconds: u64,
    ) -> Result<ChargeOutcome> {
        let now = self.clock.now();
        let window = Duration::from_secs(window_seconds.min(MAX_WINDOW_SECONDS));

        // The entry guard holds the shard lock until the end of this block.
        let mut record = self
            .counters
            .entry(key.as_str().to_owned())
            .or_insert_with(|| CounterRecord::armed(now, window));

        if record.is_expired(now) {
            trace!(key = %key, "Window expired, starting a new one");
            *record = CounterRecord::armed(now, window);
        }

        let ttl_seconds = record.ttl_seconds(now);
        let within_limit = record
            .count
            .checked_add(cost)
            .is_some_and(|total| total <= limit);

        if within_limit {
            record.count += cost;
        }

        Ok(ChargeOutcome {
            allowed: within_limit,
            new_count: record.count,
            ttl_seconds,
        })
    }

    async fn get(&self, key: &WindowKey) -> Result<Option<u64>> {
        Ok(self.live_record(key).map(|record| record.count))
    }

    async fn ttl(&self, key: &WindowKey) -> Result<Option<u64>> {
        let now = self.clock.now();
        Ok(self.live_record(key).map(|record| record.ttl_seconds(now)))
    }

    async fn exists(&self, key: &WindowKey) -> Result<bool> {
        Ok(self.live_record(key).is_some())
    }
}
