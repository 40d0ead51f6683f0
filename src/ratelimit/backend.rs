//! Counter store trait for abstracting in-process and Redis implementations.

use async_trait::async_trait;

use super::key::WindowKey;
use crate::error::Result;

/// Outcome of one atomic charge-and-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeOutcome {
    /// Whether the charge was applied
    pub allowed: bool,
    /// Counter value after the call; equals the pre-call value on denial
    pub new_count: u64,
    /// Remaining lifetime of the window in seconds
    pub ttl_seconds: u64,
}

/// Shared key-value store with per-key TTL.
///
/// Implementations must execute `charge_if_under_limit` as one indivisible
/// operation with respect to every other operation on the same key. The read
/// methods are diagnostics only and must never be combined into a
/// check-then-charge sequence.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically charge `cost` against `key` unless that would push the
    /// counter past `limit`.
    ///
    /// An absent key is created at zero with a TTL of `window_seconds` in the
    /// same step. A denied charge leaves the counter untouched.
    async fn charge_if_under_limit(
        &self,
        key: &WindowKey,
        cost: u64,
        limit: u64,
        window_seconds: u64,
    ) -> Result<ChargeOutcome>;

    /// Current counter value, `None` when the key is absent.
    async fn get(&self, key: &WindowKey) -> Result<Option<u64>>;

    /// Remaining TTL in seconds, `None` when the key is absent.
    async fn ttl(&self, key: &WindowKey) -> Result<Option<u64>>;

    /// Whether the key currently exists.
    async fn exists(&self, key: &WindowKey) -> Result<bool>;
}
