//! Fixed-window charge-and-check.

use std::sync::Arc;

use tracing::{debug, trace};

use super::backend::CounterStore;
use super::key::WindowKey;
use super::policy::{BudgetPolicy, RequestCost};
use crate::error::Result;

/// Result of an admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionResult {
    /// The cost was charged.
    Allowed {
        /// Total granted cost in the current window, this request included
        count: u64,
        /// The applicable budget
        limit: u64,
    },
    /// The cost was not charged.
    Denied {
        /// Seconds until the window resets
        retry_after_seconds: u64,
        /// The applicable budget
        limit: u64,
    },
    /// Let through without accounting because the store was unavailable.
    Bypassed,
}

impl AdmissionResult {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, AdmissionResult::Denied { .. })
    }

    /// Retry hint, present iff the request was denied.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            AdmissionResult::Denied { retry_after_seconds, .. } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// Budget left in the window, when known.
    pub fn remaining(&self) -> Option<u64> {
        match self {
            AdmissionResult::Allowed { count, limit } => Some(limit.saturating_sub(*count)),
            AdmissionResult::Denied { .. } => Some(0),
            AdmissionResult::Bypassed => None,
        }
    }
}

/// Applies request costs to window counters.
#[derive(Clone)]
pub struct WindowAccounting {
    store: Arc<dyn CounterStore>,
}

impl WindowAccounting {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Charge `cost` against `key` if the window still has room.
    ///
    /// One atomic store round trip. The counter only ever reflects granted
    /// cost: a denied request leaves it untouched.
    ///
    /// # Errors
    /// `StoreUnavailable` when the store cannot be reached. No charge is
    /// applied in that case.
    pub async fn charge_and_check(
        &self,
        key: &WindowKey,
        cost: RequestCost,
        policy: &BudgetPolicy,
    ) -> Result<AdmissionResult> {
        trace!(key = %key, cost = cost.get(), limit = policy.limit, "Charging window");

        let outcome = self
            .store
            .charge_if_under_limit(key, cost.get(), policy.limit, policy.window_seconds)
            .await?;

        if outcome.allowed {
            return Ok(AdmissionResult::Allowed {
                count: outcome.new_count,
                limit: policy.limit,
            });
        }

        let retry_after_seconds = outcome.ttl_seconds.min(policy.window_seconds);
        debug!(
            key = %key,
            count = outcome.new_count,
            cost = cost.get(),
            limit = policy.limit,
            retry_after_seconds,
            "Window budget exhausted"
        );

        Ok(AdmissionResult::Denied {
            retry_after_seconds,
            limit: policy.limit,
        })
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }
}
