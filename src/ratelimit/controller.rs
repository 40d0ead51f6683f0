//! Admission control orchestration.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::accounting::{AdmissionResult, WindowAccounting};
use super::identity::{AdmissionRequest, ClientIdentity, IdentityResolver};
use super::key::WindowKey;
use super::policy::{BudgetPolicy, RequestCost};
use crate::error::GatekeeperError;

/// Retry hint handed out when failing closed.
const FAIL_CLOSED_RETRY_AFTER_SECS: u64 = 1;

/// What to do when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Let every request through and log a warning
    #[default]
    FailOpen,
    /// Deny every request
    FailClosed,
}

/// A decision together with the identity it was made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub identity: ClientIdentity,
    pub result: AdmissionResult,
}

/// Resolves the caller, charges its window and returns the decision.
///
/// Holds no mutable state; clone it freely across tasks.
#[derive(Clone)]
pub struct AdmissionController {
    resolver: IdentityResolver,
    accounting: WindowAccounting,
    key_prefix: String,
    fallback: FallbackPolicy,
}

impl AdmissionController {
    pub fn new(
        resolver: IdentityResolver,
        accounting: WindowAccounting,
        key_prefix: impl Into<String>,
        fallback: FallbackPolicy,
    ) -> Self {
        Self {
            resolver,
            accounting,
            key_prefix: key_prefix.into(),
            fallback,
        }
    }

    /// Decide whether `request` may spend `cost` budget units.
    ///
    /// Never fails: store errors are resolved through the fallback policy.
    pub async fn check(&self, request: &AdmissionRequest, cost: RequestCost) -> Admission {
        let (identity, policy) = self.resolver.resolve(request);
        let key = self.key_for(&identity);

        let result = match self.accounting.charge_and_check(&key, cost, &policy).await {
            Ok(result) => result,
            Err(err) => self.apply_fallback(&identity, &policy, err),
        };

        debug!(
            class = %identity.class,
            cost = cost.get(),
            allowed = result.is_allowed(),
            "Admission decision made"
        );

        Admission { identity, result }
    }

    /// Store key used for an identity.
    pub fn key_for(&self, identity: &ClientIdentity) -> WindowKey {
        WindowKey::for_identity(&self.key_prefix, identity)
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    fn apply_fallback(
        &self,
        identity: &ClientIdentity,
        policy: &BudgetPolicy,
        err: GatekeeperError,
    ) -> AdmissionResult {
        match self.fallback {
            FallbackPolicy::FailOpen => {
                warn!(
                    class = %identity.class,
                    error = %err,
                    "Counter store unavailable, admitting without accounting"
                );
                AdmissionResult::Bypassed
            }
            FallbackPolicy::FailClosed => {
                warn!(
                    class = %identity.class,
                    error = %err,
                    "Counter store unavailable, denying request"
                );
                AdmissionResult::Denied {
                    retry_after_seconds: FAIL_CLOSED_RETRY_AFTER_SECS.min(policy.window_seconds),
                    limit: policy.limit,
                }
            }
        }
    }
}
