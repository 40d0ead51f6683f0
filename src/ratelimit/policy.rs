//! Budget policies and request costs.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::identity::IdentityClass;
use crate::error::{GatekeeperError, Result};

/// Longest window a policy may use: ten years.
///
/// Keeps `Instant + window` and the `EX` argument sent to Redis in range.
pub const MAX_WINDOW_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Budget granted to one identity per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetPolicy {
    /// Maximum total cost granted within one window
    pub limit: u64,
    /// Window length in seconds
    pub window_seconds: u64,
}

impl BudgetPolicy {
    /// Create a policy. Both values must be positive and the window at most
    /// [`MAX_WINDOW_SECONDS`].
    pub fn new(limit: u64, window_seconds: u64) -> Result<Self> {
        if limit == 0 {
            return Err(GatekeeperError::Config("budget limit must be positive".into()));
        }
        if window_seconds == 0 {
            return Err(GatekeeperError::Config("window length must be positive".into()));
        }
        if window_seconds > MAX_WINDOW_SECONDS {
            return Err(GatekeeperError::Config(format!(
                "window length must not exceed {} seconds",
                MAX_WINDOW_SECONDS
            )));
        }
        Ok(Self { limit, window_seconds })
    }

    /// The window as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// One policy per identity class, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetPolicies {
    pub address: BudgetPolicy,
    pub credential: BudgetPolicy,
}

impl BudgetPolicies {
    pub fn new(address: BudgetPolicy, credential: BudgetPolicy) -> Self {
        Self { address, credential }
    }

    /// Policy applying to the given identity class.
    pub fn for_class(&self, class: IdentityClass) -> BudgetPolicy {
        match class {
            IdentityClass::NetworkAddress => self.address,
            IdentityClass::Credential => self.credential,
        }
    }
}

/// Number of budget units an operation consumes. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct RequestCost(u64);

impl RequestCost {
    /// Create a cost, rejecting zero.
    pub fn new(units: u64) -> Result<Self> {
        if units == 0 {
            return Err(GatekeeperError::InvalidCost(units));
        }
        Ok(Self(units))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for RequestCost {
    type Error = GatekeeperError;

    fn try_from(units: u64) -> Result<Self> {
        Self::new(units)
    }
}

impl From<RequestCost> for u64 {
    fn from(cost: RequestCost) -> Self {
        cost.0
    }
}

impl fmt::Display for RequestCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_zero_values() {
        assert!(BudgetPolicy::new(0, 60).is_err());
        assert!(BudgetPolicy::new(10, 0).is_err());
        assert!(BudgetPolicy::new(10, MAX_WINDOW_SECONDS + 1).is_err());
        assert!(BudgetPolicy::new(10, MAX_WINDOW_SECONDS).is_ok());

        let policy = BudgetPolicy::new(10, 60).unwrap();
        assert_eq!(policy.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_policies_select_by_class() {
        let policies = BudgetPolicies::new(
            BudgetPolicy::new(100, 3600).unwrap(),
            BudgetPolicy::new(200, 3600).unwrap(),
        );

        assert_eq!(policies.for_class(IdentityClass::NetworkAddress).limit, 100);
        assert_eq!(policies.for_class(IdentityClass::Credential).limit, 200);
    }

    #[test]
    fn test_request_cost_rejects_zero() {
        assert!(matches!(RequestCost::new(0), Err(GatekeeperError::InvalidCost(0))));
        assert_eq!(RequestCost::new(5).unwrap().get(), 5);
    }

    #[test]
    fn test_request_cost_deserialization_validates() {
        let cost: RequestCost = serde_yaml::from_str("3").unwrap();
        assert_eq!(cost.get(), 3);

        assert!(serde_yaml::from_str::<RequestCost>("0").is_err());
    }
}
