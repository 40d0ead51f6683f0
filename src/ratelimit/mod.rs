//! Admission control: identities, budgets, window accounting and counter stores.

mod accounting;
mod backend;
mod clock;
mod controller;
mod identity;
mod key;
mod memory;
mod policy;
mod redis_store;
mod report;
mod routes;

pub use accounting::{AdmissionResult, WindowAccounting};
pub use backend::{ChargeOutcome, CounterStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Admission, AdmissionController, FallbackPolicy};
pub use identity::{AdmissionRequest, ClientIdentity, IdentityClass, IdentityResolver};
pub use key::{WindowKey, DEFAULT_KEY_PREFIX};
pub use memory::InMemoryCounterStore;
pub use policy::{BudgetPolicies, BudgetPolicy, RequestCost, MAX_WINDOW_SECONDS};
pub use redis_store::{RedisCounterStore, DEFAULT_CALL_TIMEOUT};
pub use report::{to_denial_payload, DenialPayload, RATE_LIMIT_EXCEEDED};
pub use routes::RouteCostTable;
