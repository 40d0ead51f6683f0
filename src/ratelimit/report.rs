//! Denial payloads for the boundary layer.

use serde::{Deserialize, Serialize};

use super::accounting::AdmissionResult;
use super::identity::ClientIdentity;

/// Fixed `error` field of every denial.
pub const RATE_LIMIT_EXCEEDED: &str = "Rate limit exceeded";

/// Body sent to a client whose request was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenialPayload {
    pub error: String,
    pub message: String,
    pub retry_after_seconds: u64,
}

/// Builds the denial payload for a decision; `None` when the request was allowed.
pub fn to_denial_payload(identity: &ClientIdentity, result: &AdmissionResult) -> Option<DenialPayload> {
    let retry_after_seconds = result.retry_after_seconds()?;

    Some(DenialPayload {
        error: RATE_LIMIT_EXCEEDED.to_string(),
        message: format!(
            "{} rate limit exceeded. Try again in {} seconds.",
            identity.class.label(),
            retry_after_seconds
        ),
        retry_after_seconds,
    })
}
