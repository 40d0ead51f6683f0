//! Admission control middleware.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{instrument, warn};

use super::auth::presented_credential;
use super::AppState;
use crate::ratelimit::{to_denial_payload, AdmissionRequest, AdmissionResult, DenialPayload};

/// Address recorded when the transport exposes none.
const UNKNOWN_ADDRESS: &str = "unknown";

/// 429 response carrying a denial payload.
#[derive(Debug, Clone)]
pub struct RateLimited(pub DenialPayload);

impl IntoResponse for RateLimited {
    fn into_response(self) -> Response {
        let retry_after = HeaderValue::from(self.0.retry_after_seconds);
        (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after)],
            Json(self.0),
        )
            .into_response()
    }
}

/// Build the admission view of an HTTP request.
pub fn admission_request(request: &Request, trust_forwarded_for: bool) -> AdmissionRequest {
    AdmissionRequest::new(
        client_address(request, trust_forwarded_for),
        presented_credential(request),
    )
}

fn client_address(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

/// Charges the matched route's cost before running it.
///
/// Routes missing from the cost table pass through untouched. A denied
/// request never reaches the handler.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn admission_control(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let operation = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let Some(cost) = state.routes.cost_of(&operation) else {
        return next.run(request).await;
    };

    let admission = state
        .controller
        .check(&admission_request(&request, state.trust_forwarded_for), cost)
        .await;

    if let Some(payload) = to_denial_payload(&admission.identity, &admission.result) {
        warn!(
            class = %admission.identity.class,
            operation = %operation,
            cost = cost.get(),
            retry_after_seconds = payload.retry_after_seconds,
            "Rate limit exceeded"
        );
        return RateLimited(payload).into_response();
    }

    let mut response = next.run(request).await;
    if let AdmissionResult::Allowed { limit, .. } = admission.result {
        let headers = response.headers_mut();
        headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
        if let Some(remaining) = admission.result.remaining() {
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
        }
    }
    response
}
