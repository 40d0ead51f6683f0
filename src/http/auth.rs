//! Credential gate for private routes.

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use super::AppState;

/// Why a credential was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized")]
    Missing,
    #[error("Invalid token")]
    Invalid,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Checks presented credentials.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<(), AuthError>;
}

/// Accepts any non-empty credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceVerifier;

#[async_trait]
impl AuthVerifier for PresenceVerifier {
    async fn verify(&self, credential: &str) -> Result<(), AuthError> {
        if credential.trim().is_empty() {
            return Err(AuthError::Invalid);
        }
        Ok(())
    }
}

/// Raw `Authorization` header value, if present and valid UTF-8.
pub fn presented_credential(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Middleware rejecting requests without a verified credential.
pub async fn require_credential(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(credential) = presented_credential(&request) else {
        debug!(path = %request.uri().path(), "Rejecting request without credential");
        return AuthError::Missing.into_response();
    };

    if let Err(err) = state.verifier.verify(&credential).await {
        debug!(path = %request.uri().path(), error = %err, "Credential rejected");
        return err.into_response();
    }

    next.run(request).await
}
