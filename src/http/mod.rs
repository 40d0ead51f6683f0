//! HTTP boundary: routes, credential gate and admission middleware.

mod admission;
mod auth;
mod server;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::ratelimit::{AdmissionController, RouteCostTable};

pub use admission::{admission_control, admission_request, RateLimited};
pub use auth::{presented_credential, require_credential, AuthError, AuthVerifier, PresenceVerifier};
pub use server::HttpServer;

/// Shared state of the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    pub controller: AdmissionController,
    pub routes: Arc<RouteCostTable>,
    pub verifier: Arc<dyn AuthVerifier>,
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(controller: AdmissionController, routes: RouteCostTable) -> Self {
        Self {
            controller,
            routes: Arc::new(routes),
            verifier: Arc::new(PresenceVerifier),
            trust_forwarded_for: false,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn AuthVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

/// Build the application router.
///
/// Private routes check the credential before charging any budget, so
/// unauthenticated calls never consume one.
pub fn router(state: AppState) -> Router {
    let public_routes: Router = Router::new()
        .route("/public", get(public))
        .route_layer(from_fn_with_state(state.clone(), admission_control));

    let private_routes: Router = Router::new()
        .route("/private", get(private))
        .route("/privateHeavy", get(private))
        .route_layer(from_fn_with_state(state.clone(), admission_control))
        .route_layer(from_fn_with_state(state, require_credential));

    Router::new()
        .route("/health", get(health))
        .merge(public_routes)
        .merge(private_routes)
}

async fn public() -> Json<Value> {
    Json(json!({ "message": "Public" }))
}

async fn private() -> Json<Value> {
    Json(json!({ "message": "Private" }))
}

async fn health() -> &'static str {
    "ok"
}
