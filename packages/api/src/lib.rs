// ABOUTME: Webhook HTTP surface wiring the two inbound endpoints to the sync engine
// ABOUTME: Router construction and shared handler state

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use dealbridge_sync::SyncEngine;

pub mod error;
pub mod events;
pub mod handlers;
pub mod health;
pub mod signature;

pub use error::AppError;

/// Shared state for the webhook handlers. Secrets are held verbatim; the
/// handlers verify each request against the raw received bytes.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub twenty_webhook_secret: String,
    pub linear_webhook_secret: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/webhooks/twenty", post(handlers::twenty_webhook))
        .route("/webhooks/linear", post(handlers::linear_webhook))
        .with_state(state)
}
