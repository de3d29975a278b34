//! Web server module.
//!
//! Routes:
//! - `GET /ping`: health check
//! - `POST /`: broker hit
//! - `POST /handle`: action submission

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{broker, handle_submission, health, AppState, HealthResponse};

/// Build the router with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(broker))
        .route("/ping", get(health))
        .route("/handle", post(handle_submission))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
