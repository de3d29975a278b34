//! Broker endpoint handlers.
//!
//! `handle_submission` is the single entry point for actions; the other two
//! are liveness checks.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::gateway::{Dispatcher, GatewayError, Outcome, RequestEnvelope, UniformResponse};
use crate::queue::Connectivity;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Present when log events go through RabbitMQ.
    pub broker: Option<Arc<dyn Connectivity>>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, broker: Option<Arc<dyn Connectivity>>) -> Self {
        Self { dispatcher, broker }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// `None` when no broker connection is in use.
    pub broker_connected: Option<bool>,
}

/// Health check endpoint. Answers 503 while the broker connection is down.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let broker_connected = match &state.broker {
        Some(broker) => Some(broker.is_connected().await),
        None => None,
    };

    if broker_connected == Some(false) {
        warn!("health_broker_disconnected");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable",
                broker_connected,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            broker_connected,
        }),
    )
}

/// Broker hit endpoint.
pub async fn broker() -> (StatusCode, Json<UniformResponse>) {
    (StatusCode::OK, Json(UniformResponse::success("Hit the broker")))
}

// =============================================================================
// Action Submission
// =============================================================================

/// Decode the envelope and dispatch it.
///
/// A body that fails to decode is answered with a 400 in the uniform shape
/// rather than axum's plain-text rejection.
pub async fn handle_submission(
    State(state): State<AppState>,
    payload: Result<Json<RequestEnvelope>, JsonRejection>,
) -> Outcome {
    let envelope = match payload {
        Ok(Json(envelope)) => envelope,
        Err(rejection) => {
            let reason = rejection.body_text();
            warn!(error = %reason, "submission_decode_failed");
            return GatewayError::Decode(reason).into();
        }
    };

    info!(action = %envelope.action, "submission_received");

    state.dispatcher.handle(envelope).await
}
