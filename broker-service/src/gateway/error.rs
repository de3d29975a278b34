//! Error taxonomy for dispatch and downstream calls.
//!
//! Every variant is converted into a [`UniformResponse`] at the dispatcher
//! boundary; `Display` is the message the caller sees, so transport details
//! stay in the logs.

use axum::http::StatusCode;
use serde_json::Value;
use thiserror::Error;

use super::response::{Outcome, UniformResponse};
use crate::downstream::Service;
use crate::queue::PublishError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inbound body is not a valid envelope.
    #[error("{0}")]
    Decode(String),

    #[error("unknown action")]
    UnknownAction(String),

    /// The auth service answered 400.
    #[error("invalid credential")]
    InvalidCredential,

    /// The downstream call succeeded but the service reported an error in its body.
    #[error("{message}")]
    Rejected {
        service: Service,
        message: String,
        data: Option<Value>,
    },

    #[error("error calling {service} service")]
    Transport {
        service: Service,
        #[source]
        source: reqwest::Error,
    },

    #[error("error calling {service} service")]
    Status { service: Service, status: StatusCode },

    #[error("invalid response from {service} service")]
    Body {
        service: Service,
        #[source]
        source: reqwest::Error,
    },

    #[error("error publishing log event")]
    Publish(#[from] PublishError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Decode(_) | GatewayError::UnknownAction(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidCredential | GatewayError::Rejected { .. } => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::Transport { .. }
            | GatewayError::Status { .. }
            | GatewayError::Body { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Publish(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<GatewayError> for Outcome {
    fn from(err: GatewayError) -> Self {
        let status = err.status_code();
        let mut body = UniformResponse::failure(err.to_string());

        if let GatewayError::Rejected { data, .. } = err {
            body.data = data;
        }

        Outcome { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::Decode("bad json".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::UnknownAction("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::InvalidCredential.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Status {
                service: Service::Mail,
                status: StatusCode::INTERNAL_SERVER_ERROR
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::Publish(PublishError::Reconnect(lapin::Error::InvalidConnectionState(
                lapin::ConnectionState::Closed
            )))
            .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_messages_name_the_service() {
        let err = GatewayError::Status {
            service: Service::Auth,
            status: StatusCode::NOT_FOUND,
        };
        assert_eq!(err.to_string(), "error calling auth service");
    }

    #[test]
    fn test_rejection_keeps_inner_data() {
        let outcome = Outcome::from(GatewayError::Rejected {
            service: Service::Auth,
            message: "user disabled".to_string(),
            data: Some(Value::from("u-1")),
        });

        assert!(outcome.body.error);
        assert_eq!(outcome.body.message, "user disabled");
        assert_eq!(outcome.body.data, Some(Value::from("u-1")));
        assert_eq!(outcome.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unknown_action_outcome() {
        let outcome = Outcome::from(GatewayError::UnknownAction("launch".into()));
        assert_eq!(outcome.body, UniformResponse::failure("unknown action"));
    }
}
