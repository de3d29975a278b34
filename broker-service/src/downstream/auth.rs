//! Authentication adapter.
//!
//! The auth service answers 202 with a body of the same shape as our own
//! response. That body is the inner result: its `error` flag decides whether
//! the caller is authenticated, independently of the HTTP call succeeding.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{Downstream, ServiceClient};
use crate::gateway::{AuthPayload, GatewayError, Reply};

/// Body returned by the auth service on 202.
#[derive(Debug, Deserialize)]
struct ServiceReply {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

pub struct AuthAdapter {
    client: ServiceClient,
}

impl AuthAdapter {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downstream<AuthPayload> for AuthAdapter {
    async fn call(&self, payload: AuthPayload) -> Result<Reply, GatewayError> {
        let service = self.client.service();
        let response = self.client.post_json(&payload).await?;

        if response.status() == StatusCode::BAD_REQUEST {
            warn!("auth_invalid_credential");
            return Err(GatewayError::InvalidCredential);
        }

        let response = self.client.expect_accepted(response)?;

        let reply: ServiceReply = response
            .json()
            .await
            .map_err(|source| GatewayError::Body { service, source })?;

        if reply.error {
            warn!(message = %reply.message, "auth_rejected");
            let message = if reply.message.is_empty() {
                "authentication rejected".to_string()
            } else {
                reply.message
            };
            return Err(GatewayError::Rejected {
                service,
                message,
                data: reply.data,
            });
        }

        info!("auth_succeeded");

        Ok(Reply::new("Authenticated").with_data(reply.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::{stub, Service};
    use serde_json::json;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    fn credentials() -> AuthPayload {
        AuthPayload {
            email: "admin@example.com".to_string(),
            password: "verysecret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_accepted_passes_data_through() {
        let stub = stub::spawn(StatusCode::ACCEPTED, json!({"error": false, "data": "tok123"})).await;
        let adapter = AuthAdapter::new(stub.client(Service::Auth));

        let reply = adapter.call(credentials()).await.unwrap();

        assert_eq!(reply.message, "Authenticated");
        assert_eq!(reply.data, Some(json!("tok123")));
        assert_eq!(
            stub.received(),
            vec![json!({"email": "admin@example.com", "password": "verysecret"})]
        );
    }

    #[tokio::test]
    async fn test_bad_request_is_invalid_credential() {
        let stub = stub::spawn(StatusCode::BAD_REQUEST, json!({"error": true})).await;
        let adapter = AuthAdapter::new(stub.client(Service::Auth));

        let err = adapter.call(credentials()).await.unwrap_err();

        assert!(matches!(err, GatewayError::InvalidCredential));
        assert_eq!(err.to_string(), "invalid credential");
    }

    #[tokio::test]
    async fn test_other_status_is_generic_error() {
        let stub = stub::spawn(StatusCode::INTERNAL_SERVER_ERROR, json!({})).await;
        let adapter = AuthAdapter::new(stub.client(Service::Auth));

        let err = adapter.call(credentials()).await.unwrap_err();

        assert_eq!(err.to_string(), "error calling auth service");
    }

    #[tokio::test]
    async fn test_plain_ok_is_not_accepted() {
        let stub = stub::spawn(StatusCode::OK, json!({"error": false, "data": "tok"})).await;
        let adapter = AuthAdapter::new(stub.client(Service::Auth));

        let err = adapter.call(credentials()).await.unwrap_err();

        assert!(matches!(err, GatewayError::Status { status, .. } if status == StatusCode::OK));
    }

    #[tokio::test]
    async fn test_inner_error_is_propagated() {
        let stub = stub::spawn(
            StatusCode::ACCEPTED,
            json!({"error": true, "message": "account locked", "data": {"attempts": 5}}),
        )
        .await;
        let adapter = AuthAdapter::new(stub.client(Service::Auth));

        let err = adapter.call(credentials()).await.unwrap_err();

        match err {
            GatewayError::Rejected { message, data, .. } => {
                assert_eq!(message, "account locked");
                assert_eq!(data, Some(json!({"attempts": 5})));
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_credentials_stay_out_of_logs() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        for (status, body) in [
            (StatusCode::ACCEPTED, json!({"error": false, "data": "tok"})),
            (StatusCode::ACCEPTED, json!({"error": true, "message": "locked"})),
            (StatusCode::BAD_REQUEST, json!({"error": true})),
        ] {
            let stub = stub::spawn(status, body).await;
            let adapter = AuthAdapter::new(stub.client(Service::Auth));
            let _ = adapter.call(credentials()).await;
        }

        let output = logs.contents();
        assert!(output.contains("auth_succeeded"));
        assert!(output.contains("auth_rejected"));
        assert!(output.contains("auth_invalid_credential"));
        assert!(!output.contains("admin@example.com"));
        assert!(!output.contains("verysecret"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        let adapter = AuthAdapter::new(stub::unreachable(Service::Auth).await);

        let err = adapter.call(credentials()).await.unwrap_err();

        assert!(matches!(err, GatewayError::Transport { .. }));
        assert_eq!(err.to_string(), "error calling auth service");
    }
}
