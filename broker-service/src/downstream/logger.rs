//! Direct logging over HTTP to the logger service.

use async_trait::async_trait;
use tracing::info;

use super::{Downstream, ServiceClient};
use crate::gateway::{GatewayError, LogPayload, Reply};

pub struct HttpLogAdapter {
    client: ServiceClient,
}

impl HttpLogAdapter {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downstream<LogPayload> for HttpLogAdapter {
    async fn call(&self, payload: LogPayload) -> Result<Reply, GatewayError> {
        let response = self.client.post_json(&payload).await?;
        self.client.expect_accepted(response)?;

        info!(name = %payload.name, "log_entry_written");

        Ok(Reply::new("logged"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::{stub, Service};
    use reqwest::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_logs_entry() {
        let stub = stub::spawn(StatusCode::ACCEPTED, json!({"error": false})).await;
        let adapter = HttpLogAdapter::new(stub.client(Service::Logger));

        let reply = adapter
            .call(LogPayload {
                name: "event".to_string(),
                data: "something happened".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(reply.message, "logged");
        assert_eq!(
            stub.received(),
            vec![json!({"name": "event", "data": "something happened"})]
        );
    }

    #[tokio::test]
    async fn test_unexpected_status() {
        let stub = stub::spawn(StatusCode::SERVICE_UNAVAILABLE, json!({})).await;
        let adapter = HttpLogAdapter::new(stub.client(Service::Logger));

        let err = adapter.call(LogPayload::default()).await.unwrap_err();

        assert_eq!(err.to_string(), "error calling logger service");
    }
}
