//! Logging via the topic exchange.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use super::Downstream;
use crate::gateway::{GatewayError, LogPayload, Reply};
use crate::queue::{EventSink, PublishError, Severity};

/// Publishes log entries as `log.<LEVEL>` events. Failures are returned to
/// the caller, never retried here.
pub struct QueueLogAdapter {
    sink: Arc<dyn EventSink>,
    severity: Severity,
}

impl QueueLogAdapter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            severity: Severity::default(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

#[async_trait]
impl Downstream<LogPayload> for QueueLogAdapter {
    async fn call(&self, payload: LogPayload) -> Result<Reply, GatewayError> {
        let body = serde_json::to_vec(&payload).map_err(PublishError::from)?;
        let routing_key = self.severity.routing_key();

        if let Err(e) = self.sink.publish(&routing_key, &body).await {
            error!(routing_key = %routing_key, name = %payload.name, error = %e, "log_event_publish_failed");
            return Err(e.into());
        }

        Ok(Reply::new("logged via RabbitMQ"))
    }
}
