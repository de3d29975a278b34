//! Process-wide RabbitMQ connection.
//!
//! The connection is opened once at startup, retried with exponential backoff
//! because the broker may come up after this service, and then shared by
//! handle with every publish. A publish that finds the connection closed makes
//! a single fresh connection attempt; if that fails the error reaches the
//! caller and nothing is retried in the background.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::{Channel, Connection, ConnectionProperties};
use thiserror::Error;
use tokio::{sync::RwLock, time::sleep};
use tracing::{error, info, warn};

use super::emitter::PublishError;

/// Startup connection failure. Fatal to the process.
#[derive(Debug, Error)]
#[error("failed to connect to RabbitMQ after {attempts} attempts")]
pub struct ConnectionError {
    pub attempts: u32,
    #[source]
    pub source: lapin::Error,
}

/// Exponential backoff: `initial_delay` doubles after every failed attempt,
/// capped at `max_delay`, for at most `max_attempts` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 6)
    }
}

/// Run `op` until it succeeds or the policy's attempt budget is spent,
/// sleeping between attempts. Returns the last error on exhaustion.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &BackoffPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.max_attempts => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "broker_connect_retry"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Something that can report whether the broker is reachable.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// Shared handle to the broker connection. Cloning is cheap.
///
/// When a publish finds the connection closed, one fresh connection attempt
/// is made in place before giving up; every clone sees the replacement.
#[derive(Clone)]
pub struct BrokerConnection {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    url: String,
    connection: RwLock<Connection>,
}

impl BrokerConnection {
    /// Connect to the broker, retrying per `policy`.
    pub async fn connect(url: &str, policy: &BackoffPolicy) -> Result<Self, ConnectionError> {
        info!(url_length = url.len(), max_attempts = policy.max_attempts, "rabbitmq_connecting");

        let conn = retry_with_backoff(policy, |attempt| async move {
            info!(attempt = attempt, "rabbitmq_connect_attempt");
            Connection::connect(url, ConnectionProperties::default()).await
        })
        .await
        .map_err(|source| ConnectionError {
            attempts: policy.max_attempts,
            source,
        })?;

        info!("rabbitmq_connected");

        Ok(Self {
            inner: Arc::new(BrokerInner {
                url: url.to_string(),
                connection: RwLock::new(conn),
            }),
        })
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.connection.read().await.status().connected()
    }

    /// Open a fresh channel, re-establishing the connection first if it has
    /// been closed since startup.
    pub async fn create_channel(&self) -> Result<Channel, PublishError> {
        {
            let connection = self.inner.connection.read().await;
            if connection.status().connected() {
                return connection.create_channel().await.map_err(PublishError::Channel);
            }
        }

        let mut connection = self.inner.connection.write().await;

        // Double-check after acquiring write lock
        if !connection.status().connected() {
            warn!("rabbitmq_connection_lost");

            let fresh = Connection::connect(&self.inner.url, ConnectionProperties::default())
                .await
                .map_err(|e| {
                    error!(error = %e, "rabbitmq_reconnect_failed");
                    PublishError::Reconnect(e)
                })?;

            *connection = fresh;
            info!("rabbitmq_reconnected");
        }

        connection.create_channel().await.map_err(PublishError::Channel)
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let connection = self.inner.connection.read().await;
        if !connection.status().connected() {
            return;
        }

        if let Err(e) = connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_connection_close_error");
        }

        info!("rabbitmq_connection_closed");
    }
}

#[async_trait]
impl Connectivity for BrokerConnection {
    async fn is_connected(&self) -> bool {
        BrokerConnection::is_connected(self).await
    }
}
