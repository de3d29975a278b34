//! Log event emitter.
//!
//! Each publish opens its own channel on the shared [`BrokerConnection`],
//! declares the topic exchange, publishes one persistent message with
//! publisher confirms and closes the channel again, whether or not the
//! publish succeeded.

use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions},
    publisher_confirm::Confirmation,
    types::FieldTable,
    BasicProperties, Channel, ExchangeKind,
};
use thiserror::Error;
use tracing::{error, info, warn};

use super::connector::BrokerConnection;

/// Errors raised while publishing a log event.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broker connection lost and reconnect failed: {0}")]
    Reconnect(#[source] lapin::Error),

    #[error("failed to open channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("failed to declare exchange {exchange}: {source}")]
    Topology {
        exchange: String,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to publish to exchange {exchange}: {source}")]
    Transport {
        exchange: String,
        #[source]
        source: lapin::Error,
    },

    #[error("broker rejected message for routing key {routing_key}")]
    Nacked { routing_key: String },

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for log events. Implemented over RabbitMQ by
/// [`ExchangePublisher`]; tests substitute an in-memory recorder.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// The channel operations the emitter needs.
#[async_trait]
pub trait PublishChannel: Send + Sync {
    async fn enable_confirms(&self) -> Result<(), lapin::Error>;

    /// Declare a durable topic exchange.
    async fn declare_topic_exchange(&self, exchange: &str) -> Result<(), lapin::Error>;

    /// Publish a persistent JSON message and wait for its confirmation.
    async fn publish_persistent(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<Confirmation, lapin::Error>;

    fn is_open(&self) -> bool;

    async fn close(&self) -> Result<(), lapin::Error>;
}

#[async_trait]
impl PublishChannel for Channel {
    async fn enable_confirms(&self) -> Result<(), lapin::Error> {
        self.confirm_select(ConfirmSelectOptions::default()).await
    }

    async fn declare_topic_exchange(&self, exchange: &str) -> Result<(), lapin::Error> {
        // Redeclaring with identical properties is a no-op; a mismatch is
        // refused by the broker with PRECONDITION_FAILED.
        self.exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
    }

    async fn publish_persistent(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<Confirmation, lapin::Error> {
        self.basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            payload,
            BasicProperties::default()
                .with_delivery_mode(2) // Persistent
                .with_content_type("application/json".into()),
        )
        .await?
        .await
    }

    fn is_open(&self) -> bool {
        self.status().connected()
    }

    async fn close(&self) -> Result<(), lapin::Error> {
        Channel::close(self, 200, "Normal shutdown").await
    }
}

/// Short-lived publisher bound to one channel.
pub struct Emitter<C: PublishChannel = Channel> {
    channel: C,
    exchange: String,
}

impl Emitter<Channel> {
    /// Open a channel on the shared connection and prepare it.
    pub async fn open(connection: &BrokerConnection, exchange: &str) -> Result<Self, PublishError> {
        let channel = connection.create_channel().await?;
        Self::with_channel(channel, exchange).await
    }
}

impl<C: PublishChannel> Emitter<C> {
    /// Put `channel` in confirm mode and make sure the exchange exists. The
    /// channel is closed if either step fails.
    pub async fn with_channel(channel: C, exchange: &str) -> Result<Self, PublishError> {
        let emitter = Self {
            channel,
            exchange: exchange.to_string(),
        };

        if let Err(e) = emitter.setup().await {
            emitter.close().await;
            return Err(e);
        }

        Ok(emitter)
    }

    async fn setup(&self) -> Result<(), PublishError> {
        self.channel
            .enable_confirms()
            .await
            .map_err(PublishError::Channel)?;

        self.channel
            .declare_topic_exchange(&self.exchange)
            .await
            .map_err(|source| {
                error!(exchange = %self.exchange, error = %source, "rabbitmq_exchange_declare_failed");
                PublishError::Topology {
                    exchange: self.exchange.clone(),
                    source,
                }
            })
    }

    /// Publish one message and wait for the broker's ack.
    pub async fn push(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError> {
        let confirmation = self
            .channel
            .publish_persistent(&self.exchange, routing_key, payload)
            .await
            .map_err(|source| PublishError::Transport {
                exchange: self.exchange.clone(),
                source,
            })?;

        if let Confirmation::Nack(_) = confirmation {
            return Err(PublishError::Nacked {
                routing_key: routing_key.to_string(),
            });
        }

        info!(
            exchange = %self.exchange,
            routing_key = routing_key,
            body_length = payload.len(),
            "log_event_published"
        );

        Ok(())
    }

    /// Release the channel. A channel the broker already closed (for
    /// example after a failed declare) is left alone.
    pub async fn close(self) {
        if !self.channel.is_open() {
            return;
        }

        if let Err(e) = self.channel.close().await {
            warn!(error = %e, "rabbitmq_channel_close_error");
        }
    }
}

/// Publish a single message on `channel` through a scoped [`Emitter`].
pub async fn publish_on<C: PublishChannel>(
    channel: C,
    exchange: &str,
    routing_key: &str,
    payload: &[u8],
) -> Result<(), PublishError> {
    let emitter = Emitter::with_channel(channel, exchange).await?;
    let result = emitter.push(routing_key, payload).await;
    emitter.close().await;
    result
}

/// Publish a single message on a fresh channel of the shared connection.
pub async fn publish(
    connection: &BrokerConnection,
    exchange: &str,
    routing_key: &str,
    payload: &[u8],
) -> Result<(), PublishError> {
    let channel = connection.create_channel().await?;
    publish_on(channel, exchange, routing_key, payload).await
}

/// [`EventSink`] publishing to a topic exchange over the shared connection.
#[derive(Clone)]
pub struct ExchangePublisher {
    connection: BrokerConnection,
    exchange: String,
}

impl ExchangePublisher {
    pub fn new(connection: BrokerConnection, exchange: impl Into<String>) -> Self {
        Self {
            connection,
            exchange: exchange.into(),
        }
    }
}

#[async_trait]
impl EventSink for ExchangePublisher {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), PublishError> {
        publish(&self.connection, &self.exchange, routing_key, payload).await
    }
}
