//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The process-wide broker connection with startup retry
//! - A per-call emitter that declares the topic exchange and publishes
//! - Routing key types for log events
//!
//! ## Topology
//!
//! ```text
//! Broker → logs_topic (topic, durable) → queues bound to log.*
//! ```

pub mod connector;
pub mod emitter;
pub mod types;

pub use connector::{retry_with_backoff, BackoffPolicy, BrokerConnection, ConnectionError, Connectivity};
pub use emitter::{publish, publish_on, Emitter, EventSink, ExchangePublisher, PublishChannel, PublishError};
pub use types::{Severity, LOG_EXCHANGE, LOG_ROUTING_PREFIX};
