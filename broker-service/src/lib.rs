//! Broker - API gateway for the microservice stack.
//!
//! A single JSON envelope comes in; its `action` decides which collaborator
//! handles it:
//! - `auth`: POST to the authentication service
//! - `mail`: POST to the mail service
//! - `log`: publish to the `logs_topic` exchange (or POST to the logger service)
//!
//! ## Architecture
//!
//! ```text
//! Client → /handle → Dispatcher → Adapter → auth / mail / logger / RabbitMQ
//! ```

pub mod config;
pub mod downstream;
pub mod gateway;
pub mod queue;
pub mod web;

// Re-export commonly used types
pub use config::{Config, LogTransport};
pub use gateway::{Dispatcher, Outcome, RequestEnvelope, UniformResponse};
pub use queue::{BrokerConnection, ExchangePublisher, PublishError, Severity, LOG_EXCHANGE};
pub use web::AppState;
