//! Action dispatch.
//!
//! The dispatcher decodes an envelope into an [`Action`] and hands its
//! payload to exactly one downstream adapter:
//!
//! ```text
//! RequestEnvelope → Action::{Auth, Log, Mail} → adapter → Outcome
//!                 ↘ unknown action → 400, no adapter called
//! ```
//!
//! Every error is converted into a [`UniformResponse`] here; nothing escapes
//! to the HTTP layer unconverted.

pub mod envelope;
pub mod error;
pub mod response;

use std::sync::Arc;

use reqwest::Client;
use tracing::{error, info, warn};

use crate::config::{Config, LogTransport};
use crate::downstream::{
    AuthAdapter, Downstream, HttpLogAdapter, MailAdapter, QueueLogAdapter, Service, ServiceClient,
};
use crate::queue::{BrokerConnection, ExchangePublisher};

pub use envelope::{Action, AuthPayload, LogPayload, MailPayload, RequestEnvelope};
pub use error::GatewayError;
pub use response::{Outcome, Reply, UniformResponse};

/// Routes decoded requests to their downstream adapter.
#[derive(Clone)]
pub struct Dispatcher {
    auth: Arc<dyn Downstream<AuthPayload>>,
    log: Arc<dyn Downstream<LogPayload>>,
    mail: Arc<dyn Downstream<MailPayload>>,
}

impl Dispatcher {
    pub fn new(
        auth: Arc<dyn Downstream<AuthPayload>>,
        log: Arc<dyn Downstream<LogPayload>>,
        mail: Arc<dyn Downstream<MailPayload>>,
    ) -> Self {
        Self { auth, log, mail }
    }

    /// Wire the production adapters. `broker` is required when logging goes
    /// through RabbitMQ.
    pub fn from_config(
        config: &Config,
        client: Client,
        broker: Option<BrokerConnection>,
    ) -> anyhow::Result<Self> {
        let timeout = config.request_timeout();
        let service_client = |service, url: &url::Url| {
            ServiceClient::new(client.clone(), service, url.clone(), timeout)
        };

        let log: Arc<dyn Downstream<LogPayload>> = match (config.log_transport, broker) {
            (LogTransport::RabbitMq, Some(broker)) => {
                let publisher = ExchangePublisher::new(broker, config.log_exchange.clone());
                Arc::new(
                    QueueLogAdapter::new(Arc::new(publisher)).with_severity(config.log_severity),
                )
            }
            (LogTransport::RabbitMq, None) => {
                anyhow::bail!("RabbitMQ log transport requires a broker connection")
            }
            (LogTransport::Http, _) => Arc::new(HttpLogAdapter::new(service_client(
                Service::Logger,
                &config.logger_service_url,
            ))),
        };

        Ok(Self::new(
            Arc::new(AuthAdapter::new(service_client(
                Service::Auth,
                &config.auth_service_url,
            ))),
            log,
            Arc::new(MailAdapter::new(service_client(
                Service::Mail,
                &config.mail_service_url,
            ))),
        ))
    }

    /// Dispatch one envelope. Always returns a well-formed outcome.
    pub async fn handle(&self, envelope: RequestEnvelope) -> Outcome {
        let action = match Action::try_from(envelope) {
            Ok(action) => action,
            Err(e) => {
                if let GatewayError::UnknownAction(tag) = &e {
                    warn!(action = %tag, "dispatch_unknown_action");
                }
                return e.into();
            }
        };

        let name = action.name();
        info!(action = name, "dispatch_routing");

        let result = match action {
            Action::Auth(payload) => self.auth.call(payload).await,
            Action::Log(payload) => self.log.call(payload).await,
            Action::Mail(payload) => self.mail.call(payload).await,
        };

        match result {
            Ok(reply) => {
                info!(action = name, message = %reply.message, "dispatch_complete");
                reply.into()
            }
            Err(e) => {
                error!(action = name, error = %e, status_code = e.status_code().as_u16(), "dispatch_failed");
                e.into()
            }
        }
    }
}
