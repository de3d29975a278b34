//! Downstream adapters.
//!
//! One adapter per collaborator, each turning a typed payload into an
//! outbound call and the result into a [`Reply`] or [`GatewayError`]:
//!
//! ```text
//! auth  → POST authentication-service   (202 + body pass-through)
//! mail  → POST mail-service             (202)
//! log   → POST logger-service           (202)   or   publish log.<LEVEL>
//! ```

pub mod auth;
pub mod event_log;
pub mod logger;
pub mod mail;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tracing::{error, info};
use url::Url;

use crate::gateway::{GatewayError, Reply};

pub use auth::AuthAdapter;
pub use event_log::QueueLogAdapter;
pub use logger::HttpLogAdapter;
pub use mail::MailAdapter;

/// The downstream services the gateway talks to over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Auth,
    Mail,
    Logger,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Service::Auth => "auth",
            Service::Mail => "mail",
            Service::Logger => "logger",
        })
    }
}

/// One downstream path, invoked with the payload of its action.
#[async_trait]
pub trait Downstream<P: Send + 'static>: Send + Sync {
    async fn call(&self, payload: P) -> Result<Reply, GatewayError>;
}

/// JSON-over-HTTP client for a single downstream endpoint.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
    service: Service,
    endpoint: Url,
    timeout: Duration,
}

impl ServiceClient {
    pub fn new(client: Client, service: Service, endpoint: Url, timeout: Duration) -> Self {
        Self {
            client,
            service,
            endpoint,
            timeout,
        }
    }

    pub fn service(&self) -> Service {
        self.service
    }

    /// POST `body` as JSON. Only transport failures are errors here; the
    /// status code is left to the adapter.
    pub async fn post_json<T: Serialize + Sync>(&self, body: &T) -> Result<Response, GatewayError> {
        info!(
            service = %self.service,
            endpoint = %self.endpoint,
            "downstream_request_starting"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    error!(service = %self.service, error = %source, "downstream_request_timeout");
                } else {
                    error!(service = %self.service, error = %source, "downstream_request_error");
                }
                GatewayError::Transport {
                    service: self.service,
                    source,
                }
            })?;

        info!(
            service = %self.service,
            status_code = response.status().as_u16(),
            "downstream_request_complete"
        );

        Ok(response)
    }

    /// Fail unless the service answered with its accepted status.
    pub fn expect_accepted(&self, response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status != StatusCode::ACCEPTED {
            error!(
                service = %self.service,
                status_code = status.as_u16(),
                "downstream_unexpected_status"
            );
            return Err(GatewayError::Status {
                service: self.service,
                status,
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! In-process HTTP stand-ins for downstream services.

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use reqwest::Client;
    use serde_json::Value;
    use tokio::net::TcpListener;
    use url::Url;

    use super::{Service, ServiceClient};

    #[derive(Clone)]
    struct StubState {
        status: StatusCode,
        body: Value,
        received: Arc<Mutex<Vec<Value>>>,
    }

    pub struct StubService {
        pub url: Url,
        received: Arc<Mutex<Vec<Value>>>,
    }

    impl StubService {
        /// Request bodies received so far.
        pub fn received(&self) -> Vec<Value> {
            self.received.lock().unwrap().clone()
        }

        pub fn client(&self, service: Service) -> ServiceClient {
            ServiceClient::new(Client::new(), service, self.url.clone(), Duration::from_secs(5))
        }
    }

    async fn respond(
        State(state): State<StubState>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        state.received.lock().unwrap().push(body);
        (state.status, Json(state.body))
    }

    /// Serve `status` and `body` for every POST to `/`.
    pub async fn spawn(status: StatusCode, body: Value) -> StubService {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            status,
            body,
            received: Arc::clone(&received),
        };

        let app = Router::new().route("/", post(respond)).with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        StubService {
            url: Url::parse(&format!("http://{addr}/")).unwrap(),
            received,
        }
    }

    /// A client pointed at a port nothing listens on.
    pub async fn unreachable(service: Service) -> ServiceClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        ServiceClient::new(Client::new(), service, url, Duration::from_secs(2))
    }
}
