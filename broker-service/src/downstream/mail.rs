//! Mail adapter.

use async_trait::async_trait;
use tracing::info;

use super::{Downstream, ServiceClient};
use crate::gateway::{GatewayError, MailPayload, Reply};

pub struct MailAdapter {
    client: ServiceClient,
}

impl MailAdapter {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downstream<MailPayload> for MailAdapter {
    async fn call(&self, payload: MailPayload) -> Result<Reply, GatewayError> {
        let response = self.client.post_json(&payload).await?;
        self.client.expect_accepted(response)?;

        info!(to = %payload.to, subject = %payload.subject, "mail_sent");

        Ok(Reply::new(format!("Message send to {}", payload.to)))
    }
}
