use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::application::purge::PurgeAction;

use super::error::InfraError;

#[derive(Debug, Serialize)]
struct WebhookPayload {
    event: &'static str,
}

/// Purge action that notifies an external cache over HTTP.
///
/// Delivery runs on a spawned task; the purge request never waits for it.
#[derive(Clone)]
pub struct WebhookPurge {
    client: reqwest::Client,
    endpoint: Url,
}

impl WebhookPurge {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("webhook client: {err}")))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn deliver(client: reqwest::Client, endpoint: Url) {
        let result = client
            .post(endpoint.clone())
            .json(&WebhookPayload { event: "purge" })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(response) => debug!(
                target = "remote_purge::webhook",
                endpoint = %endpoint,
                status = response.status().as_u16(),
                "purge webhook delivered"
            ),
            Err(err) => warn!(
                target = "remote_purge::webhook",
                endpoint = %endpoint,
                error = %err,
                "purge webhook failed"
            ),
        }
    }
}

#[async_trait]
impl PurgeAction for WebhookPurge {
    async fn trigger(&self) {
        tokio::spawn(Self::deliver(self.client.clone(), self.endpoint.clone()));
    }
}
