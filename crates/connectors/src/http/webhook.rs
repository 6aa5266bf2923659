//! Webhook destination adapter: POSTs the canonical envelope (or a batch
//! envelope) to a configured URL, with a HEAD-request connectivity probe
//! used by `testConnection()` (SPEC_FULL.md §9 Open Question resolution).

use std::time::Duration;

use model::envelope::{BatchEnvelope, CanonicalEnvelope};
use reqwest::{Client, StatusCode};

use crate::error::{ConnectorError, DbError};

pub struct WebhookAdapter {
    client: Client,
    url: String,
}

impl WebhookAdapter {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConnectorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConnectorError::Http)?;
        Ok(WebhookAdapter {
            client,
            url: url.to_string(),
        })
    }

    /// A lightweight reachability check; most webhook receivers don't
    /// implement HEAD, so any non-5xx response counts as "connected".
    pub async fn probe(&self) -> Result<bool, ConnectorError> {
        let response = self.client.head(&self.url).send().await?;
        Ok(response.status().as_u16() < 500)
    }

    pub async fn send_one(&self, envelope: &CanonicalEnvelope) -> Result<(), DbError> {
        let response = self
            .client
            .post(&self.url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        ensure_success(response).await
    }

    pub async fn send_batch(&self, batch: &BatchEnvelope) -> Result<(), DbError> {
        let response = self
            .client
            .post(&self.url)
            .json(batch)
            .send()
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<(), DbError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(DbError::Provider(format!(
            "webhook returned {status}, retriable: {body}"
        )));
    }
    Err(DbError::Write(format!("webhook returned {status}: {body}")))
}
