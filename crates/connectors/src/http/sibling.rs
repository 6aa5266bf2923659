//! Sibling-database destination adapter: replicates into another instance
//! of the same system via its Resource API (spec.md's "Sibling" driver).
//! `dryRun` logs the request that would have been sent without issuing it
//! (SPEC_FULL.md ambient testing affordance).

use model::{core::value::DataMap, event::Operation};
use reqwest::Client;
use tracing::info;

use crate::error::{ConnectorError, DbError};

pub struct SiblingAdapter {
    client: Client,
    base_url: String,
    dry_run: bool,
}

impl SiblingAdapter {
    pub fn new(base_url: &str, dry_run: bool) -> Result<Self, ConnectorError> {
        let client = Client::builder().build().map_err(ConnectorError::Http)?;
        Ok(SiblingAdapter {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dry_run,
        })
    }

    pub async fn probe(&self) -> Result<bool, ConnectorError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    pub async fn apply(
        &self,
        resource: &str,
        operation: Operation,
        id: &str,
        data: &DataMap,
    ) -> Result<(), DbError> {
        let url = format!("{}/resources/{resource}/{id}", self.base_url);
        if self.dry_run {
            info!(%resource, %operation, %id, "dry run: skipping sibling write");
            return Ok(());
        }

        let request = match operation {
            Operation::Insert | Operation::Update => self.client.put(&url).json(data),
            Operation::Delete => self.client.delete(&url),
        };
        let response = request
            .send()
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DbError::Write(format!("sibling API returned {status}: {body}")));
        }
        Ok(())
    }
}
