//! SQS destination adapter: every replicated event is wrapped in the
//! canonical envelope (`model::envelope::CanonicalEnvelope`) and sent as
//! one message body, batched up to SQS's 10-message `SendMessageBatch`
//! limit (spec.md §4.4's Batch Pool feeds this in chunks).

use aws_sdk_sqs::{Client, types::SendMessageBatchRequestEntry};
use model::envelope::CanonicalEnvelope;

use crate::error::{ConnectorError, DbError};

pub struct SqsAdapter {
    client: Client,
    queue_url: String,
}

impl SqsAdapter {
    pub async fn connect(queue_url: &str, region: Option<&str>) -> Result<Self, ConnectorError> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        Ok(SqsAdapter {
            client: Client::new(&config),
            queue_url: queue_url.to_string(),
        })
    }

    /// `dedup_id`/`group_id` are only meaningful for FIFO queues; plain
    /// queues ignore them if set (spec.md §4.5).
    pub async fn send_one(
        &self,
        envelope: &CanonicalEnvelope,
        dedup_id: Option<&str>,
        group_id: Option<&str>,
    ) -> Result<(), DbError> {
        let body = serde_json::to_string(envelope).map_err(|e| DbError::Write(e.to_string()))?;
        let mut request = self.client.send_message().queue_url(&self.queue_url).message_body(body);
        if let Some(dedup_id) = dedup_id {
            request = request.message_deduplication_id(dedup_id);
        }
        if let Some(group_id) = group_id {
            request = request.message_group_id(group_id);
        }
        request.send().await.map_err(|e| DbError::Provider(e.to_string()))?;
        Ok(())
    }

    /// Sends up to 10 envelopes per `SendMessageBatch` call; callers are
    /// expected to chunk larger batches themselves. `dedup_id` is computed
    /// per-entry by the caller (`resource:operation:id`).
    pub async fn send_batch(
        &self,
        envelopes: &[(CanonicalEnvelope, Option<String>)],
        group_id: Option<&str>,
    ) -> Result<Vec<String>, DbError> {
        let entries: Result<Vec<_>, DbError> = envelopes
            .iter()
            .enumerate()
            .map(|(i, (env, dedup_id))| {
                let body = serde_json::to_string(env).map_err(|e| DbError::Write(e.to_string()))?;
                let mut builder = SendMessageBatchRequestEntry::builder().id(i.to_string()).message_body(body);
                if let Some(dedup_id) = dedup_id {
                    builder = builder.message_deduplication_id(dedup_id);
                }
                if let Some(group_id) = group_id {
                    builder = builder.message_group_id(group_id);
                }
                Ok(builder.build().map_err(|e| DbError::Write(e.to_string()))?)
            })
            .collect();
        let entries = entries?;

        let response = self
            .client
            .send_message_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;

        let failed: Vec<String> = response
            .failed()
            .iter()
            .map(|f| f.message().to_string())
            .collect();
        if !failed.is_empty() {
            return Err(DbError::Write(format!(
                "{} of {} messages failed: {}",
                failed.len(),
                envelopes.len(),
                failed.join("; ")
            )));
        }
        Ok(response.successful().iter().map(|s| s.message_id().to_string()).collect())
    }
}
