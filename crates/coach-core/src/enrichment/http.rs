//! HTTP client for the enrichment worker.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

use super::*;

/// POSTs JSON tasks to `<base_url>/tasks/<name>`.
#[derive(Clone)]
pub struct HttpEnrichmentClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEnrichmentClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_task<B, T>(&self, task: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = format!("{}/tasks/{}", self.base_url, task);
        debug!(url = %url, "Posting enrichment task");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::enrichment(format!("Worker {} request failed: {}", task, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::enrichment(format!(
                "Worker {} failed ({}): {}",
                task,
                status.as_u16(),
                text
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| {
                Error::enrichment(format!("Worker {} returned malformed body: {}", task, e))
            })
    }
}

#[async_trait]
impl EnrichmentClient for HttpEnrichmentClient {
    async fn evaluate(&self, request: EvaluateRequest) -> Result<NewEvaluation> {
        self.post_task("evaluate", &request).await
    }

    async fn summarize(&self, request: SummarizeRequest) -> Result<SummaryPayload> {
        self.post_task("summarize", &request).await
    }

    async fn suggest_nudges(&self, request: NudgesRequest) -> Result<NudgesPayload> {
        self.post_task("nudges", &request).await
    }

    async fn derive_metadata(&self, request: MetadataRequest) -> Result<MetadataPayload> {
        self.post_task("session-metadata", &request).await
    }

    async fn draft_followup(&self, request: FollowupRequest) -> Result<FollowupEmail> {
        self.post_task("followup-email", &request).await
    }
}
