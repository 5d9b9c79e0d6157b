//! Display title and goal summary.

use std::sync::Arc;
use tracing::{info, warn};

use crate::enrichment::{EnrichmentClient, MetadataRequest, normalize_metadata};
use crate::error::Result;
use crate::jobs::{RetryPolicy, run_with_retry};
use crate::store::SessionStore;
use crate::types::Session;

pub struct MetadataService {
    store: Arc<SessionStore>,
    client: Arc<dyn EnrichmentClient>,
    retry: RetryPolicy,
}

impl MetadataService {
    pub fn new(
        store: Arc<SessionStore>,
        client: Arc<dyn EnrichmentClient>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            client,
            retry,
        }
    }

    /// Derive metadata from the goal and context.
    ///
    /// When the worker cannot produce it, the goal text itself is stored.
    pub async fn refresh(&self, session_id: &str) -> Result<Option<Session>> {
        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(None);
        };

        let request = MetadataRequest {
            goal: session.goal.clone(),
            target_profile_context: session.target_profile_context.clone(),
            custom_context: session.custom_context.clone(),
        };
        let payload = run_with_retry(&self.retry, "metadata", session_id, |_| {
            let request = request.clone();
            async move { self.client.derive_metadata(request).await }
        })
        .await;

        let payload = match payload {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    "Metadata unavailable; using goal text"
                );
                None
            }
        };

        let (display_title, goal_summary) = normalize_metadata(payload.as_ref(), &session.goal);
        let updated = self
            .store
            .save_session_metadata(session_id, display_title, goal_summary)
            .await?;
        info!(session_id = %session_id, "Session metadata updated");
        Ok(updated)
    }
}
