//! Rolling conversation summary.

use std::sync::Arc;
use tracing::{debug, info};

use crate::enrichment::{EnrichmentClient, SummarizeRequest, validate_summary};
use crate::error::Result;
use crate::jobs::{RetryPolicy, run_with_retry};
use crate::store::SessionStore;
use crate::types::Session;

pub struct SummaryService {
    store: Arc<SessionStore>,
    client: Arc<dyn EnrichmentClient>,
    retry: RetryPolicy,
    initial_turns: usize,
    incremental_turns: usize,
}

impl SummaryService {
    pub fn new(
        store: Arc<SessionStore>,
        client: Arc<dyn EnrichmentClient>,
        retry: RetryPolicy,
        initial_turns: usize,
        incremental_turns: usize,
    ) -> Self {
        Self {
            store,
            client,
            retry,
            initial_turns,
            incremental_turns,
        }
    }

    /// Fold turns after the cursor into the summary.
    ///
    /// The first run summarizes the most recent turns. Returns the updated
    /// session, or `None` when there was nothing to do.
    pub async fn refresh(&self, session_id: &str) -> Result<Option<Session>> {
        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(None);
        };

        let new_turns = match session.summary_cursor_at {
            Some(cursor) => {
                self.store
                    .list_turns_after(session_id, cursor, self.incremental_turns)
                    .await?
            }
            None => {
                self.store
                    .list_recent_turns(session_id, self.initial_turns)
                    .await?
            }
        };

        let Some(cursor_at) = new_turns.last().map(|t| t.created_at) else {
            debug!(session_id = %session_id, "No new turns to summarize");
            return Ok(None);
        };

        let prior_summary = session.conversation_summary.clone().unwrap_or_default();
        let summary = run_with_retry(&self.retry, "summary", session_id, |_| {
            let request = SummarizeRequest {
                session: session.clone(),
                prior_summary: prior_summary.clone(),
                new_turns: new_turns.clone(),
            };
            async move { validate_summary(self.client.summarize(request).await?) }
        })
        .await?;

        let updated = self
            .store
            .save_conversation_summary(session_id, summary, Some(cursor_at))
            .await?;
        info!(session_id = %session_id, turns = new_turns.len(), "Summary updated");
        Ok(updated)
    }
}
