//! Talk nudges: short hints for the user's next line.

use std::sync::Arc;
use tracing::info;

use crate::enrichment::{EnrichmentClient, NudgesRequest, validate_nudges};
use crate::error::Result;
use crate::jobs::{RetryPolicy, run_with_retry};
use crate::store::SessionStore;

pub struct NudgeService {
    store: Arc<SessionStore>,
    client: Arc<dyn EnrichmentClient>,
    retry: RetryPolicy,
    recent_turns: usize,
}

impl NudgeService {
    pub fn new(
        store: Arc<SessionStore>,
        client: Arc<dyn EnrichmentClient>,
        retry: RetryPolicy,
        recent_turns: usize,
    ) -> Self {
        Self {
            store,
            client,
            retry,
            recent_turns,
        }
    }

    /// Generate and store up to three nudges from the recent window.
    pub async fn refresh(&self, session_id: &str) -> Result<Vec<String>> {
        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(Vec::new());
        };
        let recent_turns = self
            .store
            .list_recent_turns(session_id, self.recent_turns)
            .await?;
        let conversation_summary = session.conversation_summary.clone().unwrap_or_default();

        let nudges = run_with_retry(&self.retry, "nudges", session_id, |_| {
            let request = NudgesRequest {
                session: session.clone(),
                conversation_summary: conversation_summary.clone(),
                recent_turns: recent_turns.clone(),
            };
            async move { validate_nudges(self.client.suggest_nudges(request).await?) }
        })
        .await?;

        self.store
            .save_talk_nudges(session_id, nudges.clone())
            .await?;
        info!(session_id = %session_id, count = nudges.len(), "Nudges updated");
        Ok(nudges)
    }
}
