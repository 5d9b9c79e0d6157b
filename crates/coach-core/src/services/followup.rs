//! Follow-up email drafts.

use std::sync::Arc;
use tracing::{info, warn};

use crate::enrichment::{EnrichmentClient, FollowupRequest, fallback_followup, validate_followup};
use crate::error::Result;
use crate::jobs::{RetryPolicy, run_with_retry};
use crate::store::SessionStore;
use crate::types::{FollowupEmail, FollowupLength, FollowupTone, Session};

pub struct FollowupService {
    store: Arc<SessionStore>,
    client: Arc<dyn EnrichmentClient>,
    retry: RetryPolicy,
}

impl FollowupService {
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

    /// Draft a follow-up email and cache it on the session.
    ///
    /// Falls back to a fixed template when the worker fails.
    pub async fn generate(
        &self,
        session: &Session,
        tone: FollowupTone,
        length: FollowupLength,
    ) -> Result<FollowupEmail> {
        let evaluation = self.store.get_evaluation(&session.id).await?;
        let turns = self.store.get_turns(&session.id).await?;

        let drafted = run_with_retry(&self.retry, "followup", &session.id, |_| {
            let request = FollowupRequest {
                session: session.clone(),
                evaluation: evaluation.clone(),
                turns: turns.clone(),
                tone,
                length,
            };
            async move { validate_followup(self.client.draft_followup(request).await?) }
        })
        .await;

        let email = match drafted {
            Ok(email) => email,
            Err(e) => {
                warn!(
                    session_id = %session.id,
                    error = %e,
                    "Follow-up draft unavailable; using template"
                );
                fallback_followup(session, evaluation.as_ref(), tone, length)
            }
        };

        self.store
            .save_followup_draft(&session.id, email.clone())
            .await?;
        info!(
            session_id = %session.id,
            tone = tone.as_str(),
            length = length.as_str(),
            "Follow-up drafted"
        );
        Ok(email)
    }
}
