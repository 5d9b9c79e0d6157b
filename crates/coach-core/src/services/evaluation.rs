//! End-of-session evaluation.

use std::sync::Arc;
use tracing::{error, info};

use crate::enrichment::{EnrichmentClient, EvaluateRequest, validate_evaluation};
use crate::error::Result;
use crate::jobs::{RetryPolicy, run_with_retry};
use crate::store::SessionStore;
use crate::types::Evaluation;

pub struct EvaluationService {
    store: Arc<SessionStore>,
    client: Arc<dyn EnrichmentClient>,
    retry: RetryPolicy,
}

impl EvaluationService {
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

    /// Evaluate the full transcript.
    ///
    /// On success the evaluation is upserted and the session becomes
    /// EVALUATED. Once every attempt has failed the session becomes
    /// EVALUATION_FAILED and no evaluation row is written. A storage error
    /// anywhere in the job also ends in EVALUATION_FAILED so the session can
    /// be finalized again.
    pub async fn run(&self, session_id: &str) -> Result<Option<Evaluation>> {
        match self.evaluate(session_id).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Evaluation job aborted");
                if let Err(mark) = self.store.mark_evaluation_failed(session_id).await {
                    error!(
                        session_id = %session_id,
                        error = %mark,
                        "Could not record evaluation failure"
                    );
                }
                Err(e)
            }
        }
    }

    async fn evaluate(&self, session_id: &str) -> Result<Option<Evaluation>> {
        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(None);
        };
        let turns = self.store.get_turns(session_id).await?;

        let outcome = run_with_retry(&self.retry, "evaluation", session_id, |_| {
            let request = EvaluateRequest {
                session: session.clone(),
                turns: turns.clone(),
            };
            async move { validate_evaluation(self.client.evaluate(request).await?) }
        })
        .await;

        match outcome {
            Ok(evaluation) => {
                let score = evaluation.score;
                let saved = self.store.save_evaluation(session_id, evaluation).await?;
                info!(session_id = %session_id, score, "Evaluation completed");
                Ok(saved)
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Evaluation failed");
                self.store.mark_evaluation_failed(session_id).await?;
                Ok(None)
            }
        }
    }
}
