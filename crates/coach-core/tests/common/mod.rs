//! Shared harness for orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use coach_core::cache::MemoryKv;
use coach_core::config::{CoachConfig, JobSettings};
use coach_core::enrichment::{
    EnrichmentClient, EvaluateRequest, FollowupRequest, MetadataPayload, MetadataRequest,
    NudgesPayload, NudgesRequest, SummarizeRequest, SummaryPayload,
};
use coach_core::{
    Database, Error, FollowupEmail, ManualClock, NewEvaluation, NewSession, Result,
    SessionOrchestrator,
};

pub const START_MS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Evaluate,
    Summarize,
    Nudges,
    Metadata,
    Followup,
}

/// Enrichment worker double with per-call counters, failure switches and gates.
#[derive(Default)]
pub struct ScriptedClient {
    counts: Mutex<HashMap<Call, usize>>,
    failing: Mutex<HashSet<Call>>,
    gates: Mutex<HashMap<Call, Arc<Semaphore>>>,
    summary_inputs: Mutex<Vec<(String, usize)>>,
    in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn calls(&self, call: Call) -> usize {
        self.counts.lock().unwrap().get(&call).copied().unwrap_or(0)
    }

    pub fn fail(&self, call: Call) {
        self.failing.lock().unwrap().insert(call);
    }

    pub fn recover(&self, call: Call) {
        self.failing.lock().unwrap().remove(&call);
    }

    /// Hold every `call` until permits are added to the returned semaphore.
    pub fn gate(&self, call: Call) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates.lock().unwrap().insert(call, Arc::clone(&gate));
        gate
    }

    /// `(prior_summary, new_turn_count)` for each summarize call, in order.
    pub fn summary_inputs(&self) -> Vec<(String, usize)> {
        self.summary_inputs.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) -> Result<()> {
        *self.counts.lock().unwrap().entry(call).or_default() += 1;

        let gate = self.gates.lock().unwrap().get(&call).cloned();
        if let Some(gate) = gate {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let permit = gate.acquire().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Ok(permit) = permit {
                permit.forget();
            }
        }

        if self.failing.lock().unwrap().contains(&call) {
            return Err(Error::enrichment(format!("{:?} unavailable", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl EnrichmentClient for ScriptedClient {
    async fn evaluate(&self, _request: EvaluateRequest) -> Result<NewEvaluation> {
        self.enter(Call::Evaluate).await?;
        Ok(NewEvaluation {
            score: 8,
            strengths: vec!["Warm opening".into()],
            improvements: vec!["Quantify project impact".into()],
            next_actions: vec!["Send a thank-you note within a day".into()],
            follow_up_email: "Thanks again for the chat!".into(),
        })
    }

    async fn summarize(&self, request: SummarizeRequest) -> Result<SummaryPayload> {
        self.enter(Call::Summarize).await?;
        self.summary_inputs
            .lock()
            .unwrap()
            .push((request.prior_summary.clone(), request.new_turns.len()));
        Ok(SummaryPayload {
            summary: format!("Summary after {} new turns", request.new_turns.len()),
        })
    }

    async fn suggest_nudges(&self, _request: NudgesRequest) -> Result<NudgesPayload> {
        self.enter(Call::Nudges).await?;
        Ok(NudgesPayload {
            nudges: vec![
                "Ask what their team is shipping next".into(),
                "  ".into(),
                "Share one metric from your last project".into(),
                "Thank them for their time".into(),
            ],
        })
    }

    async fn derive_metadata(&self, _request: MetadataRequest) -> Result<MetadataPayload> {
        self.enter(Call::Metadata).await?;
        Ok(MetadataPayload {
            display_title: "Coffee chat with a staff engineer".into(),
            goal_summary: "Learn how platform teams hire".into(),
        })
    }

    async fn draft_followup(&self, _request: FollowupRequest) -> Result<FollowupEmail> {
        self.enter(Call::Followup).await?;
        Ok(FollowupEmail {
            subject: "Great talking today".into(),
            body: "Hi Dana,\n\nThanks for the advice on interviews.".into(),
        })
    }
}

pub struct Harness {
    pub orchestrator: SessionOrchestrator,
    pub client: Arc<ScriptedClient>,
    pub clock: Arc<ManualClock>,
    pub kv: Arc<MemoryKv>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_database(Database::open_in_memory().unwrap())
    }

    /// Harness over a database file other connections can open.
    pub fn on_disk(path: &Path) -> Self {
        Self::with_database(Database::open_path(path).unwrap())
    }

    fn with_database(db: Database) -> Self {
        let client = Arc::new(ScriptedClient::default());
        let clock = Arc::new(ManualClock::new(START_MS));
        let kv = Arc::new(MemoryKv::new());
        let db = Arc::new(db);

        let config = CoachConfig {
            jobs: JobSettings::default().with_retry_delays(1),
            ..Default::default()
        };

        let orchestrator = SessionOrchestrator::new(
            db,
            kv.clone(),
            client.clone(),
            clock.clone(),
            config,
        );

        Self {
            orchestrator,
            client,
            clock,
            kv,
        }
    }

    pub async fn session(&self, goal: &str) -> String {
        let session = self
            .orchestrator
            .create_session(NewSession {
                user_id: "alex".into(),
                goal: goal.into(),
                ..Default::default()
            })
            .await
            .unwrap();
        self.orchestrator.wait_idle().await;
        session.id
    }

    pub async fn user_says(&self, session_id: &str, content: &str) {
        self.orchestrator
            .append_turn(session_id, "user", content)
            .await
            .unwrap();
    }

    pub async fn assistant_says(&self, session_id: &str, content: &str) {
        self.orchestrator
            .append_turn(session_id, "assistant", content)
            .await
            .unwrap();
    }
}
