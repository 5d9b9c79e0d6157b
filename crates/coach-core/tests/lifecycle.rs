//! End-to-end session lifecycle against an in-memory database and a scripted worker.

mod common;

use common::{Call, Harness, START_MS};
use tokio_test::{assert_err, assert_ok};

use coach_core::cache::CacheKey;
use coach_core::jobs::JobKind;
use coach_core::stage::AdvanceGate;
use coach_core::{
    CardUpdate, Clock, Error, KvStore, NewSession, NewVocabulary, SessionStatus, Stage,
};

// ─────────────────────────────────────────────────────────────────────────────
// Stage progression
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_small_talk_advances_to_experience_after_intros_and_dwell() {
    let h = Harness::new();
    let id = h.session("Coffee chat with a staff engineer").await;

    let mut last = 0;
    for content in [
        "Hi! I'm a backend engineer at a payments startup.",
        "Recently I have been curious about platform work.",
        "Nice to meet you too.",
    ] {
        h.user_says(&id, content).await;
        h.assistant_says(&id, "Tell me more.").await;
        let session = h.orchestrator.get_session(&id).await.unwrap();
        assert!(session.stage_user_turns > last);
        last = session.stage_user_turns;
    }
    assert_eq!(last, 3);

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert!(session.stage_signals.has_intro_or_context);

    h.clock.advance_secs(61);
    let outcome = assert_ok!(
        h.orchestrator
            .request_stage_transition(&id, "EXPERIENCE", None, Some("intro done"))
            .await
    );

    assert!(outcome.applied);
    assert_eq!(outcome.next_stage, Stage::Experience);
    assert_eq!(
        outcome.reason,
        "Transition approved: SMALL_TALK -> EXPERIENCE (intro done)"
    );
    assert_eq!(outcome.session.stage, Stage::Experience);
    assert_eq!(outcome.session.stage_user_turns, 0);
    assert!(outcome.session.stage_signals.is_empty());
    assert_eq!(outcome.session.stage_entered_at, h.clock.now_ms());

    h.orchestrator.wait_idle().await;
}

#[tokio::test]
async fn test_multi_stage_jump_is_never_applied() {
    let h = Harness::new();
    let id = h.session("Ask about recruiting").await;

    for _ in 0..5 {
        h.user_says(&id, "I'm a student working on a team project").await;
    }
    h.clock.advance_secs(600);

    let before = h.orchestrator.get_session(&id).await.unwrap();
    let outcome = h
        .orchestrator
        .request_stage_transition(&id, "ADVICE", Some("user"), None)
        .await
        .unwrap();

    assert!(!outcome.applied);
    assert_eq!(outcome.next_stage, Stage::SmallTalk);
    assert_eq!(outcome.reason, "Only one-stage forward transition is allowed");

    let after = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(after.stage, Stage::SmallTalk);
    assert_eq!(after.stage_user_turns, before.stage_user_turns);
    assert_eq!(after.stage_entered_at, before.stage_entered_at);
    assert_eq!(after.stage_signals, before.stage_signals);

    for (target, reason) in [
        ("SMALL_TALK", "Target stage is not ahead of current stage"),
        ("lunch", "Unknown target stage"),
    ] {
        let outcome = h
            .orchestrator
            .request_stage_transition(&id, target, None, None)
            .await
            .unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.reason, reason);
    }

    h.orchestrator.wait_idle().await;
}

#[tokio::test]
async fn test_zero_user_turns_never_advance() {
    let h = Harness::new();
    let id = h.session("Meet a product manager").await;

    h.assistant_says(&id, "Hi there, thanks for joining!").await;
    h.clock.advance_secs(3600);

    let decision = h.orchestrator.evaluate_stage_advance(&id, None).await.unwrap();
    assert!(!decision.advance);
    assert_eq!(decision.next_stage, Stage::SmallTalk);

    let outcome = h
        .orchestrator
        .request_stage_transition(&id, "experience", None, None)
        .await
        .unwrap();
    assert!(!outcome.applied);
    assert!(outcome.reason.starts_with("Stage policy not satisfied"));

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.stage, Stage::SmallTalk);
    assert_eq!(session.stage_user_turns, 0);

    h.orchestrator.wait_idle().await;
}

#[tokio::test]
async fn test_turn_ceiling_advances_without_signals_or_dwell() {
    let h = Harness::new();
    let id = h.session("Practice small talk").await;

    for _ in 0..5 {
        h.user_says(&id, "sounds good").await;
    }

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.stage_user_turns, 5);
    assert!(session.stage_signals.is_empty());

    let decision = h.orchestrator.evaluate_stage_advance(&id, None).await.unwrap();
    assert!(decision.advance);
    assert_eq!(decision.gate, Some(AdvanceGate::TurnFallback));
    assert_eq!(decision.next_stage, Stage::Experience);

    let outcome = h
        .orchestrator
        .request_stage_transition(&id, "PROJECTS", None, None)
        .await
        .unwrap();
    assert!(outcome.applied);
    assert_eq!(outcome.session.stage, Stage::Experience);

    h.orchestrator.wait_idle().await;
}

#[tokio::test]
async fn test_forced_target_only_honoured_one_step_ahead() {
    let h = Harness::new();
    let id = h.session("Learn about platform teams").await;

    for _ in 0..5 {
        h.user_says(&id, "ok").await;
    }

    let decision = h
        .orchestrator
        .evaluate_stage_advance(&id, Some("Can we talk about your work experience?"))
        .await
        .unwrap();
    assert!(decision.advance);
    assert_eq!(decision.next_stage, Stage::Experience);
    assert_eq!(decision.reason, "Forced target stage");

    let decision = h
        .orchestrator
        .evaluate_stage_advance(&id, Some("let's wrap up"))
        .await
        .unwrap();
    assert!(decision.advance);
    assert_eq!(decision.next_stage, Stage::Experience);
    assert_eq!(decision.reason, "Policy satisfied");

    h.orchestrator.wait_idle().await;
}

#[tokio::test]
async fn test_turn_timestamps_strictly_increase_under_frozen_clock() {
    let h = Harness::new();
    let id = h.session("Timestamp ordering").await;

    let (a, b, c, d) = tokio::join!(
        h.orchestrator.append_turn(&id, "user", "one"),
        h.orchestrator.append_turn(&id, "assistant", "two"),
        h.orchestrator.append_turn(&id, "user", "three"),
        h.orchestrator.append_turn(&id, "user", "four"),
    );
    for result in [a, b, c, d] {
        assert_ok!(result);
    }
    h.orchestrator.wait_idle().await;

    let turns = h.orchestrator.store().get_turns(&id).await.unwrap();
    assert_eq!(turns.len(), 4);
    assert!(turns.windows(2).all(|w| w[0].created_at < w[1].created_at));
    assert!(turns[0].created_at >= START_MS);

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.stage_user_turns, 3);
}

#[tokio::test]
async fn test_append_validation() {
    let h = Harness::new();
    let id = h.session("Validation").await;

    assert!(matches!(
        h.orchestrator.append_turn(&id, "narrator", "hi").await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.orchestrator.append_turn(&id, "user", "   ").await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.orchestrator.append_turn("missing", "user", "hi").await,
        Err(Error::SessionNotFound(_))
    ));
    assert!(matches!(
        h.orchestrator
            .request_stage_transition(&id, " ", None, None)
            .await,
        Err(Error::Validation(_))
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Finalize and evaluation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_finalize_is_idempotent_and_keeps_first_ended_at() {
    let h = Harness::new();
    let id = h.session("Coffee chat").await;
    h.user_says(&id, "Thanks so much for your time!").await;
    h.orchestrator.wait_idle().await;

    let gate = h.client.gate(Call::Evaluate);

    let first = assert_ok!(h.orchestrator.finalize_session(&id).await);
    assert!(first.queued);
    assert_eq!(first.message, "Evaluation queued");
    assert_eq!(first.session.status, SessionStatus::ProcessingEvaluation);
    let ended_at = first.session.ended_at.expect("ended_at stamped");

    h.clock.advance_secs(30);
    let second = assert_ok!(h.orchestrator.finalize_session(&id).await);
    assert!(!second.queued);
    assert_eq!(second.message, "Evaluation already in progress");
    assert_eq!(second.session.ended_at, Some(ended_at));

    gate.add_permits(1);
    h.orchestrator.wait_idle().await;

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Evaluated);
    assert_eq!(session.ended_at, Some(ended_at));

    h.clock.advance_secs(30);
    let third = assert_ok!(h.orchestrator.finalize_session(&id).await);
    assert!(!third.queued);
    assert_eq!(third.message, "Session already evaluated");
    assert_eq!(third.session.ended_at, Some(ended_at));

    h.orchestrator.wait_idle().await;
    assert_eq!(h.client.calls(Call::Evaluate), 1);

    let evaluation = h.orchestrator.get_evaluation(&id).await.unwrap().unwrap();
    assert_eq!(evaluation.score, 8);
    assert_eq!(evaluation.session_id, id);
}

#[tokio::test]
async fn test_evaluation_failure_is_visible_and_retryable() {
    let h = Harness::new();
    let id = h.session("Coffee chat").await;
    h.user_says(&id, "Hello!").await;
    h.orchestrator.wait_idle().await;

    h.client.fail(Call::Evaluate);
    let first = h.orchestrator.finalize_session(&id).await.unwrap();
    let ended_at = first.session.ended_at;
    h.orchestrator.wait_idle().await;

    assert_eq!(h.client.calls(Call::Evaluate), 3);
    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::EvaluationFailed);
    assert!(h.orchestrator.get_evaluation(&id).await.unwrap().is_none());

    h.client.recover(Call::Evaluate);
    h.clock.advance_secs(120);
    let retry = h.orchestrator.finalize_session(&id).await.unwrap();
    assert!(retry.queued);
    assert_eq!(retry.session.ended_at, ended_at);
    h.orchestrator.wait_idle().await;

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Evaluated);
    assert!(h.orchestrator.get_evaluation(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_storage_error_during_evaluation_marks_failed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coach.db");
    let h = Harness::on_disk(&path);
    let id = h.session("Coffee chat").await;
    h.user_says(&id, "Hello!").await;
    h.orchestrator.wait_idle().await;

    let gate = h.client.gate(Call::Evaluate);
    let first = h.orchestrator.finalize_session(&id).await.unwrap();
    assert!(first.queued);

    // The worker answers, but the evaluation can no longer be stored.
    let other = rusqlite::Connection::open(&path).unwrap();
    other.execute_batch("DROP TABLE evaluations;").unwrap();
    gate.add_permits(1);
    h.orchestrator.wait_idle().await;

    assert_eq!(h.client.calls(Call::Evaluate), 1);
    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::EvaluationFailed);

    gate.add_permits(1);
    let retry = h.orchestrator.finalize_session(&id).await.unwrap();
    assert!(retry.queued);
    h.orchestrator.wait_idle().await;
}

#[tokio::test]
async fn test_resume_pending_evaluations_requeues_in_flight_sessions() {
    let h = Harness::new();
    let id = h.session("Interrupted evaluation").await;

    // Finalized by a previous process that never ran the job.
    let finalized = h.orchestrator.store().finalize_session(&id).await.unwrap();
    assert!(finalized.started);
    assert_eq!(h.client.calls(Call::Evaluate), 0);

    let requeued = h.orchestrator.resume_pending_evaluations().await.unwrap();
    assert_eq!(requeued, 1);
    h.orchestrator.wait_idle().await;

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Evaluated);
    assert_eq!(h.orchestrator.resume_pending_evaluations().await.unwrap(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Background jobs
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pending_marker_deduplicates_summary_jobs() {
    let h = Harness::new();
    let id = h.session("Dedup").await;

    let gate = h.client.gate(Call::Summarize);
    h.user_says(&id, "first").await;
    h.user_says(&id, "second").await;

    assert!(!h.orchestrator.queue_job(JobKind::Summary, &id).await);

    gate.add_permits(1);
    h.orchestrator.wait_idle().await;
    assert_eq!(h.client.calls(Call::Summarize), 1);

    // Marker released; the next trigger runs again.
    h.user_says(&id, "third").await;
    gate.add_permits(1);
    h.orchestrator.wait_idle().await;
    assert_eq!(h.client.calls(Call::Summarize), 2);
}

#[tokio::test]
async fn test_summary_only_sends_turns_after_cursor() {
    let h = Harness::new();
    let id = h.session("Summaries").await;

    h.user_says(&id, "I'm a data engineer.").await;
    h.orchestrator.wait_idle().await;
    h.assistant_says(&id, "What do you work on?").await;
    h.orchestrator.wait_idle().await;

    assert_eq!(
        h.client.summary_inputs(),
        vec![
            (String::new(), 1),
            ("Summary after 1 new turns".to_string(), 1),
        ]
    );

    let turns = h.orchestrator.store().get_turns(&id).await.unwrap();
    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.summary_cursor_at, Some(turns[1].created_at));
    assert_eq!(
        session.conversation_summary.as_deref(),
        Some("Summary after 1 new turns")
    );

    // Nothing new since the cursor: no remote call.
    assert!(h.orchestrator.queue_job(JobKind::Summary, &id).await);
    h.orchestrator.wait_idle().await;
    assert_eq!(h.client.calls(Call::Summarize), 2);
}

#[tokio::test]
async fn test_failed_summary_keeps_prior_state() {
    let h = Harness::new();
    let id = h.session("Summaries").await;

    h.user_says(&id, "hello").await;
    h.orchestrator.wait_idle().await;
    let before = h.orchestrator.get_session(&id).await.unwrap();

    h.client.fail(Call::Summarize);
    h.user_says(&id, "more").await;
    h.orchestrator.wait_idle().await;

    let after = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(after.conversation_summary, before.conversation_summary);
    assert_eq!(after.summary_cursor_at, before.summary_cursor_at);
    assert_eq!(h.client.calls(Call::Summarize), 3);
    assert!(h.orchestrator.tasks().is_empty());
}

#[tokio::test]
async fn test_nudges_refresh_on_create_and_assistant_turns() {
    let h = Harness::new();
    let id = h.session("Nudges").await;

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(
        session.talk_nudges,
        vec![
            "Ask what their team is shipping next",
            "Share one metric from your last project",
            "Thank them for their time",
        ]
    );
    assert_eq!(h.client.calls(Call::Nudges), 1);

    h.user_says(&id, "user turns do not refresh nudges").await;
    h.orchestrator.wait_idle().await;
    assert_eq!(h.client.calls(Call::Nudges), 1);

    h.client.fail(Call::Nudges);
    h.assistant_says(&id, "What brought you here?").await;
    h.orchestrator.wait_idle().await;
    assert_eq!(h.client.calls(Call::Nudges), 3);

    let after = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(after.talk_nudges, session.talk_nudges);
}

#[tokio::test]
async fn test_create_survives_worker_outage() {
    let h = Harness::new();
    h.client.fail(Call::Nudges);
    h.client.fail(Call::Metadata);

    let goal = "Understand how to move from QA automation into an SRE role at a larger company";
    let id = h.session(goal).await;

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert!(session.talk_nudges.is_empty());
    let title = session.display_title.unwrap();
    assert!(title.ends_with('…'));
    assert!(title.chars().count() <= 56);
    assert_eq!(session.goal_summary.as_deref(), Some(goal));
}

#[tokio::test]
async fn test_metadata_follows_rename() {
    let h = Harness::new();
    let id = h.session("Chat with Dana").await;

    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(
        session.display_title.as_deref(),
        Some("Coffee chat with a staff engineer")
    );
    assert_eq!(h.client.calls(Call::Metadata), 1);

    h.client.fail(Call::Metadata);
    let renamed = h
        .orchestrator
        .rename_session(&id, "  Ask Dana about interviews  ")
        .await
        .unwrap();
    assert_eq!(renamed.goal, "Ask Dana about interviews");
    h.orchestrator.wait_idle().await;

    assert_eq!(h.client.calls(Call::Metadata), 3);
    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(
        session.display_title.as_deref(),
        Some("Ask Dana about interviews")
    );

    assert!(matches!(
        h.orchestrator.rename_session(&id, "   ").await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.orchestrator.rename_session(&id, &"x".repeat(181)).await,
        Err(Error::Validation(_))
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Reads, cache and follow-up
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reads_never_serve_stale_snapshots_after_writes() {
    let h = Harness::new();
    let id = h.session("Cache coherence").await;

    let cached = h.orchestrator.get_session(&id).await.unwrap();
    let listed = h.orchestrator.list_sessions("alex").await.unwrap();
    assert_eq!(listed.len(), 1);
    let key = CacheKey::session(&id).render();
    assert!(h.kv.get(&key).await.unwrap().is_some());

    h.orchestrator.rename_session(&id, "Renamed goal").await.unwrap();
    assert_eq!(
        h.orchestrator.get_session(&id).await.unwrap().goal,
        "Renamed goal"
    );
    assert_eq!(
        h.orchestrator.list_sessions("alex").await.unwrap()[0].goal,
        "Renamed goal"
    );

    h.user_says(&id, "I'm a designer").await;
    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.stage_user_turns, cached.stage_user_turns + 1);

    h.orchestrator.wait_idle().await;
}

#[tokio::test]
async fn test_resume_bundle() {
    let h = Harness::new();
    let id = h.session("Resume me").await;

    h.user_says(&id, "one").await;
    h.assistant_says(&id, "two").await;
    h.user_says(&id, "three").await;
    h.orchestrator.wait_idle().await;

    let resume = h.orchestrator.get_resume(&id, Some(2)).await.unwrap();
    let contents: Vec<&str> = resume.recent_turns.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["two", "three"]);
    assert_eq!(resume.talk_nudges.len(), 2);
    assert!(resume.summary.is_some());
    assert!(resume.stage_hint.starts_with("Start with warm opening"));
    assert!(resume.context_summary.starts_with("Default networking context"));

    let full = h.orchestrator.get_resume(&id, None).await.unwrap();
    assert_eq!(full.recent_turns.len(), 3);

    assert!(h.orchestrator.get_resume("missing", None).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_followup_email_from_worker_and_template() {
    let h = Harness::new();
    let id = h.session("platform engineering careers").await;

    let drafted = h
        .orchestrator
        .generate_followup_email(&id, None, None)
        .await
        .unwrap();
    assert_eq!(drafted.subject, "Great talking today");
    let session = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(session.followup_draft, Some(drafted));

    h.client.fail(Call::Followup);
    let fallback = h
        .orchestrator
        .generate_followup_email(&id, Some("friendly"), Some("short"))
        .await
        .unwrap();
    assert_eq!(
        fallback.subject,
        "Follow-up from our networking chat on platform engineering careers"
    );
    assert!(fallback.body.contains("Great chatting today"));
    assert!(!fallback.body.contains("P.S."));

    h.orchestrator.finalize_session(&id).await.unwrap();
    h.orchestrator.wait_idle().await;

    let with_score = h
        .orchestrator
        .generate_followup_email(&id, None, Some("long"))
        .await
        .unwrap();
    assert!(with_score.body.starts_with("Hi,\n\nThanks for the conversation"));
    assert!(with_score.body.contains(
        "P.S. My latest practice score is 8/10 and I am focusing on: Send a thank-you note within a day."
    ));
    assert!(with_score.body.ends_with("Best regards,\nalex"));

    assert_err!(
        h.orchestrator
            .generate_followup_email(&id, None, Some("epic"))
            .await
    );
}

#[tokio::test]
async fn test_delete_cascades() {
    let h = Harness::new();
    let id = h.session("Short-lived").await;
    h.user_says(&id, "hello").await;
    h.orchestrator.finalize_session(&id).await.unwrap();
    h.orchestrator.wait_idle().await;
    assert!(h.orchestrator.get_evaluation(&id).await.unwrap().is_some());

    let outcome = h.orchestrator.delete_session(&id).await.unwrap();
    assert!(outcome.deleted);

    assert!(h.orchestrator.get_session(&id).await.unwrap_err().is_not_found());
    assert!(h.orchestrator.get_evaluation(&id).await.unwrap_err().is_not_found());
    assert!(h.orchestrator.store().get_turns(&id).await.unwrap().is_empty());
    assert!(h.orchestrator.list_sessions("alex").await.unwrap().is_empty());
    assert!(h.orchestrator.delete_session(&id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_create_validation() {
    let h = Harness::new();
    for (user_id, goal) in [("", "goal"), ("alex", "   ")] {
        let result = h
            .orchestrator
            .create_session(NewSession {
                user_id: user_id.into(),
                goal: goal.into(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
    assert_eq!(h.client.calls(Call::Nudges), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Vocabulary review
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_vocabulary_review_cycle() {
    let h = Harness::new();

    let entry = h
        .orchestrator
        .save_vocabulary(
            "alex",
            NewVocabulary {
                text: "leverage".into(),
                definition: "use to maximum advantage".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(entry.card.reps, 0);
    assert_eq!(entry.card.due_at, START_MS);

    let due = h.orchestrator.start_review("alex").await.unwrap();
    assert_eq!(due.len(), 1);
    assert!(h.orchestrator.start_review("sam").await.unwrap().is_empty());

    let foreign = h
        .orchestrator
        .save_review(
            "sam",
            vec![CardUpdate {
                vocabulary_id: entry.id.clone(),
                due_at: Some(START_MS + 86_400_000),
                ..Default::default()
            }],
        )
        .await
        .unwrap();
    assert_eq!(foreign.saved_count, 0);

    let saved = h
        .orchestrator
        .save_review(
            "alex",
            vec![CardUpdate {
                vocabulary_id: entry.id.clone(),
                due_at: Some(START_MS + 86_400_000),
                reps: Some(1),
                ..Default::default()
            }],
        )
        .await
        .unwrap();
    assert!(saved.success);
    assert_eq!(saved.saved_count, 1);

    assert!(h.orchestrator.start_review("alex").await.unwrap().is_empty());

    assert!(matches!(
        h.orchestrator
            .save_vocabulary("alex", NewVocabulary::default())
            .await,
        Err(Error::Validation(_))
    ));
}
