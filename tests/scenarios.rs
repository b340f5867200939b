//! Scenario tests exercising the arbitration engine and debate state
//! machine through the public crate API, one test per documented scenario.

use std::time::Duration;

use chrono::Utc;
use debate_core::arbitration::{ArbitrationEngine, RoundOutcome};
use debate_core::bus::{ArbitrationStatus, Response};
use debate_core::debate::{DebatePhase, DebateStateMachine, Speaker, TurnOutcome};
use debate_core::embedding::StubEmbeddingProvider;
use debate_core::Config;

fn response(agent: &str, round: u32, content: &str, confidence: f64) -> Response {
    Response {
        debate_id: "d-scenario".to_string(),
        round,
        agent: agent.to_string(),
        content: content.to_string(),
        confidence,
        reasoning: String::new(),
        timestamp: Utc::now(),
    }
}

// S1 — consensus in one round.
#[tokio::test]
async fn consensus_reached_with_near_identical_responses() {
    let engine = ArbitrationEngine::new(&Config::default());
    let embeddings = StubEmbeddingProvider;

    for (agent, conf) in [("Grok", 0.9), ("Claude", 0.8), ("GPT-4o", 0.7)] {
        let r = engine
            .record_response(
                response(agent, 0, "lock the mutex before the critical section", conf),
                &embeddings,
            )
            .await
            .expect("all responses carry declared roles");
        if agent != "GPT-4o" {
            assert!(r.is_none());
        } else {
            let outcome = match r.unwrap() {
                RoundOutcome::Decided(outcome) => outcome,
                other => panic!("expected a decided round, got {other:?}"),
            };
            assert_eq!(outcome.status, ArbitrationStatus::Consensus);
            assert_eq!(outcome.confidence, 0.9);
            assert_eq!(outcome.contributing_agents.len(), 3);
        }
    }
}

// S2 — strong confidence differential at round 2.
#[tokio::test]
async fn strong_confidence_wins_at_round_two() {
    let engine = ArbitrationEngine::new(&Config::default());
    let embeddings = StubEmbeddingProvider;

    let mut last = None;
    for (agent, content, conf) in [
        ("Grok", "aaaaaaaa", 0.95),
        ("Claude", "bbbbbbbb", 0.60),
        ("GPT-4o", "cccccccc", 0.55),
    ] {
        last = engine
            .record_response(response(agent, 2, content, conf), &embeddings)
            .await
            .expect("all responses carry declared roles");
    }
    let outcome = match last.unwrap() {
        RoundOutcome::Decided(outcome) => outcome,
        other => panic!("expected a decided round, got {other:?}"),
    };
    assert_eq!(outcome.status, ArbitrationStatus::StrongConfidence);
    assert_eq!(outcome.confidence, 0.95);
    assert_eq!(outcome.contributing_agents, vec!["Grok".to_string()]);
}

// S3 — divergent, low-confidence responses ask for another round.
#[tokio::test]
async fn undecided_round_asks_to_continue() {
    let engine = ArbitrationEngine::new(&Config::default());
    let embeddings = StubEmbeddingProvider;

    let mut last = None;
    for (agent, content, conf) in [
        ("Grok", "aaaaaaaa", 0.6),
        ("Claude", "bbbbbbbb", 0.55),
        ("GPT-4o", "cccccccc", 0.5),
    ] {
        last = engine
            .record_response(response(agent, 1, content, conf), &embeddings)
            .await
            .expect("all responses carry declared roles");
    }
    match last.unwrap() {
        RoundOutcome::Continue { round, next_round, .. } => {
            assert_eq!(round, 1);
            assert_eq!(next_round, 2);
        }
        other => panic!("expected a continue outcome, got {other:?}"),
    }
}

// S4 — max rounds forces a conclusion with a dissenting view.
#[tokio::test]
async fn max_rounds_concludes_with_dissenting_view() {
    let engine = ArbitrationEngine::new(&Config::default());
    let embeddings = StubEmbeddingProvider;

    let mut last = None;
    for (agent, content, conf) in [
        ("Grok", "aaaaaaaa", 0.6),
        ("Claude", "bbbbbbbb", 0.55),
        ("GPT-4o", "cccccccc", 0.5),
    ] {
        last = engine
            .record_response(response(agent, 4, content, conf), &embeddings)
            .await
            .expect("all responses carry declared roles");
    }
    let outcome = match last.unwrap() {
        RoundOutcome::Decided(outcome) => outcome,
        other => panic!("expected a decided round, got {other:?}"),
    };
    assert_eq!(outcome.status, ArbitrationStatus::Concluded);
    assert_eq!(outcome.winning_agent.as_deref(), Some("Grok"));
    let dissent = outcome.dissenting_view.expect("second-highest confidence present");
    assert_eq!(dissent.agent, "Claude");
}

// S5 — deadlock triggers the kill switch and resets the DSM.
#[test]
fn deadlock_resets_phase_and_stagnation_counter() {
    let mut dsm = DebateStateMachine::new(10);
    let embeddings = StubEmbeddingProvider;

    for content in ["aaaaaaaa", "bbbbbbbb", "cccccccc"] {
        let outcome = dsm.process_contribution(content, true, &embeddings);
        assert!(matches!(outcome, TurnOutcome::Advanced { .. }));
    }
    let outcome = dsm.process_contribution("dddddddd", true, &embeddings);
    assert!(matches!(outcome, TurnOutcome::KillSwitch { .. }));
    assert_eq!(dsm.current_phase(), DebatePhase::Propose);
    assert_eq!(dsm.turns_since_progress(), 0);
}

// S6 — near-duplicate content is a loop, advancing the phase without
// rotating the speaker back to the start.
#[test]
fn loop_detection_advances_phase_without_wrapping() {
    let mut dsm = DebateStateMachine::new(10);
    let embeddings = StubEmbeddingProvider;

    dsm.process_contribution("same wording entirely", false, &embeddings);
    assert_eq!(dsm.current_phase(), DebatePhase::Critique);
    let outcome = dsm.process_contribution("same wording entirely", false, &embeddings);
    assert_eq!(outcome, TurnOutcome::LoopDetected);
    assert_eq!(dsm.current_phase(), DebatePhase::Refine);
}

// S7 — a debate that exceeds the timeout is concluded on the next
// ingested response even though fewer than R responses arrived.
#[tokio::test]
async fn timed_out_debate_concludes_on_next_response() {
    let config = Config {
        debate_timeout: Duration::from_millis(20),
        ..Config::default()
    };
    let engine = ArbitrationEngine::new(&config);
    let embeddings = StubEmbeddingProvider;

    let first = engine
        .record_response(response("Grok", 1, "sole response", 0.7), &embeddings)
        .await
        .expect("all responses carry declared roles");
    assert!(first.is_none());

    tokio::time::sleep(Duration::from_millis(30)).await;

    let outcome = match engine
        .record_response(response("Grok", 1, "sole response", 0.7), &embeddings)
        .await
        .expect("all responses carry declared roles")
        .expect("elapsed debate_timeout forces conclusion")
    {
        RoundOutcome::Decided(outcome) => outcome,
        other => panic!("expected a decided round, got {other:?}"),
    };
    assert_eq!(outcome.status, ArbitrationStatus::Concluded);
    assert_eq!(outcome.winning_agent.as_deref(), Some("Grok"));
}

// Universal invariant #2 — speaker rotation is a left cyclic shift in
// lockstep with phase advance, over a full cycle.
#[test]
fn speaker_rotation_stays_in_lockstep_with_phase_advance() {
    let mut dsm = DebateStateMachine::new(10);
    let embeddings = StubEmbeddingProvider;

    let expected = [
        (DebatePhase::Critique, Speaker::Arbiter),
        (DebatePhase::Refine, Speaker::Refiner),
        (DebatePhase::Conclude, Speaker::Moderator),
        (DebatePhase::Propose, Speaker::Arbiter),
    ];
    for (i, (phase, speaker)) in expected.into_iter().enumerate() {
        dsm.process_contribution(&format!("{}", (b'a' + i as u8) as char).repeat(8), false, &embeddings);
        assert_eq!(dsm.current_phase(), phase);
        assert_eq!(dsm.current_speaker(), speaker);
    }
}
