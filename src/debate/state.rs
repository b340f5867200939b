//! The debate state machine: four cyclic phases rotated across three
//! speakers, with loop and deadlock detection and a kill switch.
//!
//! Grounded on `DebateStateMachine` in the original Grok agent. Unlike a
//! typical workflow state machine, phases here never terminate — a debate
//! keeps cycling `propose → critique → refine → conclude → propose → ...`
//! until the arbitration engine (not this module) decides to stop.

use std::collections::VecDeque;

use crate::embedding::EmbeddingProvider;

/// Threshold above which two consecutive history entries are judged to be
/// a stuck loop rather than progress.
pub const LOOP_SIMILARITY_THRESHOLD: f32 = 0.87;

/// Stagnant turns before a deadlock is declared.
pub const DEADLOCK_TURNS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebatePhase {
    Propose,
    Critique,
    Refine,
    Conclude,
}

const PHASES: [DebatePhase; 4] = [
    DebatePhase::Propose,
    DebatePhase::Critique,
    DebatePhase::Refine,
    DebatePhase::Conclude,
];

impl std::fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Propose => "propose",
            Self::Critique => "critique",
            Self::Refine => "refine",
            Self::Conclude => "conclude",
        };
        write!(f, "{s}")
    }
}

/// The three rotating speaker roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    Moderator,
    Arbiter,
    Refiner,
}

const SPEAKERS: [Speaker; 3] = [Speaker::Moderator, Speaker::Arbiter, Speaker::Refiner];

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Moderator => "moderator",
            Self::Arbiter => "arbiter",
            Self::Refiner => "refiner",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DsmError {
    #[error("unrecognized control state: {0}")]
    UnknownControlState(String),
}

/// Outcome of feeding a new contribution into the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Normal advance to the next phase/speaker.
    Advanced { phase: DebatePhase, speaker: Speaker },
    /// Two consecutive contributions were judged too similar; the phase
    /// was pushed forward (capped at `Conclude`) to force new material.
    LoopDetected,
    /// `turns_since_progress` crossed `DEADLOCK_TURNS`; state was reset to
    /// `Propose` and the counter cleared.
    KillSwitch { summary: String },
}

/// Bounded FIFO of recent contributions, capped at `max_history_size`.
#[derive(Debug, Clone, Default)]
pub struct BoundedHistory {
    entries: VecDeque<String>,
    cap: usize,
}

impl BoundedHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, entry: String) {
        if self.entries.len() >= self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn last_n(&self, n: usize) -> Vec<&String> {
        self.entries.iter().rev().take(n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The debate state machine itself. One instance per active debate, owned
/// by the moderator role.
pub struct DebateStateMachine {
    phase_idx: usize,
    speaker_idx: usize,
    turns_since_progress: u32,
    history: BoundedHistory,
}

impl DebateStateMachine {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            phase_idx: 0,
            speaker_idx: 0,
            turns_since_progress: 0,
            history: BoundedHistory::new(max_history_size),
        }
    }

    pub fn current_phase(&self) -> DebatePhase {
        PHASES[self.phase_idx]
    }

    pub fn current_speaker(&self) -> Speaker {
        SPEAKERS[self.speaker_idx]
    }

    pub fn turns_since_progress(&self) -> u32 {
        self.turns_since_progress
    }

    pub fn history(&self) -> &BoundedHistory {
        &self.history
    }

    /// Feed a new contribution: record it in history, check for a loop,
    /// then (absent a loop) for deadlock, then advance the turn. Mirrors
    /// the check order in `GrokAgent.process_response`.
    pub fn process_contribution(
        &mut self,
        content: &str,
        deadlock_detection_enabled: bool,
        embeddings: &dyn EmbeddingProvider,
    ) -> TurnOutcome {
        self.history.push(content.to_string());

        if self.detect_loop(embeddings) {
            self.handle_loop();
            return TurnOutcome::LoopDetected;
        }

        if deadlock_detection_enabled && self.detect_deadlock() {
            let summary = self.kill_switch();
            return TurnOutcome::KillSwitch { summary };
        }

        self.next_turn();
        TurnOutcome::Advanced {
            phase: self.current_phase(),
            speaker: self.current_speaker(),
        }
    }

    /// Cyclic advance: phase and speaker both rotate every turn. Progress
    /// (wrapping back to `Propose`) resets the stagnation counter; any
    /// other advance increments it.
    fn next_turn(&mut self) {
        self.phase_idx = (self.phase_idx + 1) % PHASES.len();
        self.speaker_idx = (self.speaker_idx + 1) % SPEAKERS.len();
        self.turns_since_progress = if self.phase_idx == 0 {
            0
        } else {
            self.turns_since_progress + 1
        };
    }

    fn detect_loop(&self, embeddings: &dyn EmbeddingProvider) -> bool {
        if self.history.len() < 2 {
            return false;
        }
        let last_two = self.history.last_n(2);
        let vecs = embeddings.embed(&[last_two[0].clone(), last_two[1].clone()]);
        embeddings.cosine(&vecs[0], &vecs[1]) > LOOP_SIMILARITY_THRESHOLD
    }

    /// Push the phase forward (capped, not wrapped) to break out of a loop
    /// without resetting the whole debate.
    fn handle_loop(&mut self) {
        self.phase_idx = (self.phase_idx + 1).min(PHASES.len() - 1);
    }

    fn detect_deadlock(&self) -> bool {
        self.turns_since_progress >= DEADLOCK_TURNS
    }

    /// Reset to `Propose`, clear the stagnation counter, and summarize the
    /// last three history entries for the observer stream.
    fn kill_switch(&mut self) -> String {
        let summary = self
            .history
            .last_n(3)
            .into_iter()
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join(" | ");
        self.phase_idx = 0;
        self.turns_since_progress = 0;
        summary
    }

    /// Moderation signal handling for out-of-band state: `continue`
    /// clears history for the new round, `timeout` resets to `Propose`.
    /// Any other state is a protocol violation — logged and dropped by the
    /// caller, never the DSM's problem to recover from.
    pub fn handle_moderation(&mut self, state: &str) -> Result<(), DsmError> {
        match state {
            "continue" => self.history.clear(),
            "timeout" => {
                self.phase_idx = 0;
                self.history.clear();
            }
            other => return Err(DsmError::UnknownControlState(other.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::StubEmbeddingProvider;

    #[test]
    fn cycles_through_all_four_phases() {
        let mut dsm = DebateStateMachine::new(10);
        let embeddings = StubEmbeddingProvider;
        assert_eq!(dsm.current_phase(), DebatePhase::Propose);

        for (content, expected) in [
            ("aaaaaaaa", DebatePhase::Critique),
            ("bbbbbbbb", DebatePhase::Refine),
            ("cccccccc", DebatePhase::Conclude),
            ("dddddddd", DebatePhase::Propose),
        ] {
            let outcome = dsm.process_contribution(content, false, &embeddings);
            assert!(matches!(outcome, TurnOutcome::Advanced { .. }));
            assert_eq!(dsm.current_phase(), expected);
        }
    }

    #[test]
    fn speaker_rotates_every_turn() {
        let mut dsm = DebateStateMachine::new(10);
        let embeddings = StubEmbeddingProvider;
        assert_eq!(dsm.current_speaker(), Speaker::Moderator);
        dsm.process_contribution("aaaaaaaa", false, &embeddings);
        assert_eq!(dsm.current_speaker(), Speaker::Arbiter);
        dsm.process_contribution("bbbbbbbb", false, &embeddings);
        assert_eq!(dsm.current_speaker(), Speaker::Refiner);
    }

    #[test]
    fn detects_loop_on_repeated_content() {
        let mut dsm = DebateStateMachine::new(10);
        let embeddings = StubEmbeddingProvider;
        dsm.process_contribution("same content twice", false, &embeddings);
        let outcome = dsm.process_contribution("same content twice", false, &embeddings);
        assert_eq!(outcome, TurnOutcome::LoopDetected);
    }

    #[test]
    fn deadlock_triggers_kill_switch_and_resets() {
        let mut dsm = DebateStateMachine::new(10);
        let embeddings = StubEmbeddingProvider;
        // Drive turns_since_progress up with mutually dissimilar content so
        // no loop fires before the deadlock threshold is reached.
        dsm.process_contribution("aaaaaaaa", true, &embeddings); // -> critique, tsp=1
        dsm.process_contribution("bbbbbbbb", true, &embeddings); // -> refine, tsp=2
        dsm.process_contribution("cccccccc", true, &embeddings); // -> conclude, tsp=3
        let outcome = dsm.process_contribution("dddddddd", true, &embeddings); // tsp=3 >= DEADLOCK_TURNS
        match outcome {
            TurnOutcome::KillSwitch { summary } => {
                assert!(summary.contains('d') && summary.contains('b'));
                assert_eq!(dsm.current_phase(), DebatePhase::Propose);
                assert_eq!(dsm.turns_since_progress(), 0);
            }
            other => panic!("expected kill switch, got {other:?}"),
        }
    }

    #[test]
    fn bounded_history_caps_at_configured_size() {
        let mut history = BoundedHistory::new(3);
        for i in 0..5 {
            history.push(format!("entry-{i}"));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.last_n(1), vec![&"entry-4".to_string()]);
    }

    #[test]
    fn continue_signal_clears_history_but_keeps_phase() {
        let mut dsm = DebateStateMachine::new(10);
        let embeddings = StubEmbeddingProvider;
        dsm.process_contribution("some content", false, &embeddings);
        dsm.handle_moderation("continue").unwrap();
        assert!(dsm.history().is_empty());
        assert_eq!(dsm.current_phase(), DebatePhase::Critique);
    }

    #[test]
    fn timeout_signal_resets_phase_and_history() {
        let mut dsm = DebateStateMachine::new(10);
        let embeddings = StubEmbeddingProvider;
        dsm.process_contribution("some content", false, &embeddings);
        dsm.handle_moderation("timeout").unwrap();
        assert!(dsm.history().is_empty());
        assert_eq!(dsm.current_phase(), DebatePhase::Propose);
    }

    #[test]
    fn unrecognized_control_state_is_rejected() {
        let mut dsm = DebateStateMachine::new(10);
        let err = dsm.handle_moderation("reticulate_splines").unwrap_err();
        assert_eq!(err, DsmError::UnknownControlState("reticulate_splines".to_string()));
    }
}
