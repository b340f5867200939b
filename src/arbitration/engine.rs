//! The arbitration engine: per-debate, per-round response aggregation and
//! the round/final arbitration decision procedure.
//!
//! Grounded on `ClaudeAgent._perform_arbitration` /
//! `_perform_final_arbitration` / `_check_consensus` /
//! `_check_strong_confidence`.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use crate::bus::{is_declared_role, ArbitrationOutcome, ArbitrationStatus, DissentingView, Response};
use crate::config::Config;
use crate::embedding::{jaccard_similarity, EmbeddingProvider};

/// Responses require at least this many contributions before a round can
/// be arbitrated — one per speaker role.
const RESPONSES_PER_ROUND: usize = 3;

/// Fraction of pairwise comparisons that must be similar for consensus.
const CONSENSUS_PAIR_FRACTION: f64 = 0.8;

#[derive(Debug, thiserror::Error)]
pub enum ArbitrationError {
    #[error("response tagged with unrecognized agent role: {0}")]
    UnknownAgentRole(String),
}

pub type ArbitrationResult<T> = Result<T, ArbitrationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebateStatus {
    Active,
    Completed,
}

/// What a round of arbitration produces: either a terminal decision or a
/// request to run another round. Unlike `ArbitrationOutcome`, "continue"
/// carries no confidence/content — it's a control signal, not a verdict.
#[derive(Debug, Clone)]
pub enum RoundOutcome {
    Decided(ArbitrationOutcome),
    Continue {
        debate_id: String,
        round: u32,
        next_round: u32,
    },
}

#[derive(Debug, Default)]
struct DebateRecord {
    rounds: HashMap<u32, Vec<Response>>,
    status: Option<DebateStatus>,
    started_at: Option<Instant>,
}

/// Owns the per-debate response tables and produces arbitration outcomes.
/// One instance lives inside the arbiter role's runtime.
pub struct ArbitrationEngine {
    debates: Mutex<HashMap<String, DebateRecord>>,
    confidence_threshold: f64,
    consensus_threshold: f64,
    min_debate_rounds: u32,
    max_debate_rounds: u32,
    debate_timeout: std::time::Duration,
    max_history_size: usize,
}

impl ArbitrationEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            debates: Mutex::new(HashMap::new()),
            confidence_threshold: config.confidence_threshold,
            consensus_threshold: config.consensus_threshold,
            min_debate_rounds: config.min_debate_rounds,
            max_debate_rounds: config.max_debate_rounds,
            debate_timeout: config.debate_timeout,
            max_history_size: config.max_history_size,
        }
    }

    pub async fn active_debate_count(&self) -> usize {
        self.debates.lock().await.len()
    }

    /// Record a response and, if the round is ready (or the debate has
    /// timed out), produce an arbitration outcome for it. A response
    /// tagged with an agent outside the three declared DSM roles is
    /// malformed and rejected without being aggregated.
    pub async fn record_response(
        &self,
        response: Response,
        embeddings: &dyn EmbeddingProvider,
    ) -> ArbitrationResult<Option<RoundOutcome>> {
        if !is_declared_role(&response.agent) {
            return Err(ArbitrationError::UnknownAgentRole(response.agent));
        }

        let debate_id = response.debate_id.clone();
        let round = response.round;

        let mut debates = self.debates.lock().await;
        let record = debates.entry(debate_id.clone()).or_default();
        if record.started_at.is_none() {
            record.started_at = Some(Instant::now());
            record.status = Some(DebateStatus::Active);
        }
        record.rounds.entry(round).or_default().push(response);
        let responses = record.rounds.get(&round).cloned().unwrap_or_default();
        let started_at = record.started_at.unwrap();
        drop(debates);

        if started_at.elapsed() > self.debate_timeout && !responses.is_empty() {
            info!(debate_id, round, "debate timed out, forcing conclusion");
            let outcome = self.final_arbitration(&debate_id, round, responses).await;
            return Ok(Some(RoundOutcome::Decided(outcome)));
        }

        if responses.len() >= RESPONSES_PER_ROUND {
            let outcome = self
                .arbitrate_round(&debate_id, round, responses, embeddings)
                .await;
            return Ok(Some(outcome));
        }

        Ok(None)
    }

    /// Force a final arbitration on whatever responses exist for the
    /// latest round of `debate_id` — used when a `conclude` moderation
    /// signal arrives.
    pub async fn force_conclude(&self, debate_id: &str) -> Option<ArbitrationOutcome> {
        let debates = self.debates.lock().await;
        let record = debates.get(debate_id)?;
        let latest_round = *record.rounds.keys().max()?;
        let responses = record.rounds.get(&latest_round)?.clone();
        drop(debates);
        Some(self.final_arbitration(debate_id, latest_round, responses).await)
    }

    async fn arbitrate_round(
        &self,
        debate_id: &str,
        round: u32,
        responses: Vec<Response>,
        embeddings: &dyn EmbeddingProvider,
    ) -> RoundOutcome {
        if let Some(winner) = self.check_consensus(&responses, embeddings) {
            return RoundOutcome::Decided(ArbitrationOutcome {
                debate_id: debate_id.to_string(),
                round,
                status: ArbitrationStatus::Consensus,
                content: winner.content,
                confidence: winner.confidence,
                contributing_agents: responses.iter().map(|r| r.agent.clone()).collect(),
                winning_agent: None,
                dissenting_view: None,
                next_round: None,
                timestamp: Utc::now(),
            });
        }

        if round >= self.min_debate_rounds {
            if let Some(winner) = self.check_strong_confidence(&responses) {
                return RoundOutcome::Decided(ArbitrationOutcome {
                    debate_id: debate_id.to_string(),
                    round,
                    status: ArbitrationStatus::StrongConfidence,
                    content: winner.content.clone(),
                    confidence: winner.confidence,
                    contributing_agents: vec![winner.agent.clone()],
                    winning_agent: Some(winner.agent.clone()),
                    dissenting_view: None,
                    next_round: None,
                    timestamp: Utc::now(),
                });
            }
        }

        if round >= self.max_debate_rounds {
            return RoundOutcome::Decided(self.final_arbitration(debate_id, round, responses).await);
        }

        RoundOutcome::Continue {
            debate_id: debate_id.to_string(),
            round,
            next_round: round + 1,
        }
    }

    async fn final_arbitration(
        &self,
        debate_id: &str,
        round: u32,
        responses: Vec<Response>,
    ) -> ArbitrationOutcome {
        let mut sorted = responses.clone();
        sorted.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        let winner = sorted[0].clone();
        let dissenting_view = sorted.get(1).map(|r| DissentingView {
            agent: r.agent.clone(),
            content: r.content.clone(),
            confidence: r.confidence,
        });

        {
            let mut debates = self.debates.lock().await;
            if let Some(record) = debates.get_mut(debate_id) {
                record.status = Some(DebateStatus::Completed);
            }
            self.evict_oldest_completed(&mut debates);
        }

        ArbitrationOutcome {
            debate_id: debate_id.to_string(),
            round,
            status: ArbitrationStatus::Concluded,
            content: winner.content.clone(),
            confidence: winner.confidence,
            contributing_agents: responses.iter().map(|r| r.agent.clone()).collect(),
            winning_agent: Some(winner.agent.clone()),
            dissenting_view,
            next_round: None,
            timestamp: Utc::now(),
        }
    }

    /// Evict the oldest *completed* debate once the tracked set exceeds
    /// `max_history_size`. An active debate is never evicted.
    fn evict_oldest_completed(&self, debates: &mut HashMap<String, DebateRecord>) {
        if debates.len() <= self.max_history_size {
            return;
        }
        let oldest = debates
            .iter()
            .filter(|(_, r)| r.status == Some(DebateStatus::Completed))
            .min_by_key(|(_, r)| r.started_at)
            .map(|(id, _)| id.clone());

        if let Some(id) = oldest {
            debates.remove(&id);
            info!(debate_id = id, "evicted oldest completed debate");
        }
    }

    fn check_consensus(
        &self,
        responses: &[Response],
        embeddings: &dyn EmbeddingProvider,
    ) -> Option<Response> {
        if responses.len() <= 1 {
            return responses.first().cloned();
        }

        let contents: Vec<String> = responses.iter().map(|r| r.content.clone()).collect();
        let vectors = embeddings.embed(&contents);

        let mut similar_pairs = 0usize;
        for i in 0..responses.len() {
            for j in (i + 1)..responses.len() {
                let sim = if vectors[i].iter().any(|v| *v != 0.0) || vectors[j].iter().any(|v| *v != 0.0) {
                    embeddings.cosine(&vectors[i], &vectors[j]) as f64
                } else {
                    jaccard_similarity(&responses[i].content, &responses[j].content) as f64
                };
                if sim > (1.0 - self.consensus_threshold) {
                    similar_pairs += 1;
                }
            }
        }

        let required_pairs = (responses.len() * (responses.len() - 1)) as f64 / 2.0;
        if similar_pairs as f64 / required_pairs > CONSENSUS_PAIR_FRACTION {
            responses
                .iter()
                .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
                .cloned()
        } else {
            None
        }
    }

    fn check_strong_confidence(&self, responses: &[Response]) -> Option<Response> {
        if responses.len() <= 1 {
            return responses.first().cloned();
        }
        let mut sorted = responses.to_vec();
        sorted.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        let diff = sorted[0].confidence - sorted[1].confidence;
        if diff > self.confidence_threshold {
            Some(sorted[0].clone())
        } else {
            None
        }
    }

    /// Locally-scoped threshold adjustments triggered by a moderation
    /// signal. These are scratch values for building the outbound signal
    /// message only — they are never written back into `self`, per the
    /// no-global-mutation rule.
    pub fn deadlock_adjusted_confidence_threshold(&self) -> f64 {
        self.confidence_threshold * 0.6
    }

    pub fn loop_adjusted_consensus_threshold(&self) -> f64 {
        self.consensus_threshold * 2.0
    }
}
