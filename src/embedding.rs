//! Embedding capability interface. The concrete backend (sentence
//! transformers in the original) is an external collaborator; the debate
//! state machine and arbitration engine only ever hold a reference to this
//! trait, so tests can supply a deterministic stub instead of a real model.

pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts into fixed-size vectors.
    fn embed(&self, batch: &[String]) -> Vec<Vec<f32>>;

    /// Cosine similarity between two vectors, in `[-1.0, 1.0]`.
    fn cosine(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine(a, b)
    }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Falls back to Jaccard similarity over whitespace-split tokens, matching
/// `ClaudeAgent._text_similarity` — used wherever no embedding backend is
/// configured.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    use std::collections::HashSet;
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f32 / union as f32
}

/// Deterministic stub for tests: embeds a string as the character-count
/// histogram of its bytes modulo a small alphabet, giving stable, cheap
/// vectors whose cosine similarity tracks textual overlap closely enough
/// to exercise the consensus/loop-detection thresholds in tests.
#[derive(Debug, Default)]
pub struct StubEmbeddingProvider;

impl EmbeddingProvider for StubEmbeddingProvider {
    fn embed(&self, batch: &[String]) -> Vec<Vec<f32>> {
        batch.iter().map(|text| histogram(text)).collect()
    }
}

fn histogram(text: &str) -> Vec<f32> {
    let mut buckets = vec![0f32; 26];
    for b in text.to_lowercase().bytes() {
        if b.is_ascii_lowercase() {
            buckets[(b - b'a') as usize] += 1.0;
        }
    }
    buckets
}
