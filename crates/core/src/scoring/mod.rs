//! Cross-encoder relevance scoring.
//!
//! The cross-encoder is an external, possibly slow, possibly GPU-backed model.
//! The pipeline only sees the [`RelevanceScorer`] trait and always calls it
//! through [`score_in_batches`], never once per pair.
//!
//! Failures are never papered over: any scorer error or malformed batch
//! becomes [`Error::ScoringUnavailable`] and aborts the run.

mod overlap;

pub use overlap::TokenOverlapScorer;

use crate::error::{Error, Result};
use std::time::Instant;

/// Interface for cross-encoder models.
///
/// Takes (text-a, text-b) pairs and returns one relevance score per pair,
/// in input order. Higher is more relevant; the range is model-specific.
pub trait RelevanceScorer: Send + Sync {
    /// Score one batch of pairs.
    fn score_pairs(&self, pairs: &[(String, String)]) -> Result<Vec<f32>>;

    /// Returns the model name/identifier
    fn name(&self) -> &str;
}

/// Scores `pairs` with one scorer call per `batch_size` chunk.
///
/// The returned scores line up with `pairs`. A failing call or a chunk whose
/// score count differs from its pair count yields [`Error::ScoringUnavailable`].
pub fn score_in_batches(
    scorer: &dyn RelevanceScorer,
    pairs: &[(String, String)],
    batch_size: usize,
) -> Result<Vec<f32>> {
    if batch_size == 0 {
        return Err(Error::InvalidInput("scorer batch size must be > 0".into()));
    }
    let started = Instant::now();
    let mut scores = Vec::with_capacity(pairs.len());

    for (batch_no, chunk) in pairs.chunks(batch_size).enumerate() {
        let batch = scorer.score_pairs(chunk).map_err(|e| match e {
            Error::ScoringUnavailable(msg) => Error::ScoringUnavailable(msg),
            other => Error::ScoringUnavailable(format!(
                "{} failed on batch {batch_no}: {other}",
                scorer.name()
            )),
        })?;
        if batch.len() != chunk.len() {
            return Err(Error::ScoringUnavailable(format!(
                "{} returned {} scores for {} pairs in batch {batch_no}",
                scorer.name(),
                batch.len(),
                chunk.len()
            )));
        }
        scores.extend(batch);
    }

    tracing::debug!(
        scorer = scorer.name(),
        pairs = pairs.len(),
        batch_size,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Scored relevance pairs"
    );
    Ok(scores)
}
