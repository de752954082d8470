//! Global configuration constants for triviarank.
//!
//! Tuning parameters and defaults are defined here as compile-time constants.
//! [`PipelineConfig`] carries the runtime-adjustable subset; the CLI loads it
//! from an optional JSON file and lets flags override individual fields.

use crate::error::{Error, Result};
use crate::hnsw::HnswConfig;
use crate::ranker::TrainConfig;
use serde::{Deserialize, Serialize};

/// BM25 Okapi term frequency saturation parameter.
///
/// Controls how quickly term frequency saturates.
pub const BM25_K1: f32 = 1.5;

/// BM25 Okapi document length normalization parameter.
///
/// 0.0 = no normalization, 1.0 = full normalization. Standard value is 0.75.
pub const BM25_B: f32 = 0.75;

/// Fraction of the mean vocabulary IDF used in place of a negative IDF.
pub const BM25_EPSILON: f32 = 0.25;

/// Default number of bidirectional links per HNSW node.
pub const HNSW_DEFAULT_M: usize = 32;

/// Default ef parameter during HNSW index construction.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Maximum number of layers in the HNSW graph.
pub const HNSW_DEFAULT_MAX_LAYERS: usize = 16;

/// Seed for HNSW layer assignment. Fixed so rebuilds produce the same graph.
pub const HNSW_DEFAULT_SEED: u64 = 0x7269_7669_6121;

/// Number of dense (HNSW) hits per query.
pub const DENSE_TOP_K: usize = 10;

/// Number of lexical (BM25) hits per query.
pub const LEXICAL_TOP_K: usize = 50;

/// Word budget of the candidate snippet sent to the cross-encoder.
pub const SNIPPET_WORDS: usize = 500;

/// Pairs per cross-encoder call.
pub const SCORER_BATCH_SIZE: usize = 64;

/// Texts per embedding call.
pub const EMBED_BATCH_SIZE: usize = 64;

/// Number of entries kept in each ranked result list.
pub const RESULT_BUDGET: usize = 10;

/// Node levels are stored as `u8`, so at most 256 layers (levels 0..=255).
pub const HNSW_MAX_LAYERS_LIMIT: usize = u8::MAX as usize + 1;

/// Runtime pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dense hits per query (`k`).
    pub dense_k: usize,
    /// Lexical hits per query (`m`).
    pub lexical_k: usize,
    /// Snippet word budget for cross-encoder input.
    pub snippet_words: usize,
    /// Pairs per cross-encoder call.
    pub scorer_batch_size: usize,
    /// Texts per embedding call.
    pub embed_batch_size: usize,
    /// Entries kept per ranked result.
    pub result_budget: usize,
    pub hnsw: HnswConfig,
    pub train: TrainConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dense_k: DENSE_TOP_K,
            lexical_k: LEXICAL_TOP_K,
            snippet_words: SNIPPET_WORDS,
            scorer_batch_size: SCORER_BATCH_SIZE,
            embed_batch_size: EMBED_BATCH_SIZE,
            result_budget: RESULT_BUDGET,
            hnsw: HnswConfig::default(),
            train: TrainConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Rejects zero sizes that would make batching or retrieval meaningless.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("dense_k", self.dense_k),
            ("lexical_k", self.lexical_k),
            ("snippet_words", self.snippet_words),
            ("scorer_batch_size", self.scorer_batch_size),
            ("embed_batch_size", self.embed_batch_size),
            ("result_budget", self.result_budget),
            ("train.max_iterations", self.train.max_iterations),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(Error::InvalidInput(format!("{name} must be > 0")));
            }
        }
        self.hnsw.validate()?;
        if !(self.train.learning_rate > 0.0) {
            return Err(Error::InvalidInput(
                "train.learning_rate must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
