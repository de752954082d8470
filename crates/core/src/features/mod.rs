//! Per-candidate feature vectors.
//!
//! [`FeatureVector`] is the contract between the extractor and the ranker:
//! exactly [`FEATURE_DIM`] fields in the fixed order of [`FEATURE_NAMES`].
//! Changing the width or order invalidates every persisted ranker, which is
//! why both are folded into the ranker's artifact key.
//!
//! Extraction is two-phase. [`PartialFeatures`] carries every structural
//! feature plus an empty cross-encoder slot; the slot is filled after one
//! batched relevance-scorer pass over all candidates.

/// Structural feature computation and snippet selection.
pub mod extractor;

pub use extractor::{FeatureExtractor, QueryContext};

use serde::{Deserialize, Serialize};

/// Width of the feature vector.
pub const FEATURE_DIM: usize = 8;

/// Field names in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "lexical_score",
    "dense_score",
    "cross_encoder_score",
    "category_match",
    "title_overlap",
    "header_overlap",
    "answer_overlap",
    "category_rank_reciprocal",
];

/// Features of one (query, candidate) pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    /// BM25 score of the candidate body for the clue tokens.
    pub lexical_score: f32,
    /// Cosine similarity of query and candidate embeddings.
    pub dense_score: f32,
    /// External cross-encoder relevance of (full query, snippet).
    pub cross_encoder_score: f32,
    /// 1.0 if the query category is in the candidate's category list.
    pub category_match: f32,
    /// Clue tokens present in the title token set.
    pub title_overlap: f32,
    /// Clue tokens present in each header token set, summed over headers.
    pub header_overlap: f32,
    /// Expected-answer tokens present in the title token set.
    ///
    /// Requires a ground-truth answer. At inference time with no known answer
    /// the extractor writes the placeholder 0.0, so a ranker trained with this
    /// feature sees a shifted distribution when used without answers.
    pub answer_overlap: f32,
    /// `1 / (1 + position)` of the query category in the category list, else 0.0.
    pub category_rank_reciprocal: f32,
}

impl FeatureVector {
    /// Fields in [`FEATURE_NAMES`] order.
    pub fn as_array(&self) -> [f32; FEATURE_DIM] {
        [
            self.lexical_score,
            self.dense_score,
            self.cross_encoder_score,
            self.category_match,
            self.title_overlap,
            self.header_overlap,
            self.answer_overlap,
            self.category_rank_reciprocal,
        ]
    }

    pub fn from_array(values: [f32; FEATURE_DIM]) -> Self {
        Self {
            lexical_score: values[0],
            dense_score: values[1],
            cross_encoder_score: values[2],
            category_match: values[3],
            title_overlap: values[4],
            header_overlap: values[5],
            answer_overlap: values[6],
            category_rank_reciprocal: values[7],
        }
    }
}

/// Phase-one features: everything except the cross-encoder score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialFeatures {
    structural: FeatureVector,
    cross_encoder_score: Option<f32>,
}

impl PartialFeatures {
    pub(crate) fn new(structural: FeatureVector) -> Self {
        Self {
            structural,
            cross_encoder_score: None,
        }
    }

    /// Fills the cross-encoder slot in place.
    pub fn fill(&mut self, cross_encoder_score: f32) {
        self.cross_encoder_score = Some(cross_encoder_score);
    }

    /// The finished vector, or `None` while the cross-encoder slot is empty.
    pub fn finish(self) -> Option<FeatureVector> {
        self.cross_encoder_score.map(|cross_encoder_score| FeatureVector {
            cross_encoder_score,
            ..self.structural
        })
    }

    /// Structural fields; `cross_encoder_score` reads 0.0 until filled.
    pub fn structural(&self) -> &FeatureVector {
        &self.structural
    }
}
