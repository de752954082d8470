//! Token-overlap relevance scorer.
//!
//! A deterministic, dependency-free stand-in for a neural cross-encoder, used
//! when no model server is configured. Scores the fraction of distinct query
//! tokens found in the passage, with punctuation stripped from token edges.

use crate::error::Result;
use crate::scoring::RelevanceScorer;
use std::collections::HashSet;

#[derive(Debug, Default, Clone, Copy)]
pub struct TokenOverlapScorer;

impl TokenOverlapScorer {
    pub fn new() -> Self {
        Self
    }

    fn terms(text: &str) -> HashSet<String> {
        text.split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Fraction of distinct query terms present in the passage, in \[0, 1\].
    pub fn score(&self, query: &str, passage: &str) -> f32 {
        let query_terms = Self::terms(query);
        if query_terms.is_empty() {
            return 0.0;
        }
        let passage_terms = Self::terms(passage);
        let hits = query_terms
            .iter()
            .filter(|t| passage_terms.contains(*t))
            .count();
        hits as f32 / query_terms.len() as f32
    }
}

impl RelevanceScorer for TokenOverlapScorer {
    fn score_pairs(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        Ok(pairs.iter().map(|(q, p)| self.score(q, p)).collect())
    }

    fn name(&self) -> &str {
        "token-overlap"
    }
}
