//! Structural feature extraction.
//!
//! All token comparisons use the whitespace tokenizer from [`crate::bm25`],
//! so a clue token is "present" in a title exactly when the lowercased
//! whitespace-split words match.

use crate::bm25::tokenizer::{tokenize, Tokens};
use crate::document::{Document, DocumentStore, Query};
use crate::features::{FeatureVector, PartialFeatures};
use crate::hnsw::{dot, HnswIndex};
use std::collections::HashSet;

/// Per-query inputs shared by every candidate of that query.
#[derive(Debug)]
pub struct QueryContext<'q> {
    pub query: &'q Query,
    clue_tokens: Tokens,
    answer_tokens: Option<Tokens>,
    /// BM25 score of every document for the clue tokens, indexed by doc id.
    pub lexical_scores: Vec<f32>,
    /// Normalized embedding of the full query text.
    pub query_embedding: Vec<f32>,
}

impl<'q> QueryContext<'q> {
    pub fn new(query: &'q Query, lexical_scores: Vec<f32>, query_embedding: Vec<f32>) -> Self {
        Self {
            query,
            clue_tokens: tokenize(&query.clue),
            answer_tokens: query.expected_answer.as_deref().map(tokenize),
            lexical_scores,
            query_embedding,
        }
    }
}

/// Computes phase-one features against the read-only store and dense index.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor<'a> {
    store: &'a DocumentStore,
    dense: &'a HnswIndex,
    snippet_words: usize,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(store: &'a DocumentStore, dense: &'a HnswIndex, snippet_words: usize) -> Self {
        Self {
            store,
            dense,
            snippet_words,
        }
    }

    /// Every feature except `cross_encoder_score`, which stays empty until
    /// the batched relevance pass fills it.
    ///
    /// Unknown doc ids yield all-zero features.
    pub fn structural(&self, ctx: &QueryContext<'_>, doc_id: u32) -> PartialFeatures {
        let Some(doc) = self.store.get(doc_id) else {
            return PartialFeatures::new(FeatureVector::default());
        };

        let lexical_score = ctx
            .lexical_scores
            .get(doc_id as usize)
            .copied()
            .unwrap_or(0.0);
        let dense_score = if (doc_id as usize) < self.dense.len()
            && ctx.query_embedding.len() == self.dense.dimension
        {
            dot(&ctx.query_embedding, self.dense.vector(doc_id))
        } else {
            0.0
        };

        let (category_match, category_rank_reciprocal) =
            category_features(doc, &ctx.query.category);

        let title_tokens = tokenize(&doc.title);
        let title_set = title_tokens.to_set();
        let title_overlap = count_present(&ctx.clue_tokens, &title_set);

        let header_overlap: usize = doc
            .section_headers
            .iter()
            .map(|header| {
                let header_tokens = tokenize(header);
                count_present(&ctx.clue_tokens, &header_tokens.to_set())
            })
            .sum();

        // No ground truth: placeholder 0.0 (see FeatureVector::answer_overlap).
        let answer_overlap = ctx
            .answer_tokens
            .as_ref()
            .map_or(0, |answer| count_present(answer, &title_set));

        PartialFeatures::new(FeatureVector {
            lexical_score,
            dense_score,
            cross_encoder_score: 0.0,
            category_match,
            title_overlap: title_overlap as f32,
            header_overlap: header_overlap as f32,
            answer_overlap: answer_overlap as f32,
            category_rank_reciprocal,
        })
    }

    /// First `snippet_words` whitespace-separated words of the candidate body.
    pub fn snippet(&self, doc_id: u32) -> String {
        self.store
            .get(doc_id)
            .map(|doc| {
                doc.body
                    .split_whitespace()
                    .take(self.snippet_words)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }
}

/// `(category_match, category_rank_reciprocal)`; both zero for an empty category.
fn category_features(doc: &Document, category: &str) -> (f32, f32) {
    if category.is_empty() {
        return (0.0, 0.0);
    }
    match doc.category_position(category) {
        Some(pos) => (1.0, 1.0 / (1.0 + pos as f32)),
        None => (0.0, 0.0),
    }
}

/// Occurrences in `tokens` (duplicates counted) that are members of `set`.
fn count_present(tokens: &Tokens, set: &HashSet<&str>) -> usize {
    tokens.iter().filter(|t| set.contains(t)).count()
}
