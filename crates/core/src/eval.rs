//! Ranking-quality metrics.
//!
//! Precision@1 and Mean Reciprocal Rank over truncated ranked title lists.
//! A title matches the expected answer on case-insensitive exact equality.
//! When several documents share a title, any of them counts as correct.

use crate::document::Query;
use crate::pipeline::RankedResult;
use serde::{Deserialize, Serialize};

/// Aggregate metrics over a query set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Fraction of queries whose top-ranked title is the expected answer.
    pub precision_at_1: f64,
    /// Mean of `1 / rank` of the first correct title (0 when absent).
    pub mrr: f64,
    /// Number of queries evaluated.
    pub queries: usize,
}

/// Case-insensitive exact title match.
pub fn titles_match(title: &str, expected: &str) -> bool {
    title.to_lowercase() == expected.to_lowercase()
}

/// `1 / rank` of the first title matching `expected`, or 0.0 if none does.
pub fn reciprocal_rank<S: AsRef<str>>(ranked: &[S], expected: &str) -> f64 {
    ranked
        .iter()
        .position(|t| titles_match(t.as_ref(), expected))
        .map_or(0.0, |idx| 1.0 / (idx + 1) as f64)
}

/// Precision@1 and MRR of `ranked[i]` against `expected[i]`.
///
/// Only the first `min(ranked.len(), expected.len())` queries are scored.
/// An empty input yields all-zero metrics.
pub fn evaluate<S: AsRef<str>, E: AsRef<str>>(ranked: &[Vec<S>], expected: &[E]) -> Metrics {
    let queries = ranked.len().min(expected.len());
    if queries == 0 {
        return Metrics::default();
    }
    let mut hits = 0usize;
    let mut rr_sum = 0.0f64;
    for (list, answer) in ranked.iter().zip(expected) {
        let answer = answer.as_ref();
        if list
            .first()
            .is_some_and(|top| titles_match(top.as_ref(), answer))
        {
            hits += 1;
        }
        rr_sum += reciprocal_rank(list, answer);
    }
    Metrics {
        precision_at_1: hits as f64 / queries as f64,
        mrr: rr_sum / queries as f64,
        queries,
    }
}

/// Evaluates pipeline output against each result's query.
/// Queries without an expected answer are skipped.
pub fn evaluate_results(results: &[RankedResult], queries: &[Query]) -> Metrics {
    let mut lists: Vec<Vec<&str>> = Vec::with_capacity(results.len());
    let mut expected: Vec<&str> = Vec::with_capacity(results.len());
    for result in results {
        let Some(answer) = queries
            .get(result.query_id)
            .and_then(|q| q.expected_answer.as_deref())
        else {
            continue;
        };
        lists.push(result.entries.iter().map(|e| e.title.as_str()).collect());
        expected.push(answer);
    }
    evaluate(&lists, &expected)
}
