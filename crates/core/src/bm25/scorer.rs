//! BM25 Okapi scoring engine.
//!
//! Scores every document against a tokenized query using the BM25 formula with
//! `k1` and `b` from [`crate::config`]. Terms present in more than half of the
//! corpus would get a negative IDF; they score with the index's epsilon floor
//! instead. Candidate features need the score of
//! arbitrary documents (including dense-only hits), so scoring returns a dense
//! per-document vector and [`top_k`] selects hits from it.

use crate::bm25::inverted_index::InvertedIndex;
use crate::config;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// BM25 Okapi score of every document for the given query tokens.
/// Index `i` of the result is the score of document id `i`. Repeated query
/// tokens contribute once per occurrence.
pub fn score_all<'a, I>(index: &InvertedIndex, query_tokens: I) -> Vec<f32>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scores = vec![0.0f32; index.num_documents()];
    if index.doc_count == 0 {
        return scores;
    }

    let avgdl = index.average_doc_length();
    let k1 = config::BM25_K1;
    let b = config::BM25_B;

    for token in query_tokens {
        if let Some(postings) = index.index.get(token) {
            let idf = index.idf(postings.len());

            for posting in postings {
                let dl = index.doc_lengths[posting.doc_id as usize] as f32;
                let tf = posting.term_frequency as f32;
                let norm = if avgdl > 0.0 { dl / avgdl } else { 0.0 };

                // BM25 score for this term-document pair
                let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * norm));
                scores[posting.doc_id as usize] += idf * tf_norm;
            }
        }
    }
    scores
}

/// The `k` highest-scoring document ids, descending by score, ties broken by ascending id.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(u32, f32)> {
    if k == 0 {
        return Vec::new();
    }
    // Min-heap of size k; heap order puts the weakest (lowest score, highest id) on top.
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<u32>)>> =
        BinaryHeap::with_capacity(k + 1);
    for (id, &score) in scores.iter().enumerate() {
        heap.push(Reverse((OrderedFloat(score), Reverse(id as u32))));
        if heap.len() > k {
            heap.pop();
        }
    }
    let mut results: Vec<(u32, f32)> = heap
        .into_iter()
        .map(|Reverse((s, Reverse(id)))| (id, s.0))
        .collect();
    results.sort_unstable_by(|a, b| {
        OrderedFloat(b.1)
            .cmp(&OrderedFloat(a.1))
            .then_with(|| a.0.cmp(&b.0))
    });
    results
}
