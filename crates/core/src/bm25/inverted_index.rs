//! Inverted index for BM25 lexical search.
//!
//! Maps terms to postings lists (document ID + term frequency). Documents are
//! identified by their `u32` store ids, so `doc_lengths` is indexed directly.

use crate::bm25::tokenizer::tokenize;
use crate::document::DocumentStore;
use crate::config;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A single entry in a term's postings list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    /// Document id.
    pub doc_id: u32,
    /// Number of times the term appears in this document.
    pub term_frequency: u32,
}

/// Inverted index mapping terms to postings lists.
///
/// Built once from a [`DocumentStore`]; read-only afterwards. Document lengths
/// are tracked for BM25 length normalization.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    /// term → list of postings, ascending by doc_id
    pub index: HashMap<String, Vec<Posting>>,
    /// doc_id → document length (number of tokens).
    pub doc_lengths: Vec<u32>,
    /// Total number of documents indexed
    pub doc_count: u32,
    /// Sum of all document lengths (for average calculation)
    pub total_doc_length: u64,
    /// IDF substituted for negative term IDFs.
    /// Set by [`InvertedIndex::update_idf_floor`].
    pub idf_floor: f32,
}

impl InvertedIndex {
    /// Creates a new empty inverted index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every document body in the store.
    pub fn build(store: &DocumentStore) -> Self {
        let mut idx = Self::new();
        idx.doc_lengths.reserve(store.len());
        for doc in store.iter() {
            idx.add_document(doc.id, &doc.body);
        }
        idx.update_idf_floor();
        tracing::info!(
            documents = idx.doc_count,
            terms = idx.index.len(),
            avgdl = idx.average_doc_length(),
            idf_floor = idx.idf_floor,
            "Built lexical index"
        );
        idx
    }

    /// Index a document's text under its id. Ids must be added in ascending order.
    /// Call [`InvertedIndex::update_idf_floor`] once the last document is in.
    pub fn add_document(&mut self, doc_id: u32, text: &str) {
        let tokens = tokenize(text);
        let doc_len = tokens.len() as u32;

        // Grow doc_lengths vec if needed
        let idx = doc_id as usize;
        if idx >= self.doc_lengths.len() {
            self.doc_lengths.resize(idx + 1, 0);
        }
        self.doc_lengths[idx] = doc_len;
        self.doc_count += 1;
        self.total_doc_length += doc_len as u64;

        // Count term frequencies for this doc
        let mut tf_map: HashMap<&str, u32> = HashMap::new();
        for token in tokens.iter() {
            *tf_map.entry(token).or_insert(0) += 1;
        }

        for (term, tf) in tf_map {
            self.index
                .entry(term.to_string())
                .or_default()
                .push(Posting {
                    doc_id,
                    term_frequency: tf,
                });
        }
    }

    /// Number of document slots (highest id + 1).
    pub fn num_documents(&self) -> usize {
        self.doc_lengths.len()
    }

    /// Raw Okapi IDF `ln((N - df + 0.5) / (df + 0.5))`. Negative when a term
    /// occurs in more than half of the documents.
    pub fn raw_idf(&self, df: usize) -> f32 {
        let n = self.doc_count as f64;
        let df = df as f64;
        ((n - df + 0.5) / (df + 0.5)).ln() as f32
    }

    /// IDF used for scoring: the raw IDF, or [`InvertedIndex::idf_floor`]
    /// when the raw value is negative.
    pub fn idf(&self, df: usize) -> f32 {
        let idf = self.raw_idf(df);
        if idf < 0.0 {
            self.idf_floor
        } else {
            idf
        }
    }

    /// Recomputes the floor as `BM25_EPSILON` times the mean raw IDF over
    /// the whole vocabulary.
    pub fn update_idf_floor(&mut self) {
        if self.index.is_empty() {
            self.idf_floor = 0.0;
            return;
        }
        // grouped by df so the sum does not depend on map iteration order
        let mut terms_by_df: BTreeMap<usize, u64> = BTreeMap::new();
        for postings in self.index.values() {
            *terms_by_df.entry(postings.len()).or_insert(0) += 1;
        }
        let total: f64 = terms_by_df
            .iter()
            .map(|(&df, &terms)| self.raw_idf(df) as f64 * terms as f64)
            .sum();
        let mean = total / self.index.len() as f64;
        self.idf_floor = (config::BM25_EPSILON as f64 * mean) as f32;
    }

    /// Returns the average document length across all indexed documents.
    pub fn average_doc_length(&self) -> f32 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.total_doc_length as f32 / self.doc_count as f32
    }
}
