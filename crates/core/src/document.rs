//! Core document and query types for triviarank.
//!
//! A [`Document`] is a parsed corpus entry whose title is the answer key.
//! The [`DocumentStore`] owns all documents for the lifetime of a run and
//! hands out stable `u32` ids equal to each document's position.
//! A [`Query`] is one trivia item: category, clue, and (for training and
//! evaluation) the expected answer.

use serde::{Deserialize, Serialize};

/// A parsed document as produced by the ingestion collaborator, before ids are assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedDocument {
    pub title: String,
    pub body: String,
    /// Categories in ingestion order. Order is significant.
    pub categories: Vec<String>,
    pub section_headers: Vec<String>,
}

/// A stored, immutable document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable index into the store.
    pub id: u32,
    /// Answer key. Not required to be unique.
    pub title: String,
    /// Body text, indexed by BM25 and embedded for dense search.
    pub body: String,
    /// Lowercase categories in ingestion order.
    pub categories: Vec<String>,
    /// Lowercase section headers.
    pub section_headers: Vec<String>,
}

impl Document {
    /// Position of `category` in this document's category list, if present.
    pub fn category_position(&self, category: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == category)
    }
}

/// Owns every document of the corpus. Read-only once built.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    /// Builds a store from parsed documents, assigning ids `0..N` in input order.
    /// Categories and section headers are lowercased and trimmed; order is preserved.
    pub fn from_parsed<I>(parsed: I) -> Self
    where
        I: IntoIterator<Item = ParsedDocument>,
    {
        let documents = parsed
            .into_iter()
            .enumerate()
            .map(|(i, p)| Document {
                id: i as u32,
                title: p.title,
                body: p.body,
                categories: p
                    .categories
                    .iter()
                    .map(|c| c.trim().to_lowercase())
                    .collect(),
                section_headers: p
                    .section_headers
                    .iter()
                    .map(|h| h.trim().to_lowercase())
                    .collect(),
            })
            .collect();
        Self { documents }
    }

    /// Returns the document with the given id.
    #[inline]
    pub fn get(&self, id: u32) -> Option<&Document> {
        self.documents.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> + '_ {
        self.documents.iter()
    }

    /// Document bodies in id order, for batch embedding.
    pub fn bodies(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.body.clone()).collect()
    }

    /// Content hash over every field in id order (blake3, hex).
    ///
    /// Keys persisted indices so a changed corpus forces a rebuild.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.documents.len() as u64).to_le_bytes());
        for doc in &self.documents {
            hash_field(&mut hasher, &doc.title);
            hash_field(&mut hasher, &doc.body);
            hasher.update(&(doc.categories.len() as u64).to_le_bytes());
            for c in &doc.categories {
                hash_field(&mut hasher, c);
            }
            hasher.update(&(doc.section_headers.len() as u64).to_le_bytes());
            for h in &doc.section_headers {
                hash_field(&mut hasher, h);
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Length-prefixed so field boundaries cannot collide.
fn hash_field(hasher: &mut blake3::Hasher, field: &str) {
    hasher.update(&(field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

/// One trivia item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Lowercase category string.
    pub category: String,
    pub clue: String,
    /// Expected title. Used only for labels and evaluation, never as a feature
    /// outside `answer_overlap`. `None` at pure inference time.
    #[serde(default)]
    pub expected_answer: Option<String>,
}

impl Query {
    /// Creates a query, lowercasing the category.
    pub fn new(category: &str, clue: &str, expected_answer: Option<&str>) -> Self {
        Self {
            category: category.trim().to_lowercase(),
            clue: clue.to_string(),
            expected_answer: expected_answer.map(str::to_string),
        }
    }

    /// Text sent to the embedder and the cross-encoder: `category + ". " + clue`.
    pub fn full_text(&self) -> String {
        format!("{}. {}", self.category, self.clue)
    }
}
