//! # triviarank-core
//!
//! Hybrid retrieval and reranking for short trivia clues: a BM25 lexical
//! index and an HNSW dense index produce a fused candidate set, an 8-wide
//! feature vector is extracted per (query, candidate), and a logistic
//! ranker picks the best-matching document title.
//!
//! Embedding and cross-encoder models are external collaborators reached
//! through the [`embed::Embedder`] and [`scoring::RelevanceScorer`] traits.

/// BM25 lexical search: whitespace tokenizer, inverted index, and Okapi scoring.
pub mod bm25;
/// Global configuration constants and the runtime [`config::PipelineConfig`].
pub mod config;
/// Core data types: `Document`, `DocumentStore`, and `Query`.
pub mod document;
/// Embedding interface, batching, and the local hashing embedder.
pub mod embed;
/// Error type shared across the crate.
pub mod error;
/// Ranking-quality metrics: Precision@1 and Mean Reciprocal Rank.
pub mod eval;
/// Per-candidate feature extraction with a two-phase cross-encoder slot.
pub mod features;
/// HNSW approximate nearest neighbor index over normalized embeddings.
pub mod hnsw;
/// End-to-end pipeline: candidates, features, ranking, evaluation.
pub mod pipeline;
/// Logistic-regression ranker over feature vectors.
pub mod ranker;
/// Cross-encoder relevance scorer interface and batching.
pub mod scoring;
/// Candidate fusion of dense and lexical hit lists.
pub mod search;
/// Versioned, checksummed artifact store for indices and ranker weights.
pub mod storage;

pub use error::{Error, Result};
