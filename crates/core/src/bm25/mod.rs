//! BM25 lexical search engine.
//!
//! Implements Okapi BM25 scoring with an inverted index over document bodies.
//! Text is lowercased and split on whitespace; no stop words or stemming, so
//! lexical scores and overlap features see exactly the same tokens.

/// Inverted index data structure with postings lists.
pub mod inverted_index;
/// BM25 Okapi scoring over every document and deterministic top-k selection.
pub mod scorer;
/// Lowercasing whitespace tokenizer.
pub mod tokenizer;

pub use inverted_index::InvertedIndex;
pub use scorer::{score_all, top_k};
pub use tokenizer::{tokenize, Tokens};
