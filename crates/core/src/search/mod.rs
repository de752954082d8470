//! Search primitives: candidate fusion of dense and lexical hit lists.

/// Order-preserving, deduplicating union of dense and lexical hits.
pub mod fusion;

pub use fusion::fuse_candidates;
