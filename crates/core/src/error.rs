//! Error types for triviarank.

use thiserror::Error;

/// Result type alias for triviarank operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, training, or running the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// The dense index holds no vectors and cannot be searched.
    #[error("dense index is empty; build it from a non-empty corpus before searching")]
    IndexEmpty,

    /// The external relevance scorer failed or returned a malformed batch.
    #[error("relevance scorer unavailable: {0}")]
    ScoringUnavailable(String),

    /// The external embedding function failed or returned a malformed batch.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A vector or model width did not match what the consumer expects.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A persisted artifact is corrupt or could not be encoded.
    #[error("artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
