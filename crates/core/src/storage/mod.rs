//! Storage layer: versioned, checksummed artifacts on disk.
//!
//! Indices and ranker weights are one-shot builds that are expensive to
//! redo. Each is saved under an [`ArtifactKind`] together with a schema version
//! and a content key; a load only succeeds when both match, so a changed corpus
//! or feature contract forces a rebuild instead of serving a stale artifact.

/// Artifact store: atomic bincode snapshots with CRC32 footers.
pub mod artifacts;

pub use artifacts::{ArtifactHeader, ArtifactKind, ArtifactStore};
