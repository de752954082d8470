//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! Indexes unit-normalized document embeddings and answers top-k cosine
//! similarity queries. The graph uses a Struct-of-Arrays (SoA) layout: all
//! vectors live contiguously in one arena, with separate arrays for neighbor
//! lists and layer assignments. The arena doubles as the stored embedding
//! matrix used by the `dense_score` feature.

/// Inner product, cosine distance, and L2 normalization.
pub mod distance;
/// HNSW graph structure, configuration, bulk build, and top-k search entry point.
pub mod graph;
/// HNSW insertion algorithm with bidirectional connections and heuristic pruning.
pub mod insert;
/// HNSW search: single-layer search and multi-layer KNN.
pub mod search;
/// Generation-based visited set for efficient graph traversal.
pub mod visited;

pub use distance::{dot, l2_normalize};
pub use graph::{DenseHit, HnswConfig, HnswIndex};
pub use search::knn_search;
