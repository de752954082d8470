//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] defines tuning parameters (M, ef_construction, ef_search, seed).
//! [`HnswIndex`] stores the graph using Struct-of-Arrays layout for cache efficiency.

use crate::config;
use crate::error::{Error, Result};
use crate::hnsw::distance::{dot, l2_normalize};
use crate::hnsw::search::knn_search;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Configuration parameters for an HNSW index.
///
/// Controls the trade-off between build speed, search speed, and recall.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Number of bidirectional links per node (except layer 0, which uses `m_max0`).
    pub m: usize,
    /// Maximum links per node at layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Candidate list size during search (higher = better recall, slower).
    pub ef_search: usize,
    /// Maximum number of layers in the graph.
    pub max_layers: usize,
    /// Seed for layer assignment.
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            m_max0: config::HNSW_DEFAULT_M * 2,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
            seed: config::HNSW_DEFAULT_SEED,
        }
    }
}

impl HnswConfig {
    /// Rejects parameters the graph cannot be built with. Layers are stored
    /// as `u8`, which bounds `max_layers`.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("hnsw.m", self.m),
            ("hnsw.m_max0", self.m_max0),
            ("hnsw.ef_construction", self.ef_construction),
            ("hnsw.ef_search", self.ef_search),
            ("hnsw.max_layers", self.max_layers),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(Error::InvalidInput(format!("{name} must be > 0")));
            }
        }
        if self.max_layers > config::HNSW_MAX_LAYERS_LIMIT {
            return Err(Error::InvalidInput(format!(
                "hnsw.max_layers must be <= {}, got {}",
                config::HNSW_MAX_LAYERS_LIMIT,
                self.max_layers
            )));
        }
        Ok(())
    }
}

/// One dense search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseHit {
    pub doc_id: u32,
    /// Cosine similarity between the normalized query and document vectors.
    pub similarity: f32,
}

/// HNSW Index using Struct-of-Arrays (SoA) layout for cache-friendly access.
/// Node `i` is document id `i`; vectors are stored unit-normalized.
#[derive(Debug, Serialize, Deserialize)]
pub struct HnswIndex {
    pub config: HnswConfig,
    // SoA: normalized f32 vector arena, node_count * dimension floats
    pub vectors: Vec<f32>,
    // SoA: graph structure
    pub neighbors: Vec<Vec<Vec<u32>>>, // [node_id][layer][neighbor_ids]
    pub layers: Vec<u8>,
    // Index metadata
    pub entry_point: Option<u32>,
    pub max_layer: usize,
    pub dimension: usize,
    pub node_count: u32,
}

impl HnswIndex {
    /// Creates a new empty HNSW index with the given dimension and configuration.
    pub fn new(dimension: usize, config: HnswConfig) -> Self {
        Self {
            config,
            vectors: Vec::new(),
            neighbors: Vec::new(),
            layers: Vec::new(),
            entry_point: None,
            max_layer: 0,
            dimension,
            node_count: 0,
        }
    }

    /// Builds an index over `embeddings`, where row `i` is document id `i`.
    ///
    /// Every row is L2-normalized before insertion. All rows must share one
    /// dimension. An empty batch yields an empty index that fails every search.
    pub fn build(embeddings: &[Vec<f32>], config: HnswConfig) -> Result<Self> {
        config.validate()?;
        let dimension = embeddings.first().map_or(0, Vec::len);
        let mut index = Self::new(dimension, config);
        let mut rng = StdRng::seed_from_u64(index.config.seed);
        let started = Instant::now();

        for (i, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            let mut normalized = embedding.clone();
            l2_normalize(&mut normalized);
            let level = index.random_level(&mut rng);
            index.insert(i as u32, &normalized, level);
        }

        tracing::info!(
            nodes = index.node_count,
            dimension,
            max_layer = index.max_layer,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Built dense index"
        );
        Ok(index)
    }

    /// Returns the number of nodes in the index.
    pub fn len(&self) -> usize {
        self.node_count as usize
    }

    /// Returns `true` if the index contains no nodes.
    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Top-`k` nodes by cosine similarity to `query`, descending; ties broken by ascending id.
    ///
    /// The query is normalized before search. Fails with [`Error::IndexEmpty`]
    /// on an empty index and [`Error::DimensionMismatch`] on a wrong-width query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<DenseHit>> {
        if self.is_empty() {
            return Err(Error::IndexEmpty);
        }
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let mut normalized = query.to_vec();
        l2_normalize(&mut normalized);
        let hits = knn_search(self, &normalized, k)
            .into_iter()
            .map(|(_, id)| DenseHit {
                doc_id: id,
                // Recompute from the dot product so similarity is exact, not 1 - (1 - s).
                similarity: dot(&normalized, self.vector(id)),
            })
            .collect();
        Ok(hits)
    }

    /// Generate a random layer for a new node using exponential distribution.
    pub fn random_level(&self, rng: &mut StdRng) -> usize {
        let ml = 1.0 / (self.config.m.max(2) as f64).ln();
        // gen::<f64>() is in [0, 1); shift to (0, 1] so ln() stays finite.
        let r: f64 = 1.0 - rng.gen::<f64>();
        let level = (-r.ln() * ml).floor() as usize;
        level.min(self.config.max_layers - 1)
    }

    /// Normalized stored vector of the given node. O(1) slice into contiguous arena.
    #[inline]
    pub fn vector(&self, id: u32) -> &[f32] {
        let start = id as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Checks internal invariants, used after deserializing a persisted index.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let nc = self.node_count as usize;
        if self.vectors.len() != nc * self.dimension {
            return Err(format!(
                "vectors length {} != node_count({}) * dimension({})",
                self.vectors.len(),
                nc,
                self.dimension
            ));
        }
        if self.neighbors.len() != nc || self.layers.len() != nc {
            return Err(format!(
                "graph arrays ({} neighbors, {} layers) != node_count {}",
                self.neighbors.len(),
                self.layers.len(),
                nc
            ));
        }
        match self.entry_point {
            Some(ep) if ep as usize >= nc => {
                return Err(format!("entry_point {ep} out of bounds ({nc} nodes)"));
            }
            None if nc > 0 => return Err("missing entry_point".to_string()),
            _ => {}
        }
        for (node, layers) in self.neighbors.iter().enumerate() {
            for list in layers {
                if let Some(&bad) = list.iter().find(|&&n| n as usize >= nc) {
                    return Err(format!("node {node} links to out-of-bounds node {bad}"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> HnswConfig {
        HnswConfig {
            m: 4,
            m_max0: 8,
            ef_construction: 32,
            ef_search: 16,
            ..HnswConfig::default()
        }
    }

    #[test]
    fn test_three_documents_sorted_by_similarity() {
        let embeddings = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.7, 0.7, 0.0],
        ];
        let index = HnswIndex::build(&embeddings, small_config()).unwrap();
        let hits = index.search(&[1.0, 0.2, 0.0], 3).unwrap();
        let ids: Vec<u32> = hits.iter().map(|h| h.doc_id).collect();
        assert_eq!(ids, vec![0, 2, 1]);
        assert!(hits[0].similarity >= hits[1].similarity);
        assert!(hits[1].similarity >= hits[2].similarity);
    }

    #[test]
    fn test_vectors_are_normalized_on_insert() {
        let index = HnswIndex::build(&[vec![3.0, 4.0]], small_config()).unwrap();
        let v = index.vector(0);
        assert!((dot(v, v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unnormalized_query_gives_cosine() {
        let index = HnswIndex::build(&[vec![1.0, 0.0], vec![0.0, 1.0]], small_config()).unwrap();
        let hits = index.search(&[10.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].doc_id, 0);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_build_rejects_unstorable_layer_count() {
        let config = HnswConfig {
            max_layers: 300,
            ..small_config()
        };
        let err = HnswIndex::build(&[vec![1.0, 0.0]], config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{err}");

        let config = HnswConfig {
            m_max0: 0,
            ..small_config()
        };
        assert!(HnswIndex::build(&[vec![1.0, 0.0]], config).is_err());
    }

    #[test]
    fn test_empty_index_search_fails() {
        let index = HnswIndex::build(&[], small_config()).unwrap();
        assert!(matches!(index.search(&[1.0], 3), Err(Error::IndexEmpty)));
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = HnswIndex::build(&[vec![1.0, 0.0], vec![1.0]], small_config()).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));

        let index = HnswIndex::build(&[vec![1.0, 0.0]], small_config()).unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_build_is_deterministic() {
        let embeddings: Vec<Vec<f32>> = (0..64)
            .map(|i| {
                let t = i as f32 * 0.37;
                vec![t.sin(), t.cos(), (t * 1.3).sin(), (t * 0.7).cos()]
            })
            .collect();
        let a = HnswIndex::build(&embeddings, small_config()).unwrap();
        let b = HnswIndex::build(&embeddings, small_config()).unwrap();
        assert_eq!(a.layers, b.layers);
        assert_eq!(a.neighbors, b.neighbors);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_random_level_bounded() {
        let index = HnswIndex::new(4, small_config());
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(index.random_level(&mut rng) < index.config.max_layers);
        }
    }
}
