//! HNSW insertion algorithm.
//!
//! Inserts a normalized vector into the HNSW graph with bidirectional
//! connections and heuristic neighbor pruning (Algorithm 4 from the HNSW paper).

use crate::hnsw::distance::cosine_distance;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::search::search_layer;
use crate::hnsw::visited::VisitedSet;

impl HnswIndex {
    /// Insert a normalized vector at the given layer.
    /// `internal_id` must equal `node_count` before this call.
    pub fn insert(&mut self, internal_id: u32, vector: &[f32], level: usize) {
        debug_assert_eq!(internal_id, self.node_count);

        // First node: push SoA fields and return
        let Some(entry_point) = self.entry_point else {
            self.vectors.extend_from_slice(vector);
            self.neighbors.push(vec![Vec::new(); level + 1]);
            self.layers.push(level as u8);
            self.node_count += 1;
            self.entry_point = Some(internal_id);
            self.max_layer = level;
            return;
        };

        let mut current_ep = entry_point;

        // Allocate VisitedSet once, reuse across all search_layer calls
        let mut visited = VisitedSet::new(self.node_count as usize);

        // Phase 1: Greedily traverse from top layer down to node's level + 1
        for layer in (level + 1..=self.max_layer).rev() {
            let results = search_layer(
                self,
                vector,
                std::slice::from_ref(&current_ep),
                1,
                layer,
                &mut visited,
            );
            if let Some(&(_, nearest)) = results.first() {
                current_ep = nearest;
            }
        }

        // Phase 2: Search each layer and collect neighbors for the new node.
        let top = level.min(self.max_layer);
        let mut node_neighbors: Vec<Vec<u32>> = vec![Vec::new(); level + 1];

        let mut layer_eps: Vec<u32> = vec![current_ep];
        for layer in (0..=top).rev() {
            let candidates = search_layer(
                self,
                vector,
                &layer_eps,
                self.config.ef_construction,
                layer,
                &mut visited,
            );

            let m_max = self.max_links(layer);
            let selected = select_neighbors_heuristic(self, &candidates, m_max);
            node_neighbors[layer] = selected.iter().map(|&(_, id)| id).collect();

            // Update entry points for next (lower) layer
            layer_eps.clear();
            layer_eps.extend(candidates.iter().map(|&(_, id)| id));
            if layer_eps.is_empty() {
                layer_eps.push(entry_point);
            }
        }

        // Push the new node's SoA fields
        self.vectors.extend_from_slice(vector);
        self.neighbors.push(node_neighbors);
        self.layers.push(level as u8);
        self.node_count += 1;

        // Phase 3: Add bidirectional connections and prune over-capacity neighbors
        for layer in 0..=top {
            let m_max = self.max_links(layer);
            let my_neighbors: Vec<u32> = self.neighbors[internal_id as usize][layer].clone();
            for &neighbor_id in &my_neighbors {
                let nid = neighbor_id as usize;

                // Ensure neighbor has enough layer vecs
                while self.neighbors[nid].len() <= layer {
                    self.neighbors[nid].push(Vec::new());
                }
                self.neighbors[nid][layer].push(internal_id);

                if self.neighbors[nid][layer].len() > m_max {
                    let base = self.vector(neighbor_id);
                    let candidates: Vec<(f32, u32)> = self.neighbors[nid][layer]
                        .iter()
                        .map(|&cid| (cosine_distance(base, self.vector(cid)), cid))
                        .collect();
                    let pruned = select_neighbors_heuristic(self, &candidates, m_max);
                    self.neighbors[nid][layer] = pruned.iter().map(|&(_, id)| id).collect();
                }
            }
        }

        // Update entry point if new node has higher layer
        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(internal_id);
        }
    }

    fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m_max0
        } else {
            self.config.m
        }
    }
}

/// Heuristic neighbor selection (Algorithm 4 from the HNSW paper).
/// A candidate is selected only if it is closer to the base node than to any
/// already-selected neighbor; remaining slots are filled with the closest
/// unused candidates. Candidates are ordered by (distance, id) for determinism.
fn select_neighbors_heuristic(
    index: &HnswIndex,
    candidates: &[(f32, u32)],
    m: usize,
) -> Vec<(f32, u32)> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);

    for &(dist_to_base, cid) in &sorted {
        if selected.len() >= m {
            break;
        }
        let cvec = index.vector(cid);
        let is_diverse = selected
            .iter()
            .all(|&(_, sid)| dist_to_base <= cosine_distance(cvec, index.vector(sid)));
        if is_diverse {
            selected.push((dist_to_base, cid));
        }
    }

    if selected.len() < m {
        let selected_ids: std::collections::HashSet<u32> =
            selected.iter().map(|&(_, id)| id).collect();
        for &(dist, cid) in &sorted {
            if selected.len() >= m {
                break;
            }
            if !selected_ids.contains(&cid) {
                selected.push((dist, cid));
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::graph::HnswConfig;
    use crate::hnsw::l2_normalize;

    fn unit(v: &[f32]) -> Vec<f32> {
        let mut v = v.to_vec();
        l2_normalize(&mut v);
        v
    }

    #[test]
    fn test_first_insert_sets_entry_point() {
        let mut index = HnswIndex::new(2, HnswConfig::default());
        index.insert(0, &unit(&[1.0, 0.0]), 2);
        assert_eq!(index.entry_point, Some(0));
        assert_eq!(index.max_layer, 2);
        assert_eq!(index.neighbors[0].len(), 3);
    }

    #[test]
    fn test_links_are_bidirectional_and_capped() {
        let config = HnswConfig {
            m: 2,
            m_max0: 3,
            ef_construction: 16,
            ..HnswConfig::default()
        };
        let mut index = HnswIndex::new(2, config);
        for i in 0..12u32 {
            let t = i as f32 * 0.5;
            index.insert(i, &unit(&[t.cos(), t.sin()]), 0);
        }
        for (node, layers) in index.neighbors.iter().enumerate() {
            assert!(layers[0].len() <= 3, "node {node} over capacity");
            assert!(!layers[0].contains(&(node as u32)), "self link on {node}");
        }
        assert!(!index.neighbors[11][0].is_empty());
    }

    #[test]
    fn test_higher_level_node_becomes_entry_point() {
        let mut index = HnswIndex::new(2, HnswConfig::default());
        index.insert(0, &unit(&[1.0, 0.0]), 0);
        index.insert(1, &unit(&[0.0, 1.0]), 3);
        assert_eq!(index.entry_point, Some(1));
        assert_eq!(index.max_layer, 3);
        assert_eq!(index.layers[1], 3);
    }
}
