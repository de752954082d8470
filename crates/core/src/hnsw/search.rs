//! HNSW search algorithms: single-layer search and multi-layer KNN.
//!
//! Distances are cosine distances between unit vectors. Heap entries order by
//! `(distance, id)` so equal-distance nodes resolve the same way every run.

use crate::hnsw::distance::cosine_distance;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

thread_local! {
    /// Thread-local VisitedSet pool for search operations.
    /// Reused across searches on the same thread, including rayon workers.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// `(distance, id)`; max-heap order puts the farthest on top.
type Entry = (OrderedFloat<f32>, u32);

/// Search a single layer of the HNSW graph.
/// Returns up to `ef` closest nodes to the query at the given layer, ascending by distance.
/// `visited` is a reusable VisitedSet (cleared at the start of each call).
pub fn search_layer(
    index: &HnswIndex,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
) -> Vec<(f32, u32)> {
    visited.clear();
    // candidates: min-heap by distance; results: max-heap by distance
    let mut candidates: BinaryHeap<Reverse<Entry>> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<Entry> = BinaryHeap::with_capacity(ef + 1);

    for &ep in entry_points {
        if visited.insert(ep) {
            let dist = OrderedFloat(cosine_distance(query, index.vector(ep)));
            candidates.push(Reverse((dist, ep)));
            results.push((dist, ep));
            if results.len() > ef {
                results.pop();
            }
        }
    }

    while let Some(Reverse(candidate)) = candidates.pop() {
        // If the closest candidate is farther than the worst result, stop
        if results.len() >= ef {
            if let Some(&worst) = results.peek() {
                if candidate > worst {
                    break;
                }
            }
        }

        let node_id = candidate.1 as usize;
        if layer >= index.neighbors[node_id].len() {
            continue;
        }

        for &neighbor_id in &index.neighbors[node_id][layer] {
            if !visited.insert(neighbor_id) {
                continue;
            }

            let entry = (
                OrderedFloat(cosine_distance(query, index.vector(neighbor_id))),
                neighbor_id,
            );
            let should_add = results.len() < ef || results.peek().is_some_and(|&w| entry < w);

            if should_add {
                candidates.push(Reverse(entry));
                results.push(entry);
                if results.len() > ef {
                    results.pop(); // remove worst
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|(d, id)| (d.0, id))
        .collect()
}

/// Multi-layer KNN search through the HNSW graph.
/// Returns up to `k` `(distance, id)` pairs ascending by distance, ties by ascending id.
/// The query must already be normalized.
pub fn knn_search(index: &HnswIndex, query: &[f32], k: usize) -> Vec<(f32, u32)> {
    let Some(entry_point) = index.entry_point else {
        return Vec::new();
    };
    if k == 0 {
        return Vec::new();
    }

    SEARCH_VISITED.with(|cell| {
        let mut visited = cell.borrow_mut();
        visited.ensure_capacity(index.node_count as usize);

        let mut current_ep = entry_point;

        // Traverse from top layer down to layer 1, using ef=1
        for layer in (1..=index.max_layer).rev() {
            let results = search_layer(
                index,
                query,
                std::slice::from_ref(&current_ep),
                1,
                layer,
                &mut *visited,
            );
            if let Some(&(_, nearest)) = results.first() {
                current_ep = nearest;
            }
        }

        // Search layer 0 with ef_search (at least k)
        let ef = index.config.ef_search.max(k);
        let mut results = search_layer(
            index,
            query,
            std::slice::from_ref(&current_ep),
            ef,
            0,
            &mut *visited,
        );
        results.truncate(k);
        results
    })
}
