//! Candidate fusion.
//!
//! Merges the dense and lexical hit lists of one query into a single candidate
//! set. Dense hits come first, then lexical hits; each document appears once at
//! its first-seen position. Unlike score fusion (RRF, linear), no re-scoring
//! happens here: ordering is carried through to the ranker as the stable
//! tie-break.

use std::collections::HashSet;

/// Deduplicated union of `dense` then `lexical`, first-seen order, capped at
/// `dense.len() + lexical.len()` entries.
pub fn fuse_candidates(dense: &[u32], lexical: &[u32]) -> Vec<u32> {
    let cap = dense.len() + lexical.len();
    let mut seen: HashSet<u32> = HashSet::with_capacity(cap);
    let mut fused = Vec::with_capacity(cap);

    for &id in dense.iter().chain(lexical) {
        if fused.len() >= cap {
            break;
        }
        if seen.insert(id) {
            fused.push(id);
        }
    }
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_lists_concatenate() {
        let fused = fuse_candidates(&[3, 1], &[7, 5, 9]);
        assert_eq!(fused, vec![3, 1, 7, 5, 9]);
    }

    #[test]
    fn test_overlap_keeps_first_seen_position() {
        let fused = fuse_candidates(&[4, 2, 8], &[2, 6, 4, 1]);
        assert_eq!(fused, vec![4, 2, 8, 6, 1]);
    }

    #[test]
    fn test_duplicates_within_one_list() {
        let fused = fuse_candidates(&[1, 1, 2], &[2, 3, 3]);
        assert_eq!(fused, vec![1, 2, 3]);
    }

    #[test]
    fn test_no_duplicates_and_dense_first_property() {
        for seed in 0u32..50 {
            let dense: Vec<u32> = (0..10).map(|i| (i * 7 + seed) % 23).collect();
            let lexical: Vec<u32> = (0..50).map(|i| (i * 5 + seed * 3) % 31).collect();
            let fused = fuse_candidates(&dense, &lexical);

            let unique: HashSet<u32> = fused.iter().copied().collect();
            assert_eq!(unique.len(), fused.len(), "duplicate in fused list");
            assert!(fused.len() <= dense.len() + lexical.len());

            // every dense hit precedes every lexical-only hit
            let dense_set: HashSet<u32> = dense.iter().copied().collect();
            let first_lexical_only = fused.iter().position(|id| !dense_set.contains(id));
            if let Some(pos) = first_lexical_only {
                assert!(fused[pos..].iter().all(|id| !dense_set.contains(id)));
            }
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(fuse_candidates(&[], &[]).is_empty());
        assert_eq!(fuse_candidates(&[], &[2, 1]), vec![2, 1]);
        assert_eq!(fuse_candidates(&[5], &[]), vec![5]);
    }

    #[test]
    fn test_deterministic() {
        let a = fuse_candidates(&[9, 3, 5], &[5, 1, 9, 2]);
        let b = fuse_candidates(&[9, 3, 5], &[5, 1, 9, 2]);
        assert_eq!(a, b);
    }
}
