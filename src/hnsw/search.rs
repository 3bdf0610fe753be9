//! HNSW search: greedy single-best descent, bounded beam expansion, and
//! multi-layer k-NN search.
//!
//! Tombstoned records participate in traversal (their vectors remain valid
//! navigation seeds); filtering them out of results is the caller's job.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::error::{Result, VecdbError};
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::visited::VisitedSet;

/// Greedy single-best descent at one layer.
///
/// Starts at `entry`, repeatedly scans the current best node's neighbor list
/// and moves to any strictly closer neighbor, until a full pass brings no
/// improvement. Returns the final position.
pub(crate) fn search_layer_greedy(
    index: &HnswIndex,
    query: &[f32],
    entry: u32,
    layer: usize,
) -> u32 {
    let mut best = entry;
    let mut best_dist = index.metric.distance(query, index.vector(best));
    let mut improved = true;
    while improved {
        improved = false;
        let pos = best as usize;
        if layer >= index.neighbors[pos].len() {
            break;
        }
        for &n in &index.neighbors[pos][layer] {
            let d = index.metric.distance(query, index.vector(n));
            if d < best_dist {
                best_dist = d;
                best = n;
                improved = true;
            }
        }
    }
    best
}

/// Bounded beam search at one layer.
///
/// Two heaps over `(distance, position)` tuples: the frontier is keyed
/// through [`Reverse`] so the nearest unexpanded position pops first, while
/// the result buffer keeps its farthest entry on top for cheap eviction
/// once it holds `ef` positions. Expansion stops when the nearest remaining
/// frontier entry is farther than the farthest buffered result. `visited`
/// is reset at the start of each call so it can be reused across layers.
///
/// Returns `(distance, position)` pairs sorted ascending by distance.
pub(crate) fn search_layer(
    index: &HnswIndex,
    query: &[f32],
    entry: u32,
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
) -> Vec<(f32, u32)> {
    visited.reset();
    let mut frontier: BinaryHeap<(Reverse<OrderedFloat<f32>>, u32)> =
        BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<(OrderedFloat<f32>, u32)> = BinaryHeap::with_capacity(ef + 1);

    let seed_dist = index.metric.distance(query, index.vector(entry));
    visited.insert(entry);
    frontier.push((Reverse(OrderedFloat(seed_dist)), entry));
    results.push((OrderedFloat(seed_dist), entry));
    // Cached farthest buffered distance, avoids heap peeks in the hot loop.
    let mut worst_dist = seed_dist;

    while let Some((Reverse(OrderedFloat(c_dist)), c_pos)) = frontier.pop() {
        if c_dist > worst_dist {
            break;
        }

        let pos = c_pos as usize;
        if layer >= index.neighbors[pos].len() {
            continue;
        }
        for &n in &index.neighbors[pos][layer] {
            if !visited.insert(n) {
                continue;
            }
            let dist = index.metric.distance(query, index.vector(n));
            if results.len() < ef || dist < worst_dist {
                frontier.push((Reverse(OrderedFloat(dist)), n));
                results.push((OrderedFloat(dist), n));
                if results.len() > ef {
                    results.pop();
                }
                worst_dist = results.peek().map_or(f32::MAX, |&(d, _)| d.0);
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|(d, pos)| (d.0, pos))
        .collect()
}

impl HnswIndex {
    /// k-nearest-neighbor search.
    ///
    /// Descends greedily from the entry point to layer 1, beam-searches
    /// layer 0 with `ef = max(ef_search, k)`, filters tombstoned records,
    /// and returns up to `k` `(id, distance)` pairs sorted ascending by
    /// distance. An empty index yields an empty list.
    pub fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(i64, f32)>> {
        if query.len() != self.dimension {
            return Err(VecdbError::Dimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k < 1 {
            return Err(VecdbError::InvalidArgument("k must be >= 1".into()));
        }
        let entry = match self.entry_point {
            Some(ep) if self.live > 0 => ep,
            _ => return Ok(Vec::new()),
        };

        let mut cur = entry;
        for layer in (1..=self.max_level).rev() {
            cur = search_layer_greedy(self, query, cur, layer);
        }

        let mut visited = VisitedSet::new(self.record_count());
        let beam = search_layer(self, query, cur, ef_search.max(k), 0, &mut visited);

        let mut out = Vec::with_capacity(k);
        for (dist, pos) in beam {
            if self.is_tombstoned(pos) {
                continue;
            }
            out.push((self.ids[pos as usize], dist));
            if out.len() == k {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_index(vectors: &[(i64, [f32; 4])]) -> HnswIndex {
        let mut index = HnswIndex::with_defaults(4, "l2").unwrap();
        for (id, v) in vectors {
            index.add(*id, v).unwrap();
        }
        index
    }

    #[test]
    fn test_search_empty_index() {
        let index = HnswIndex::with_defaults(4, "l2").unwrap();
        let results = index.search(&[0.0, 0.0, 0.0, 0.0], 3, 50).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let index = HnswIndex::with_defaults(4, "l2").unwrap();
        let err = index.search(&[0.0, 0.0], 1, 50).unwrap_err();
        assert!(matches!(
            err,
            VecdbError::Dimension {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_search_rejects_zero_k() {
        let index = build_index(&[(1, [1.0, 0.0, 0.0, 0.0])]);
        let err = index.search(&[1.0, 0.0, 0.0, 0.0], 0, 50).unwrap_err();
        assert!(matches!(err, VecdbError::InvalidArgument(_)));
    }

    #[test]
    fn test_search_exact_match_first() {
        let index = build_index(&[
            (1, [1.0, 0.0, 0.0, 0.0]),
            (2, [0.0, 1.0, 0.0, 0.0]),
            (3, [0.0, 0.0, 1.0, 0.0]),
        ]);
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 1, 50).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 1);
        assert_eq!(results[0].1, 0.0);
    }

    #[test]
    fn test_search_results_ascending() {
        let index = build_index(&[
            (1, [0.0, 0.0, 0.0, 0.0]),
            (2, [1.0, 0.0, 0.0, 0.0]),
            (3, [2.0, 0.0, 0.0, 0.0]),
            (4, [3.0, 0.0, 0.0, 0.0]),
        ]);
        let results = index.search(&[0.0, 0.0, 0.0, 0.0], 4, 50).unwrap();
        assert_eq!(results.len(), 4);
        for pair in results.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn test_search_filters_tombstones() {
        let mut index = build_index(&[
            (1, [1.0, 0.0, 0.0, 0.0]),
            (2, [0.0, 1.0, 0.0, 0.0]),
            (3, [0.0, 0.0, 1.0, 0.0]),
        ]);
        assert!(index.remove(1));
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 3, 50).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|&(id, _)| id != 1));
    }

    #[test]
    fn test_search_fewer_live_than_k() {
        let mut index = build_index(&[(7, [0.0; 4])]);
        assert!(index.remove(7));
        assert_eq!(index.len(), 0);
        let results = index.search(&[0.0; 4], 1, 50).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_beam_wider_than_graph() {
        // ef far larger than the record count returns everything.
        let index = build_index(&[
            (1, [0.0, 0.0, 0.0, 0.0]),
            (2, [1.0, 0.0, 0.0, 0.0]),
        ]);
        let results = index.search(&[0.5, 0.0, 0.0, 0.0], 10, 500).unwrap();
        assert_eq!(results.len(), 2);
    }
}
