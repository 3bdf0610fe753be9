//! HNSW insertion.
//!
//! Inserts a vector with bidirectional links: greedy descent through the
//! upper layers, a beam search per layer from the record's level down to 0,
//! nearest-first neighbor selection under the layer's degree bound, and
//! back-edge pruning for neighbors pushed over capacity.

use std::cell::RefCell;

use crate::error::{Result, VecdbError};
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::search::{search_layer, search_layer_greedy};
use crate::hnsw::visited::VisitedSet;

thread_local! {
    /// Reused visited set for insert operations; eliminates the per-insert
    /// allocation that would otherwise dominate bulk loads.
    static INSERT_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

impl HnswIndex {
    /// Insert a vector under an external identifier.
    ///
    /// Fails with a dimension error if `vector` is not the configured length,
    /// and with a duplicate error if `id` is already present. No state
    /// changes on failure. Tombstoned ids count as present: identifiers are
    /// never reused.
    pub fn add(&mut self, id: i64, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VecdbError::Dimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if self.id_to_pos.contains_key(&id) {
            return Err(VecdbError::DuplicateId(id));
        }

        let level = self.random_level();
        let pos = self.push_record(id, vector, level);

        // First record becomes the entry point.
        let Some(entry) = self.entry_point else {
            self.entry_point = Some(pos);
            self.max_level = level;
            return Ok(());
        };

        let top = level.min(self.max_level);

        // Phases 1 & 2 only read the graph; the new record has no in-edges
        // yet, so searching while it sits in the arena is safe.
        let layer_links = INSERT_VISITED.with(|cell| {
            let mut visited = cell.borrow_mut();
            visited.grow(self.record_count());

            // Phase 1: greedy descent from the top layer to level + 1.
            let mut cur = entry;
            for layer in (level + 1..=self.max_level).rev() {
                cur = search_layer_greedy(self, vector, cur, layer);
            }

            // Phase 2: beam search each layer and pick the record's links.
            let mut layer_links: Vec<Vec<u32>> = vec![Vec::new(); top + 1];
            for layer in (0..=top).rev() {
                let beam = search_layer(
                    self,
                    vector,
                    cur,
                    self.options.ef_construction,
                    layer,
                    &mut visited,
                );
                layer_links[layer] = select_neighbors(&beam, self.options.max_degree(layer));
                if let Some(&(_, nearest)) = beam.first() {
                    cur = nearest;
                }
            }
            layer_links
        });

        for (layer, links) in layer_links.into_iter().enumerate() {
            self.neighbors[pos as usize][layer] = links;
        }

        // Phase 3: back-edges, pruning any neighbor pushed over its bound.
        for layer in 0..=top {
            let m_max = self.options.max_degree(layer);
            let linked: Vec<u32> = self.neighbors[pos as usize][layer].clone();
            for &nb in &linked {
                let nb_idx = nb as usize;
                self.neighbors[nb_idx][layer].push(pos);
                if self.neighbors[nb_idx][layer].len() > m_max {
                    let mut ranked: Vec<(f32, u32)> = {
                        let base = self.vector(nb);
                        self.neighbors[nb_idx][layer]
                            .iter()
                            .map(|&c| (self.metric.distance(base, self.vector(c)), c))
                            .collect()
                    };
                    ranked.sort_unstable_by(|a, b| {
                        a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)
                    });
                    ranked.truncate(m_max);
                    self.neighbors[nb_idx][layer] = ranked.into_iter().map(|(_, c)| c).collect();
                }
            }
        }

        // Promote the entry point last so the descent above used the old one.
        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(pos);
        }
        Ok(())
    }
}

/// Nearest-first truncation of a distance-sorted beam result.
fn select_neighbors(candidates: &[(f32, u32)], m: usize) -> Vec<u32> {
    candidates.iter().take(m).map(|&(_, pos)| pos).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
            .collect()
    }

    #[test]
    fn test_first_insert_sets_entry_point() {
        let mut index = HnswIndex::with_defaults(3, "l2").unwrap();
        index.add(42, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(index.entry_point, Some(0));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_add_dimension_mismatch_leaves_no_state() {
        let mut index = HnswIndex::with_defaults(3, "l2").unwrap();
        let err = index.add(1, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            VecdbError::Dimension {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(index.len(), 0);
        assert!(index.entry_point.is_none());
        assert!(!index.contains(1));
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let mut index = HnswIndex::with_defaults(2, "l2").unwrap();
        index.add(1, &[0.0, 0.0]).unwrap();
        let err = index.add(1, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, VecdbError::DuplicateId(1)));
        assert_eq!(index.len(), 1);
        // The original vector is untouched.
        assert_eq!(index.get(1), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn test_add_tombstoned_id_rejected() {
        let mut index = HnswIndex::with_defaults(2, "l2").unwrap();
        index.add(1, &[0.0, 0.0]).unwrap();
        assert!(index.remove(1));
        let err = index.add(1, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, VecdbError::DuplicateId(1)));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_bidirectional_link_on_second_insert() {
        let mut index = HnswIndex::with_defaults(2, "l2").unwrap();
        index.add(1, &[0.0, 0.0]).unwrap();
        index.add(2, &[1.0, 0.0]).unwrap();
        assert!(index.neighbors[1][0].contains(&0));
        assert!(index.neighbors[0][0].contains(&1));
    }

    #[test]
    fn test_degree_bounds_hold() {
        let mut index = HnswIndex::with_defaults(8, "l2").unwrap();
        for (i, v) in random_vectors(300, 8, 11).iter().enumerate() {
            index.add(i as i64, v).unwrap();
        }
        for pos in 0..index.record_count() {
            for (layer, links) in index.neighbors[pos].iter().enumerate() {
                let bound = index.options.max_degree(layer);
                assert!(
                    links.len() <= bound,
                    "position {pos} layer {layer}: {} links > bound {bound}",
                    links.len()
                );
            }
        }
    }

    #[test]
    fn test_no_self_loops_or_duplicate_links() {
        let mut index = HnswIndex::with_defaults(8, "l2").unwrap();
        for (i, v) in random_vectors(200, 8, 5).iter().enumerate() {
            index.add(i as i64, v).unwrap();
        }
        for pos in 0..index.record_count() {
            for links in &index.neighbors[pos] {
                assert!(!links.contains(&(pos as u32)), "self-loop at {pos}");
                let mut seen = links.clone();
                seen.sort_unstable();
                seen.dedup();
                assert_eq!(seen.len(), links.len(), "duplicate link at {pos}");
            }
        }
    }

    #[test]
    fn test_links_stay_within_record_levels() {
        // A record only carries adjacency for layers up to its own level.
        let mut index = HnswIndex::with_defaults(8, "l2").unwrap();
        for (i, v) in random_vectors(200, 8, 3).iter().enumerate() {
            index.add(i as i64, v).unwrap();
        }
        for pos in 0..index.record_count() {
            assert_eq!(
                index.neighbors[pos].len(),
                index.levels[pos] as usize + 1
            );
            for links in &index.neighbors[pos] {
                for &n in links {
                    assert!((n as usize) < index.record_count());
                }
            }
        }
    }

    #[test]
    fn test_identical_builds_identical_graphs() {
        let vectors = random_vectors(150, 8, 21);
        let mut a = HnswIndex::with_defaults(8, "l2").unwrap();
        let mut b = HnswIndex::with_defaults(8, "l2").unwrap();
        for (i, v) in vectors.iter().enumerate() {
            a.add(i as i64, v).unwrap();
            b.add(i as i64, v).unwrap();
        }
        assert_eq!(a.levels, b.levels);
        assert_eq!(a.neighbors, b.neighbors);
        assert_eq!(a.entry_point, b.entry_point);
        assert_eq!(a.max_level, b.max_level);
    }

    #[test]
    fn test_insert_after_remove_links_through_tombstone() {
        // Tombstoned records still serve as navigation landmarks.
        let mut index = HnswIndex::with_defaults(2, "l2").unwrap();
        index.add(1, &[0.0, 0.0]).unwrap();
        index.add(2, &[1.0, 0.0]).unwrap();
        assert!(index.remove(1));
        index.add(3, &[2.0, 0.0]).unwrap();
        let results = index.search(&[2.0, 0.0], 2, 50).unwrap();
        assert_eq!(results[0].0, 3);
        assert!(results.iter().all(|&(id, _)| id != 1));
    }
}
