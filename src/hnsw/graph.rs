//! HNSW graph structure and configuration.
//!
//! [`HnswOptions`] defines tuning parameters (M, ef_construction).
//! [`HnswIndex`] stores records in a Struct-of-Arrays layout: a contiguous
//! f32 vector arena plus parallel arrays for external ids, levels, tombstone
//! flags, and per-layer adjacency. External i64 identifiers map to dense
//! arena positions; adjacency references positions, never ids.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config;
use crate::error::{Result, VecdbError};
use crate::hnsw::distance::DistanceMetric;

/// Construction parameters for an HNSW index.
///
/// Controls the trade-off between build speed, search speed, recall, and
/// memory usage.
#[derive(Debug, Clone)]
pub struct HnswOptions {
    /// Number of bidirectional links per node (except layer 0, which uses `m_max0`).
    pub m: usize,
    /// Maximum links per node at layer 0 (`2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
}

impl HnswOptions {
    /// Options with the layer-0 bound derived as `2 * m`.
    pub fn new(m: usize, ef_construction: usize) -> Self {
        Self {
            m,
            m_max0: m * 2,
            ef_construction,
        }
    }

    /// Degree bound for a layer: `m_max0` at layer 0, `m` above.
    #[inline]
    pub(crate) fn max_degree(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }
}

impl Default for HnswOptions {
    fn default() -> Self {
        Self::new(config::HNSW_DEFAULT_M, config::HNSW_DEFAULT_EF_CONSTRUCTION)
    }
}

/// In-memory HNSW index over fixed-dimension f32 vectors.
///
/// Single-threaded: callers serialize access externally. Removal is a
/// tombstone; records are never physically erased, and tombstoned records
/// keep serving as navigation landmarks.
#[derive(Debug)]
pub struct HnswIndex {
    pub(crate) options: HnswOptions,
    pub(crate) dimension: usize,
    pub(crate) metric: DistanceMetric,
    // SoA arenas, all indexed by insertion position.
    pub(crate) vectors: Vec<f32>,
    pub(crate) ids: Vec<i64>,
    pub(crate) levels: Vec<u8>,
    pub(crate) tombstones: Vec<bool>,
    pub(crate) neighbors: Vec<Vec<Vec<u32>>>, // [position][layer][neighbor positions]
    pub(crate) id_to_pos: HashMap<i64, u32>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_level: usize,
    pub(crate) live: usize,
    pub(crate) level_rng: StdRng,
}

impl HnswIndex {
    /// Creates a new empty index.
    ///
    /// Fails with an argument error if `dimension < 1` or the metric tag is
    /// not one of `l2`, `cosine`, `dot`.
    pub fn new(dimension: usize, metric: &str, options: HnswOptions) -> Result<Self> {
        if dimension < 1 {
            return Err(VecdbError::InvalidArgument(format!(
                "dimension must be >= 1, got {dimension}"
            )));
        }
        let metric = DistanceMetric::from_tag(metric)?;
        Ok(Self {
            options,
            dimension,
            metric,
            vectors: Vec::new(),
            ids: Vec::new(),
            levels: Vec::new(),
            tombstones: Vec::new(),
            neighbors: Vec::new(),
            id_to_pos: HashMap::new(),
            entry_point: None,
            max_level: 0,
            live: 0,
            level_rng: StdRng::seed_from_u64(config::HNSW_LEVEL_SEED),
        })
    }

    /// Creates a new empty index with default parameters (M=16, ef_c=200).
    pub fn with_defaults(dimension: usize, metric: &str) -> Result<Self> {
        Self::new(dimension, metric, HnswOptions::default())
    }

    /// Number of live (non-tombstoned) records.
    pub fn len(&self) -> usize {
        self.live
    }

    /// `true` if the index holds no live records.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Configured distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// The M parameter (out-degree bound above layer 0).
    pub fn m(&self) -> usize {
        self.options.m
    }

    /// The ef_construction parameter.
    pub fn ef_construction(&self) -> usize {
        self.options.ef_construction
    }

    /// `true` if `id` exists as a live record.
    pub fn contains(&self, id: i64) -> bool {
        self.id_to_pos
            .get(&id)
            .is_some_and(|&pos| !self.tombstones[pos as usize])
    }

    /// The stored vector for a live record, or `None` if the id is absent
    /// or tombstoned.
    pub fn get(&self, id: i64) -> Option<&[f32]> {
        let &pos = self.id_to_pos.get(&id)?;
        if self.tombstones[pos as usize] {
            return None;
        }
        Some(self.vector(pos))
    }

    /// Tombstone a record. Returns `false` if `id` is absent or already
    /// tombstoned. Adjacency is untouched: the record remains a navigation
    /// landmark but disappears from search results.
    pub fn remove(&mut self, id: i64) -> bool {
        match self.id_to_pos.get(&id) {
            Some(&pos) if !self.tombstones[pos as usize] => {
                self.tombstones[pos as usize] = true;
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    /// Total records including tombstoned ones.
    pub(crate) fn record_count(&self) -> usize {
        self.ids.len()
    }

    /// Vector slice for an arena position. O(1) slice into the arena.
    #[inline]
    pub(crate) fn vector(&self, pos: u32) -> &[f32] {
        let start = pos as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    #[inline]
    pub(crate) fn is_tombstoned(&self, pos: u32) -> bool {
        self.tombstones[pos as usize]
    }

    /// Draw a level from the geometric distribution `floor(-ln(u) / ln(M))`,
    /// capped at [`config::HNSW_MAX_LAYERS`]` - 1`. The cap also bounds the
    /// singular draws (u rounding to 0, or M = 1).
    pub(crate) fn random_level(&mut self) -> usize {
        let ml = 1.0 / (self.options.m as f64).ln();
        let u: f64 = self.level_rng.gen();
        let level = (-u.ln() * ml).floor();
        (level as usize).min(config::HNSW_MAX_LAYERS - 1)
    }

    /// Append a record with empty adjacency and return its arena position.
    pub(crate) fn push_record(&mut self, id: i64, vector: &[f32], level: usize) -> u32 {
        let pos = self.ids.len() as u32;
        self.vectors.extend_from_slice(vector);
        self.ids.push(id);
        self.levels.push(level as u8);
        self.tombstones.push(false);
        self.neighbors.push(vec![Vec::new(); level + 1]);
        self.id_to_pos.insert(id, pos);
        self.live += 1;
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_index(dim: usize) -> HnswIndex {
        HnswIndex::with_defaults(dim, "l2").unwrap()
    }

    #[test]
    fn test_new_empty_index() {
        let index = make_index(128);
        assert_eq!(index.dimension(), 128);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
        assert!(index.entry_point.is_none());
        assert_eq!(index.m(), 16);
        assert_eq!(index.ef_construction(), 200);
    }

    #[test]
    fn test_new_rejects_zero_dimension() {
        let err = HnswIndex::with_defaults(0, "l2").unwrap_err();
        assert!(matches!(err, VecdbError::InvalidArgument(_)));
    }

    #[test]
    fn test_new_rejects_unknown_metric() {
        let err = HnswIndex::with_defaults(4, "hamming").unwrap_err();
        assert!(matches!(err, VecdbError::InvalidArgument(_)));
    }

    #[test]
    fn test_push_record_and_get() {
        let mut index = make_index(4);
        let pos = index.push_record(7, &[1.0, 2.0, 3.0, 4.0], 0);
        assert_eq!(pos, 0);
        assert_eq!(index.len(), 1);
        assert!(index.contains(7));
        assert_eq!(index.get(7), Some(&[1.0, 2.0, 3.0, 4.0][..]));
        assert_eq!(index.get(8), None);
    }

    #[test]
    fn test_remove_tombstones_once() {
        let mut index = make_index(2);
        index.push_record(1, &[0.0, 0.0], 0);
        index.push_record(2, &[1.0, 1.0], 0);
        assert_eq!(index.len(), 2);

        assert!(index.remove(1));
        assert_eq!(index.len(), 1);
        assert!(!index.contains(1));
        assert_eq!(index.get(1), None);
        // Absent and already-tombstoned ids are no-ops.
        assert!(!index.remove(1));
        assert!(!index.remove(99));
        assert_eq!(index.len(), 1);
        assert_eq!(index.record_count(), 2);
    }

    #[test]
    fn test_random_level_within_cap() {
        let mut index = make_index(4);
        for _ in 0..1000 {
            let level = index.random_level();
            assert!(level < config::HNSW_MAX_LAYERS);
        }
    }

    #[test]
    fn test_random_level_deterministic() {
        let mut a = make_index(4);
        let mut b = make_index(4);
        let seq_a: Vec<usize> = (0..100).map(|_| a.random_level()).collect();
        let seq_b: Vec<usize> = (0..100).map(|_| b.random_level()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_random_level_mostly_zero() {
        // At M=16, level 0 carries 1 - 1/16 of the mass.
        let mut index = make_index(4);
        let zeros = (0..1000).filter(|_| index.random_level() == 0).count();
        assert!(zeros > 850, "expected most levels at 0, got {zeros}/1000");
    }
}
