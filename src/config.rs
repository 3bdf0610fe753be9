//! Global configuration constants for vecdb-core.
//!
//! Tuning parameters and defaults live here as compile-time constants;
//! per-index overrides are passed through [`crate::hnsw::HnswOptions`].

/// Default number of bidirectional links per HNSW node.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Controls the size of the dynamic candidate list during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Maximum number of layers in the HNSW graph.
///
/// Caps the sampled level. At M = 16 the probability of sampling a level
/// at or above this cap is 16^-16, so the cap is unobservable in practice.
pub const HNSW_MAX_LAYERS: usize = 16;

/// Seed for the level-sampling generator.
///
/// A fixed seed makes graph construction deterministic: identical insertion
/// sequences with identical parameters produce identical graphs.
pub const HNSW_LEVEL_SEED: u64 = 42;
