//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor
//! index.
//!
//! Records live in a Struct-of-Arrays arena: a contiguous f32 vector arena
//! with parallel arrays for external ids, levels, tombstone flags, and
//! per-layer adjacency stored as dense arena positions. Removal tombstones a
//! record: it vanishes from search results but keeps navigating traffic, so
//! the graph never loses connectivity. The full state round-trips through a
//! versioned little-endian binary format.

/// Versioned binary encode/decode of the complete index state.
pub mod codec;
/// Distance metrics: l2, cosine, and dot product.
pub mod distance;
/// Graph structure, configuration, and record storage.
pub mod graph;
/// Insertion with bidirectional links and back-edge pruning.
pub mod insert;
/// Greedy descent, bounded beam expansion, and k-NN search.
pub mod search;
/// Sparse-reset visited bitset for graph traversal.
pub mod visited;

pub use distance::DistanceMetric;
pub use graph::{HnswIndex, HnswOptions};
