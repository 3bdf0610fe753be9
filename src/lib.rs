//! # vecdb-core
//!
//! Embeddable in-memory vector database core: an HNSW approximate nearest
//! neighbor index over fixed-dimension f32 vectors, with tombstone deletion,
//! a versioned binary round-trip of the full index state, and a collection
//! layer with CRC-checked snapshot persistence.
//!
//! The crate has zero async dependencies and a single-threaded index core —
//! suitable for embedding directly in Rust or behind a thin language
//! binding that marshals arrays and maps [`VecdbError`] kinds onto host
//! exceptions.

/// Global configuration constants: defaults and tuning parameters.
pub mod config;
/// Error types shared across the index, collection, and persistence layers.
pub mod error;
/// HNSW approximate nearest neighbor index: graph, search, insertion,
/// distance metrics, and the binary wire format.
pub mod hnsw;
/// Storage layer: collections, database, and snapshot persistence.
pub mod storage;

pub use error::{Result, VecdbError};
pub use hnsw::{DistanceMetric, HnswIndex, HnswOptions};
pub use storage::{Collection, Database};
