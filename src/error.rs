//! Error types for vecdb-core.
//!
//! Each failure mode a host binding needs to recognize gets its own variant,
//! so bindings can map kinds 1:1 onto their exception hierarchy without
//! string matching.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VecdbError>;

/// All errors produced by the index, collection, and persistence layers.
#[derive(Debug, Error)]
pub enum VecdbError {
    /// Input vector length does not match the configured dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    Dimension {
        /// The index's configured dimension.
        expected: usize,
        /// The length of the offending input.
        actual: usize,
    },

    /// Insertion identifier already exists in the index.
    #[error("id {0} already exists")]
    DuplicateId(i64),

    /// Invalid parameter: unknown metric tag, `k < 1`, `dimension < 1`,
    /// or an empty collection name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed snapshot or wire-format bytes: wrong version, truncation,
    /// checksum mismatch, or inconsistent field sizes.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A collection with this name already exists in the database.
    #[error("collection '{0}' already exists")]
    CollectionExists(String),

    /// No collection with this name exists in the database.
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// Filesystem error while saving or loading snapshots.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
