//! Storage layer: collections, database, and snapshot persistence.
//!
//! Data lives in-memory in `Collection` instances grouped by a `Database`.
//! Durability is a per-collection snapshot file (bincode envelope around the
//! index wire bytes, CRC32 footer, atomic temp-file + rename).

/// Collection and database data structures.
pub mod collection;
/// Snapshot save/load with integrity verification.
pub mod persistence;

pub use collection::{Collection, Database};
pub use persistence::{load_all_collections, load_collection, save_collection};
