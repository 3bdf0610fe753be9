//! Snapshot persistence for collections.
//!
//! Each collection serializes to `<name>.vdb`: a bincode envelope holding
//! the collection name and the index's versioned wire bytes, followed by a
//! 4-byte magic and a big-endian CRC32 footer. Writes go to a temp file and
//! rename into place to prevent torn snapshots on crash.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VecdbError};
use crate::hnsw::graph::HnswIndex;
use crate::storage::collection::{Collection, Database};

/// Magic bytes separating the envelope from the CRC32 footer.
const SNAPSHOT_CRC_MAGIC: &[u8; 4] = b"VDB1";

/// Snapshot file extension.
const SNAPSHOT_EXT: &str = "vdb";

#[derive(Serialize, Deserialize)]
struct CollectionSnapshot {
    name: String,
    index: Vec<u8>,
}

/// Save a collection to `dir`, creating the directory if needed.
pub fn save_collection(collection: &Collection, dir: &Path) -> Result<()> {
    let data = collection.data.read();
    let snapshot = CollectionSnapshot {
        name: data.name.clone(),
        index: data.index.serialize(),
    };
    let bytes =
        bincode::serialize(&snapshot).map_err(|e| std::io::Error::other(e.to_string()))?;

    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.{}", data.name, SNAPSHOT_EXT));
    let tmp_path = dir.join(format!("{}.{}.tmp", data.name, SNAPSHOT_EXT));

    // Payload, then magic + CRC32 footer.
    let crc = crc32fast::hash(&bytes);
    let mut out = Vec::with_capacity(bytes.len() + 8);
    out.extend_from_slice(&bytes);
    out.extend_from_slice(SNAPSHOT_CRC_MAGIC);
    out.extend_from_slice(&crc.to_be_bytes());

    // Atomic write: temp file, then rename.
    fs::write(&tmp_path, &out)?;
    fs::rename(&tmp_path, &path)?;

    tracing::info!(
        "Saved collection '{}' ({} bytes, CRC32={:#010x})",
        data.name,
        bytes.len(),
        crc
    );
    Ok(())
}

/// Load a collection snapshot, verifying the CRC32 footer.
pub fn load_collection(path: &Path) -> Result<Collection> {
    let raw = fs::read(path)?;
    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_CRC_MAGIC {
        return Err(VecdbError::Deserialization(format!(
            "snapshot {path:?} is missing its CRC32 footer"
        )));
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(VecdbError::Deserialization(format!(
            "snapshot CRC32 mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x} ({path:?})"
        )));
    }

    let snapshot: CollectionSnapshot =
        bincode::deserialize(payload).map_err(|e| VecdbError::Deserialization(e.to_string()))?;
    let index = HnswIndex::deserialize(&snapshot.index)?;

    tracing::info!(
        "Loaded collection '{}' ({} live records)",
        snapshot.name,
        index.len()
    );
    Ok(Collection::from_parts(snapshot.name, index))
}

/// Load every `.vdb` snapshot in a directory, skipping unreadable files
/// with a warning. A missing directory yields an empty list.
pub fn load_all_collections(dir: &Path) -> Result<Vec<Collection>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut collections = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some(SNAPSHOT_EXT) {
            match load_collection(&path) {
                Ok(collection) => collections.push(collection),
                Err(e) => {
                    tracing::warn!("Failed to load {:?}: {}", path, e);
                }
            }
        }
    }
    Ok(collections)
}

impl Database {
    /// Load every snapshot in `dir` into a new database.
    pub fn open(dir: &Path) -> Result<Self> {
        let db = Database::new();
        {
            let mut collections = db.collections.write();
            for collection in load_all_collections(dir)? {
                collections.insert(collection.name(), collection);
            }
        }
        Ok(db)
    }

    /// Persist every collection to `dir`.
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        for collection in self.collections.read().values() {
            save_collection(collection, dir)?;
        }
        Ok(())
    }
}
