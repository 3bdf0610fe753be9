//! Collection and database handles.
//!
//! A [`Collection`] is a named HNSW index behind a shared lock; cloning a
//! handle aliases the same data. [`Database`] groups named collections and
//! enforces name uniqueness.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, VecdbError};
use crate::hnsw::graph::{HnswIndex, HnswOptions};

/// Internal state of a collection, protected by a `RwLock`.
#[derive(Debug)]
pub struct CollectionData {
    pub name: String,
    pub index: HnswIndex,
}

/// A named collection of vectors with a fixed dimension and metric.
///
/// All operations acquire a read or write lock on the internal
/// [`CollectionData`]. Cloning produces a new handle to the same data.
#[derive(Debug, Clone)]
pub struct Collection {
    pub(crate) data: Arc<RwLock<CollectionData>>,
}

impl Collection {
    /// Creates an empty collection.
    ///
    /// Fails with an argument error on an empty name, `dimension < 1`, or
    /// an unknown metric tag.
    pub fn new(name: &str, dimension: usize, metric: &str, options: HnswOptions) -> Result<Self> {
        if name.is_empty() {
            return Err(VecdbError::InvalidArgument(
                "collection name cannot be empty".into(),
            ));
        }
        let index = HnswIndex::new(dimension, metric, options)?;
        Ok(Self::from_parts(name.to_string(), index))
    }

    pub(crate) fn from_parts(name: String, index: HnswIndex) -> Self {
        Self {
            data: Arc::new(RwLock::new(CollectionData { name, index })),
        }
    }

    /// The collection name.
    pub fn name(&self) -> String {
        self.data.read().name.clone()
    }

    /// The configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.data.read().index.dimension()
    }

    /// The configured metric tag.
    pub fn metric(&self) -> &'static str {
        self.data.read().index.metric().tag()
    }

    /// Insert a vector under an external identifier.
    pub fn insert(&self, id: i64, vector: &[f32]) -> Result<()> {
        self.data.write().index.add(id, vector)
    }

    /// k-nearest-neighbor search; see [`HnswIndex::search`].
    pub fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(i64, f32)>> {
        self.data.read().index.search(query, k, ef_search)
    }

    /// Tombstone a vector. Returns `true` if state changed.
    pub fn delete(&self, id: i64) -> bool {
        self.data.write().index.remove(id)
    }

    /// Retrieve a live vector by id.
    pub fn get(&self, id: i64) -> Option<Vec<f32>> {
        self.data.read().index.get(id).map(|v| v.to_vec())
    }

    /// `true` if `id` exists as a live record.
    pub fn contains(&self, id: i64) -> bool {
        self.data.read().index.contains(id)
    }

    /// Number of live records.
    pub fn count(&self) -> usize {
        self.data.read().index.len()
    }
}

/// Database holding all named collections.
#[derive(Debug, Clone, Default)]
pub struct Database {
    pub(crate) collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl Database {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new collection, failing if the name is taken.
    pub fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: &str,
        options: Option<HnswOptions>,
    ) -> Result<Collection> {
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(VecdbError::CollectionExists(name.to_string()));
        }
        let collection = Collection::new(name, dimension, metric, options.unwrap_or_default())?;
        collections.insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    /// Returns a handle to the named collection.
    pub fn get_collection(&self, name: &str) -> Result<Collection> {
        self.collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| VecdbError::CollectionNotFound(name.to_string()))
    }

    /// Drops a collection. Returns `true` if it existed.
    pub fn delete_collection(&self, name: &str) -> bool {
        self.collections.write().remove(name).is_some()
    }

    /// Sorted names of all collections.
    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}
