//! Store layout and the upgrade hook surface
//!
//! A store holds named collections. Each collection keys its records by a key
//! path and may carry secondary indexes. Schema changes happen only inside the
//! engine's upgrade hook, through [`Upgrade`].

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_core::{Key, Record, StoreError, StoreResult};

/// Secondary index definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexDef {
    pub(crate) key_path: String,
    pub(crate) unique: bool,
}

/// One record collection
#[derive(Debug, Clone, Default)]
pub(crate) struct CollectionData {
    pub(crate) key_path: String,
    pub(crate) records: BTreeMap<Key, Record>,
    pub(crate) indexes: FxHashMap<String, IndexDef>,
}

impl CollectionData {
    fn new(key_path: String) -> Self {
        Self {
            key_path,
            records: BTreeMap::new(),
            indexes: FxHashMap::default(),
        }
    }

    /// Find a record already holding `index_key` in a unique index
    pub(crate) fn unique_conflict(&self, def: &IndexDef, index_key: &Key) -> bool {
        self.records
            .values()
            .any(|r| Key::extract(r, &def.key_path).as_ref() == Some(index_key))
    }
}

/// Committed state of a store
///
/// Collections are shared with transaction snapshots; writers replace a
/// collection with `Arc::make_mut`, so snapshots taken earlier are untouched.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreData {
    pub(crate) version: u32,
    pub(crate) collections: FxHashMap<String, Arc<CollectionData>>,
}

/// Schema handle passed to the upgrade hook
///
/// # Example
///
/// ```ignore
/// let engine = MemoryEngine::with_upgrade(|upgrade| {
///     if upgrade.old_version() < 1 {
///         upgrade
///             .create_collection("items", "id")?
///             .create_index("by_value", "value", false)?;
///     }
///     Ok(())
/// });
/// ```
pub struct Upgrade<'a> {
    data: &'a mut StoreData,
    old_version: u32,
    new_version: u32,
}

impl<'a> Upgrade<'a> {
    pub(crate) fn new(data: &'a mut StoreData, old_version: u32, new_version: u32) -> Self {
        Self {
            data,
            old_version,
            new_version,
        }
    }

    /// Version the store had before this open (0 for a new store)
    pub fn old_version(&self) -> u32 {
        self.old_version
    }

    /// Version being opened
    pub fn new_version(&self) -> u32 {
        self.new_version
    }

    /// Check whether a collection exists
    pub fn has_collection(&self, name: &str) -> bool {
        self.data.collections.contains_key(name)
    }

    /// Create a collection keyed by `key_path`
    pub fn create_collection(
        &mut self,
        name: &str,
        key_path: &str,
    ) -> StoreResult<CollectionBuilder<'_>> {
        if self.data.collections.contains_key(name) {
            return Err(StoreError::transaction(format!(
                "collection '{}' already exists",
                name
            )));
        }
        let collection = self
            .data
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CollectionData::new(key_path.to_string())));
        Ok(CollectionBuilder {
            data: Arc::make_mut(collection),
        })
    }

    /// Modify an existing collection, e.g. to add an index
    pub fn collection(&mut self, name: &str) -> StoreResult<CollectionBuilder<'_>> {
        let collection = self
            .data
            .collections
            .get_mut(name)
            .ok_or_else(|| StoreError::collection_not_found(name))?;
        Ok(CollectionBuilder {
            data: Arc::make_mut(collection),
        })
    }

    /// Remove a collection and all its records
    pub fn delete_collection(&mut self, name: &str) -> StoreResult<()> {
        self.data
            .collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::collection_not_found(name))
    }
}

/// Builder for indexes on a collection being created or modified
pub struct CollectionBuilder<'a> {
    data: &'a mut CollectionData,
}

impl CollectionBuilder<'_> {
    /// Add a secondary index over `key_path`
    ///
    /// A unique index rejects records whose index key is already taken,
    /// including records already in the collection.
    pub fn create_index(
        &mut self,
        name: &str,
        key_path: &str,
        unique: bool,
    ) -> StoreResult<&mut Self> {
        if self.data.indexes.contains_key(name) {
            return Err(StoreError::transaction(format!(
                "index '{}' already exists",
                name
            )));
        }
        let def = IndexDef {
            key_path: key_path.to_string(),
            unique,
        };
        if unique {
            let mut seen = std::collections::BTreeSet::new();
            for record in self.data.records.values() {
                if let Some(k) = Key::extract(record, key_path) {
                    if !seen.insert(k.clone()) {
                        return Err(StoreError::already_exists(k));
                    }
                }
            }
        }
        self.data.indexes.insert(name.to_string(), def);
        Ok(self)
    }
}
