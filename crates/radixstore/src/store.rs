//! Thread-safe handle over the radix tree.
//!
//! RadixStore wraps a Tree in a single RwLock.
//!
//! **Read path**: `get`/`len` share the read lock; concurrent readers allowed
//! **Write path**: `put`/`delete`/`clear` hold the write lock for the whole
//! operation, so readers never observe a half-relinked tree

use parking_lot::RwLock;
use tracing::debug;

use crate::config::Config;
use crate::error::StoreResult;
use crate::tree::Tree;

/// Embedded key-value store: radix tree index + deduplicating blob storage.
///
/// All public methods take `&self`; share it across threads with `Arc`.
pub struct RadixStore {
    /// Tree and blob store, guarded as one unit
    tree: RwLock<Tree>,
    /// Store configuration
    config: Config,
}

impl RadixStore {
    /// Create an empty store with the standard configuration.
    pub fn new() -> Self {
        let config = Config::default();
        Self {
            tree: RwLock::new(Tree::with_config(&config)),
            config,
        }
    }

    /// Create an empty store after validating `config`.
    pub fn open(config: Config) -> StoreResult<Self> {
        config.validate()?;

        debug!(
            max_key_size = config.max_key_size,
            max_value_size = config.max_value_size,
            "opened radix store"
        );

        Ok(Self {
            tree: RwLock::new(Tree::with_config(&config)),
            config,
        })
    }

    /// Insert or overwrite a key-value pair.
    ///
    /// Fails with `NilKey`, `KeyTooLarge` or `ValueTooLarge` without
    /// modifying the store.
    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut tree = self.tree.write();
        tree.put(key, value)
    }

    /// Get a copy of the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        let tree = self.tree.read();
        tree.get(key).map(<[u8]>::to_vec)
    }

    /// Delete the record stored under `key`.
    pub fn delete(&self, key: &[u8]) -> StoreResult<()> {
        let mut tree = self.tree.write();
        tree.delete(key)
    }

    /// Check if a record exists for `key`.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        let tree = self.tree.read();
        tree.contains_key(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        let tree = self.tree.read();
        tree.len()
    }

    /// Returns true if the store has no records.
    pub fn is_empty(&self) -> bool {
        let tree = self.tree.read();
        tree.is_empty()
    }

    /// Number of tree nodes, including pure branch nodes.
    pub fn node_count(&self) -> usize {
        let tree = self.tree.read();
        tree.node_count()
    }

    /// Number of distinct deduplicated blobs.
    pub fn blob_count(&self) -> usize {
        let tree = self.tree.read();
        tree.blob_count()
    }

    /// Reset to the empty state.
    pub fn clear(&self) {
        let mut tree = self.tree.write();
        tree.clear();
    }

    /// Store configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Default for RadixStore {
    fn default() -> Self {
        Self::new()
    }
}
