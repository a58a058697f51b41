//! Radix tree engine
//!
//! Owns the root node and the blob store, and implements insertion, lookup
//! and deletion with all structural rewrites: prefix splitting, re-rooting
//! and merging of redundant branch nodes.
//!
//! The tree keeps itself minimal: apart from a key-less root, no non-record
//! node is ever left with a single child.

use std::mem;

use tracing::debug;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::node::{longest_common_prefix, Node, NodeValue};

/// Radix tree with deduplicating value storage.
///
/// Not synchronized; see `RadixStore` for the locked handle.
#[derive(Debug)]
pub struct Tree {
    root: Option<Node>,
    blobs: BlobStore,
    num_nodes: usize,
    num_records: usize,
    max_key_size: usize,
    max_value_size: u64,
}

impl Tree {
    /// Create an empty tree with the standard size limits.
    pub fn new() -> Self {
        Self::with_config(&Config::standard())
    }

    /// Create an empty tree enforcing the limits in `config`.
    pub fn with_config(config: &Config) -> Self {
        Self {
            root: None,
            blobs: BlobStore::new(),
            num_nodes: 0,
            num_records: 0,
            max_key_size: config.max_key_size,
            max_value_size: config.max_value_size,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.num_records
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.num_records == 0
    }

    /// Number of live nodes, records and branches alike.
    pub fn node_count(&self) -> usize {
        self.num_nodes
    }

    /// Number of distinct blobs held for large values.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    fn check_key(&self, key: &[u8]) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::NilKey);
        }
        if key.len() > self.max_key_size {
            return Err(StoreError::KeyTooLarge {
                size: key.len(),
                max: self.max_key_size,
            });
        }
        Ok(())
    }

    /// Insert or overwrite a record.
    ///
    /// Size limits are checked before the tree is touched.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.check_key(key)?;
        if value.len() as u64 > self.max_value_size {
            return Err(StoreError::ValueTooLarge {
                size: value.len() as u64,
                max: self.max_value_size,
            });
        }

        let blobs = &mut self.blobs;

        let Some(mut current) = self.root.as_mut() else {
            self.root = Some(Node::record(blobs, key.to_vec(), value));
            self.num_nodes = 1;
            self.num_records = 1;
            return Ok(());
        };

        let mut rest = key;

        loop {
            let prefix_len = longest_common_prefix(&current.key, rest);

            // Exact match: overwrite in place
            if prefix_len == current.key.len() && prefix_len == rest.len() {
                if !current.is_record {
                    self.num_records += 1;
                }
                current.set_value(blobs, value);
                return Ok(());
            }

            // The remaining key is a proper prefix of current's key, so the
            // new record takes current's place and current hangs below it:
            // "app" over "apple" gives ["app" -> "le"].
            if prefix_len == rest.len() {
                let record = Node::record(blobs, rest.to_vec(), value);
                let mut displaced = mem::replace(current, record);
                displaced.strip_prefix(prefix_len);
                current.add_child(displaced);

                debug!(prefix_len, "record re-parented existing node");
                self.num_nodes += 1;
                self.num_records += 1;
                return Ok(());
            }

            // Keys diverge inside current's segment: split on the common
            // prefix. An empty prefix only happens at a keyed root and yields
            // a key-less branch root grouping the top-level keys.
            if prefix_len < current.key.len() {
                let branch = Node::branch(rest[..prefix_len].to_vec());
                let mut displaced = mem::replace(current, branch);
                displaced.strip_prefix(prefix_len);
                current.add_child(displaced);
                current.add_child(Node::record(blobs, rest[prefix_len..].to_vec(), value));

                debug!(prefix_len, "split node on common prefix");
                self.num_nodes += 2;
                self.num_records += 1;
                return Ok(());
            }

            // Current's whole segment matched; continue with the remainder.
            rest = &rest[prefix_len..];

            match current.compatible_child_index(rest) {
                Some(index) => current = &mut current.children[index],
                None => {
                    current.add_child(Node::record(blobs, rest.to_vec(), value));
                    self.num_nodes += 1;
                    self.num_records += 1;
                    return Ok(());
                }
            }
        }
    }

    /// Look up a record's value.
    pub fn get(&self, key: &[u8]) -> StoreResult<&[u8]> {
        if key.is_empty() {
            return Err(StoreError::NilKey);
        }

        let node = self.descend(key, |_| {})?;
        if !node.is_record {
            return Err(StoreError::NotFound);
        }

        match &node.value {
            NodeValue::Empty => Ok(&[][..]),
            NodeValue::Inline(bytes) => Ok(bytes.as_slice()),
            NodeValue::Blob(id) => self
                .blobs
                .get(id)
                .ok_or_else(|| StoreError::corrupted(format!("record references missing blob {}", id))),
        }
    }

    /// Returns true if `key` holds a record.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_ok()
    }

    /// Remove a record, merging away any branch node it leaves redundant.
    pub fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::NilKey);
        }
        if self.is_empty() {
            return Err(StoreError::NotFound);
        }
        self.check_key(key)?;

        let mut path = Vec::new();
        let target = self.descend(key, |index| path.push(index))?;
        if !target.is_record {
            return Err(StoreError::NotFound);
        }

        let Some(child_index) = path.pop() else {
            return self.delete_root();
        };

        let blobs = &mut self.blobs;
        let parent = self
            .root
            .as_mut()
            .and_then(|root| node_at_mut(root, &path))
            .ok_or_else(|| StoreError::corrupted("non-root record has no parent"))?;
        let target = parent
            .children
            .get_mut(child_index)
            .ok_or_else(|| StoreError::corrupted("record missing from parent's children"))?;

        match target.children.len() {
            0 => {
                let segment = target.key.clone();
                let mut removed = parent.remove_child(&segment)?;
                removed.delete_value(blobs);
                self.num_nodes -= 1;
            }
            1 => {
                target.merge_with_only_child(blobs)?;
                debug!("deleted record merged with its only child");
                self.num_nodes -= 1;
            }
            _ => target.demote(blobs),
        }
        self.num_records -= 1;

        if !parent.is_record && parent.children.len() == 1 {
            parent.merge_with_only_child(blobs)?;
            debug!("redundant branch merged with its only child");
            self.num_nodes -= 1;
        }

        Ok(())
    }

    /// Remove the root's record while keeping the tree valid.
    fn delete_root(&mut self) -> StoreResult<()> {
        let blobs = &mut self.blobs;
        let root = self
            .root
            .as_mut()
            .ok_or_else(|| StoreError::corrupted("root vanished during delete"))?;

        match root.children.len() {
            0 => {
                root.delete_value(blobs);
                self.clear();
                return Ok(());
            }
            // The only child absorbs the root's segment and becomes the root
            1 => {
                root.merge_with_only_child(blobs)?;
                debug!("root merged with its only child");
                self.num_nodes -= 1;
            }
            // Still needed to host several children
            _ => root.demote(blobs),
        }

        self.num_records -= 1;
        Ok(())
    }

    /// Drop every record and blob.
    pub fn clear(&mut self) {
        debug!(records = self.num_records, nodes = self.num_nodes, "clearing tree");
        self.root = None;
        self.blobs.clear();
        self.num_nodes = 0;
        self.num_records = 0;
    }

    /// Walk from the root to the node owning exactly `key`, reporting the
    /// child index taken at each step.
    fn descend(&self, key: &[u8], mut visit: impl FnMut(usize)) -> StoreResult<&Node> {
        let mut current = self.root.as_ref().ok_or(StoreError::NotFound)?;
        let mut rest = key;

        loop {
            let prefix_len = longest_common_prefix(&current.key, rest);

            // The search key cannot exist below a node it only partly matches
            if prefix_len != current.key.len() {
                return Err(StoreError::NotFound);
            }
            if prefix_len == rest.len() {
                return Ok(current);
            }

            rest = &rest[prefix_len..];
            let index = current
                .compatible_child_index(rest)
                .ok_or(StoreError::NotFound)?;
            visit(index);
            current = &current.children[index];
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

fn node_at_mut<'a>(mut node: &'a mut Node, path: &[usize]) -> Option<&'a mut Node> {
    for &index in path {
        node = node.children.get_mut(index)?;
    }
    Some(node)
}
