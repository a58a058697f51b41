//! Trie nodes
//!
//! A node owns one segment of a key relative to its parent, an optional
//! value, and its children. Children are kept sorted by key segment and no
//! two siblings share a non-empty prefix, so at most one child can continue
//! any lookup.
//!
//! Every mutator refreshes the node's CRC32C checksum. The checksum covers
//! the key segment, the stored value bytes (inline bytes or blob id) and the
//! record flag.

use crate::blob::{BlobId, BlobStore};
use crate::error::{StoreError, StoreResult};

/// Values up to this many bytes are stored inside the node itself.
pub const INLINE_VALUE_THRESHOLD: usize = 32;

/// Where a node's value lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeValue {
    /// No value
    #[default]
    Empty,
    /// Value bytes held directly by the node
    Inline(Vec<u8>),
    /// Reference into the blob store
    Blob(BlobId),
}

impl NodeValue {
    /// Bytes stored in the node: the inline value or the blob id.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            NodeValue::Empty => &[],
            NodeValue::Inline(bytes) => bytes.as_slice(),
            NodeValue::Blob(id) => id.as_bytes(),
        }
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, NodeValue::Blob(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, NodeValue::Empty)
    }
}

/// In-memory radix tree node.
///
/// Nodes are not `Clone`: a copy would duplicate blob references without
/// bumping their reference counts.
#[derive(Debug, Default)]
pub struct Node {
    pub(crate) key: Vec<u8>,
    pub(crate) is_record: bool,
    pub(crate) value: NodeValue,
    pub(crate) children: Vec<Node>,
    pub(crate) checksum: u32,
}

impl Node {
    /// Create a non-record branch node.
    pub fn branch(key: Vec<u8>) -> Self {
        let mut node = Self { key, ..Self::default() };
        node.update_checksum();
        node
    }

    /// Create a record node holding `value`.
    pub fn record(store: &mut BlobStore, key: Vec<u8>, value: &[u8]) -> Self {
        let mut node = Self { key, ..Self::default() };
        node.set_value(store, value);
        node
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn is_record(&self) -> bool {
        self.is_record
    }

    pub fn is_blob(&self) -> bool {
        self.value.is_blob()
    }

    /// The stored value representation.
    pub fn stored_value(&self) -> &NodeValue {
        &self.value
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Resolve the node's value. Blob values are borrowed from the store.
    pub fn value<'a>(&'a self, store: &'a BlobStore) -> Option<&'a [u8]> {
        match &self.value {
            NodeValue::Empty => None,
            NodeValue::Inline(bytes) => Some(bytes.as_slice()),
            NodeValue::Blob(id) => store.get(id),
        }
    }

    /// Find the child whose key segment equals `key`, with its position.
    pub fn find_child(&self, key: &[u8]) -> StoreResult<(usize, &Node)> {
        self.children
            .iter()
            .enumerate()
            .find(|(_, child)| child.key == key)
            .ok_or(StoreError::NotFound)
    }

    /// Find the child sharing a non-empty prefix with `key`.
    pub fn find_compatible_child(&self, key: &[u8]) -> Option<&Node> {
        self.compatible_child_index(key).map(|index| &self.children[index])
    }

    pub(crate) fn compatible_child_index(&self, key: &[u8]) -> Option<usize> {
        self.children
            .iter()
            .position(|child| longest_common_prefix(&child.key, key) > 0)
    }

    /// Drop the first `len` bytes of the key segment.
    pub(crate) fn strip_prefix(&mut self, len: usize) {
        self.key.drain(..len);
        self.update_checksum();
    }

    /// Prepend `prefix` to the key segment. No-op on an empty prefix.
    pub fn prepend_key(&mut self, prefix: &[u8]) {
        if prefix.is_empty() {
            return;
        }

        let mut key = Vec::with_capacity(prefix.len() + self.key.len());
        key.extend_from_slice(prefix);
        key.extend_from_slice(&self.key);

        self.key = key;
        self.update_checksum();
    }

    /// Store `value` and flag the node as a record.
    ///
    /// Values above the inline threshold go to the blob store. A blob
    /// previously referenced by this node is released first.
    pub fn set_value(&mut self, store: &mut BlobStore, value: &[u8]) {
        self.release_blob(store);

        self.value = if value.len() <= INLINE_VALUE_THRESHOLD {
            NodeValue::Inline(value.to_vec())
        } else {
            NodeValue::Blob(store.put(value))
        };

        self.is_record = true;
        self.update_checksum();
    }

    /// Remove the node's value. Record status is left to the caller.
    pub fn delete_value(&mut self, store: &mut BlobStore) {
        self.release_blob(store);
        self.value = NodeValue::Empty;
        self.update_checksum();
    }

    /// Turn a record into a pure branch node.
    pub fn demote(&mut self, store: &mut BlobStore) {
        self.release_blob(store);
        self.value = NodeValue::Empty;
        self.is_record = false;
        self.update_checksum();
    }

    fn release_blob(&mut self, store: &mut BlobStore) {
        if let NodeValue::Blob(id) = &self.value {
            store.release(id);
        }
    }

    /// Insert a child, keeping children sorted ascending by key segment.
    pub fn add_child(&mut self, child: Node) {
        let index = self
            .children
            .partition_point(|existing| existing.key <= child.key);
        self.children.insert(index, child);
    }

    /// Detach and return the child whose key segment equals `key`.
    pub fn remove_child(&mut self, key: &[u8]) -> StoreResult<Node> {
        let (index, _) = self.find_child(key)?;
        Ok(self.children.remove(index))
    }

    /// Collapse this node into its only child.
    ///
    /// The node releases its own value, appends the child's key segment to
    /// its own, and takes over the child's value, record flag and children.
    /// The node keeps its place in the parent's child list.
    pub fn merge_with_only_child(&mut self, store: &mut BlobStore) -> StoreResult<()> {
        if self.children.len() != 1 {
            return Err(StoreError::corrupted(format!(
                "merge requires exactly one child, found {}",
                self.children.len()
            )));
        }

        self.release_blob(store);

        let child = self.children.remove(0);
        let Node { key, is_record, value, children, .. } = child;

        self.key.extend_from_slice(&key);
        self.is_record = is_record;
        self.value = value;
        self.children = children;
        self.update_checksum();

        Ok(())
    }

    /// Compute the checksum of the node's current content.
    pub(crate) fn calculate_checksum(&self) -> u32 {
        node_checksum(&self.key, self.value.as_bytes(), self.is_record)
    }

    /// Recompute and cache the checksum.
    pub fn update_checksum(&mut self) {
        self.checksum = self.calculate_checksum();
    }

    /// Returns true if the cached checksum matches the node's content.
    pub fn verify_checksum(&self) -> bool {
        self.checksum == self.calculate_checksum()
    }
}

/// CRC32C over key segment, stored value bytes and record flag.
pub(crate) fn node_checksum(key: &[u8], value: &[u8], is_record: bool) -> u32 {
    let crc = crc32c::crc32c(key);
    let crc = crc32c::crc32c_append(crc, value);
    crc32c::crc32c_append(crc, &[is_record as u8])
}

/// Length of the longest common prefix of two byte strings.
pub(crate) fn longest_common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(node: &Node) -> Vec<&[u8]> {
        node.children().iter().map(|child| child.key()).collect()
    }

    #[test]
    fn test_longest_common_prefix() {
        assert_eq!(longest_common_prefix(b"apple", b"application"), 4);
        assert_eq!(longest_common_prefix(b"apple", b"apple"), 5);
        assert_eq!(longest_common_prefix(b"apple", b"banana"), 0);
        assert_eq!(longest_common_prefix(b"", b"banana"), 0);
    }

    #[test]
    fn test_find_compatible_child() {
        let mut subject = Node::default();
        subject.add_child(Node::branch(b"apple".to_vec()));
        subject.add_child(Node::branch(b"banana".to_vec()));
        subject.add_child(Node::branch(b"citron".to_vec()));

        let cases: [(&[u8], Option<&[u8]>); 6] = [
            (&b"apple"[..], Some(&b"apple"[..])),
            (&b"applet"[..], Some(&b"apple"[..])),
            (&b"bandage"[..], Some(&b"banana"[..])),
            (&b"coconut"[..], Some(&b"citron"[..])),
            (&b"durian"[..], None),
            (&b"orange"[..], None),
        ];

        for (probe, expected) in cases {
            let found = subject.find_compatible_child(probe).map(Node::key);
            assert_eq!(found, expected, "probe {:?}", String::from_utf8_lossy(probe));
        }
    }

    #[test]
    fn test_find_child() {
        let mut subject = Node::default();
        subject.add_child(Node::branch(b"durian".to_vec()));
        subject.add_child(Node::branch(b"apple".to_vec()));
        subject.add_child(Node::branch(b"cherry".to_vec()));
        subject.add_child(Node::branch(b"banana".to_vec()));

        for (expected_index, key) in [&b"apple"[..], b"banana", b"cherry", b"durian"].iter().enumerate() {
            let (index, child) = subject.find_child(key).unwrap();
            assert_eq!(index, expected_index);
            assert_eq!(child.key(), *key);
        }

        assert_eq!(subject.find_child(b"orange").unwrap_err(), StoreError::NotFound);
        // Prefix matches are not exact matches
        assert!(subject.find_child(b"app").is_err());
    }

    #[test]
    fn test_add_child_sorted() {
        let mut parent = Node::default();

        parent.add_child(Node::branch(b"apple".to_vec()));
        assert_eq!(parent.num_children(), 1);

        parent.add_child(Node::branch(b"banana".to_vec()));
        assert_eq!(keys(&parent), vec![&b"apple"[..], b"banana"]);

        parent.add_child(Node::branch(b"avocado".to_vec()));
        assert_eq!(keys(&parent), vec![&b"apple"[..], b"avocado", b"banana"]);

        parent.add_child(Node::branch(b"alpha".to_vec()));
        assert_eq!(keys(&parent), vec![&b"alpha"[..], b"apple", b"avocado", b"banana"]);

        parent.add_child(Node::branch(b"carrot".to_vec()));
        assert_eq!(parent.num_children(), 5);
        assert_eq!(keys(&parent).last(), Some(&&b"carrot"[..]));

        // Duplicates never reach a node through the tree, but ordering still holds
        parent.add_child(Node::branch(b"apple".to_vec()));
        assert_eq!(
            keys(&parent),
            vec![&b"alpha"[..], b"apple", b"apple", b"avocado", b"banana", b"carrot"]
        );
    }

    #[test]
    fn test_remove_child() {
        let mut subject = Node::default();
        for key in [&b"banana"[..], b"durian", b"apple", b"cherry"] {
            subject.add_child(Node::branch(key.to_vec()));
        }

        let removed = subject.remove_child(b"banana").unwrap();
        assert_eq!(removed.key(), b"banana");
        assert_eq!(keys(&subject), vec![&b"apple"[..], b"cherry", b"durian"]);

        assert_eq!(subject.remove_child(b"orange").unwrap_err(), StoreError::NotFound);

        subject.remove_child(b"durian").unwrap();
        subject.remove_child(b"apple").unwrap();
        assert_eq!(keys(&subject), vec![&b"cherry"[..]]);

        subject.remove_child(b"cherry").unwrap();
        assert!(subject.is_leaf());
        assert_eq!(subject.remove_child(b"cherry").unwrap_err(), StoreError::NotFound);
    }

    #[test]
    fn test_update_checksum() {
        let mut store = BlobStore::new();
        let mut node = Node::record(&mut store, b"apple".to_vec(), b"sauce");

        let expected = node_checksum(b"apple", b"sauce", true);
        assert_eq!(node.checksum(), expected);
        assert!(node.verify_checksum());

        node.key = b"maple".to_vec();
        assert!(!node.verify_checksum());

        node.update_checksum();
        assert!(node.verify_checksum());
    }

    #[test]
    fn test_checksum_covers_record_flag() {
        let branch = Node::branch(b"apple".to_vec());
        assert_ne!(branch.checksum(), node_checksum(b"apple", b"", true));
        assert_eq!(branch.checksum(), node_checksum(b"apple", b"", false));
    }

    #[test]
    fn test_prepend_key() {
        let mut subject = Node::branch(b"child".to_vec());

        subject.prepend_key(b"parent-");
        assert_eq!(subject.key(), b"parent-child");

        subject.prepend_key(b"");
        assert_eq!(subject.key(), b"parent-child");

        assert!(subject.verify_checksum());
    }

    #[test]
    fn test_set_value_inline_and_blob() {
        let mut store = BlobStore::new();

        let small = Node::record(&mut store, b"apple".to_vec(), b"sauce");
        assert!(!small.is_blob());
        assert!(small.is_record());
        assert!(store.is_empty());

        let large_value = vec![0u8; INLINE_VALUE_THRESHOLD + 1];
        let large = Node::record(&mut store, b"banana".to_vec(), &large_value);
        assert!(large.is_blob());
        assert_eq!(store.len(), 1);

        match large.stored_value() {
            NodeValue::Blob(id) => assert_eq!(store.get(id), Some(large_value.as_slice())),
            other => panic!("expected blob value, got {:?}", other),
        }
        assert_eq!(large.value(&store), Some(large_value.as_slice()));
    }

    #[test]
    fn test_value_at_threshold_is_inline() {
        let mut store = BlobStore::new();
        let value = vec![7u8; INLINE_VALUE_THRESHOLD];
        let node = Node::record(&mut store, b"k".to_vec(), &value);
        assert!(!node.is_blob());
        assert!(store.is_empty());
    }

    #[test]
    fn test_overwrite_releases_old_blob() {
        let mut store = BlobStore::new();
        let first = vec![1u8; 64];
        let second = vec![2u8; 64];

        let mut node = Node::record(&mut store, b"k".to_vec(), &first);
        node.set_value(&mut store, &second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.ref_count(&BlobId::of(&first)), None);

        node.set_value(&mut store, b"tiny");
        assert!(store.is_empty());
        assert_eq!(node.value(&store), Some(&b"tiny"[..]));
    }

    #[test]
    fn test_delete_value_keeps_record_flag() {
        let mut store = BlobStore::new();
        let mut node = Node::record(&mut store, b"k".to_vec(), &[9u8; 40]);

        node.delete_value(&mut store);
        assert!(node.is_record());
        assert!(node.stored_value().is_empty());
        assert!(store.is_empty());
        assert!(node.verify_checksum());

        node.demote(&mut store);
        assert!(!node.is_record());
        assert!(node.verify_checksum());
    }

    #[test]
    fn test_merge_with_only_child() {
        let mut store = BlobStore::new();
        let mut parent = Node::branch(b"app".to_vec());
        let mut child = Node::record(&mut store, b"le".to_vec(), &[3u8; 48]);
        child.add_child(Node::record(&mut store, b"t".to_vec(), b"small"));
        parent.add_child(child);

        parent.merge_with_only_child(&mut store).unwrap();

        assert_eq!(parent.key(), b"apple");
        assert!(parent.is_record());
        assert_eq!(parent.value(&store), Some(&[3u8; 48][..]));
        assert_eq!(keys(&parent), vec![&b"t"[..]]);
        assert!(parent.verify_checksum());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_merge_requires_single_child() {
        let mut store = BlobStore::new();
        let mut leaf = Node::branch(b"leaf".to_vec());
        assert!(matches!(leaf.merge_with_only_child(&mut store), Err(StoreError::Corrupted { .. })));

        leaf.add_child(Node::branch(b"a".to_vec()));
        leaf.add_child(Node::branch(b"b".to_vec()));
        assert!(matches!(leaf.merge_with_only_child(&mut store), Err(StoreError::Corrupted { .. })));
    }
}
