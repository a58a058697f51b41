//! Content-addressed, deduplicating blob storage
//!
//! Values larger than the inline threshold live here, keyed by the BLAKE3
//! digest of their content. Identical values share one entry whose reference
//! count tracks how many nodes point at it. An entry is removed as soon as
//! its count reaches zero.
//!
//! The store has no lock of its own. Its only caller is the tree, which is
//! already serialized by the handle's RwLock.

use std::fmt;

use hashbrown::HashMap;
use tracing::trace;

/// Size of a blob id in bytes
pub const BLOB_ID_SIZE: usize = 32;

/// Content hash identifying a blob
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId([u8; BLOB_ID_SIZE]);

impl BlobId {
    /// Compute the id of the given content. Deterministic for identical bytes.
    pub fn of(value: &[u8]) -> Self {
        Self(*blake3::hash(value).as_bytes())
    }

    /// Raw id bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobId({})", hex::encode(self.0))
    }
}

/// A stored blob and the number of nodes referencing it.
#[derive(Debug)]
struct BlobEntry {
    value: Vec<u8>,
    ref_count: usize,
}

/// Deduplicating blob table.
#[derive(Debug, Default)]
pub struct BlobStore {
    entries: HashMap<BlobId, BlobEntry>,
}

impl BlobStore {
    /// Create an empty blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value and return its id.
    ///
    /// If identical content is already present its reference count is
    /// incremented instead of storing a second copy.
    pub fn put(&mut self, value: &[u8]) -> BlobId {
        let id = BlobId::of(value);

        let entry = self.entries.entry(id).or_insert_with(|| BlobEntry {
            value: value.to_vec(),
            ref_count: 0,
        });
        entry.ref_count += 1;

        trace!(blob = %id, ref_count = entry.ref_count, "blob referenced");
        id
    }

    /// Borrow the stored bytes for an id, if present.
    pub fn get(&self, id: &BlobId) -> Option<&[u8]> {
        self.entries.get(id).map(|entry| entry.value.as_slice())
    }

    /// Drop one reference to a blob, removing it at zero.
    ///
    /// Unknown ids are ignored.
    pub fn release(&mut self, id: &BlobId) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };

        entry.ref_count -= 1;
        trace!(blob = %id, ref_count = entry.ref_count, "blob released");

        if entry.ref_count == 0 {
            self.entries.remove(id);
        }
    }

    /// Current reference count of a blob, `None` if absent.
    pub fn ref_count(&self, id: &BlobId) -> Option<usize> {
        self.entries.get(id).map(|entry| entry.ref_count)
    }

    /// Number of distinct blobs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every blob regardless of reference count.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
