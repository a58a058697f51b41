//! RadixStore — Embedded Radix-Tree Key-Value Store
//!
//! An in-memory key-value store for keys that share long prefixes and values
//! that repeat across keys.
//!
//! # Architecture
//!
//! - **Index**: compressed trie over byte-string keys; each node owns one
//!   key segment, siblings never share a prefix
//! - **Values**: up to 32 bytes inline in the node, larger values in a
//!   content-addressed, reference-counted blob store
//! - **Format**: checksum-gated node encoding with reserved child-offset
//!   slots for a future disk-backed layout
//!
//! All structural mutation happens under one RwLock held by `RadixStore`.

pub mod blob;
pub mod config;
pub mod error;
pub mod format;
pub mod node;
pub mod store;
pub mod tree;

// Re-export key types for convenience
pub use blob::{BlobId, BlobStore};
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use format::{NodeDescriptor, RawNode};
pub use node::{Node, NodeValue, INLINE_VALUE_THRESHOLD};
pub use store::RadixStore;
pub use tree::Tree;
