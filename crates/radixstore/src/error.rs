//! Error types for RadixStore operations
//!
//! All RadixStore errors are represented by the StoreError enum. Input
//! problems (nil or oversized keys and values) are reported before any
//! mutation happens; integrity problems are surfaced as-is and never retried.

use std::error::Error;
use std::fmt;

/// RadixStore error types with detailed context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A required key argument was absent (empty)
    NilKey,

    /// Key exceeds the configured size limit
    KeyTooLarge {
        /// Size of the rejected key
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Value exceeds the configured size limit
    ValueTooLarge {
        /// Size of the rejected value
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// Key is absent, or the located node does not hold a record
    NotFound,

    /// A node's cached checksum does not match its current content
    InvalidChecksum {
        /// Checksum cached in the node
        stored: u32,
        /// Checksum computed from the node's fields
        computed: u32,
    },

    /// An internal structural invariant was violated
    Corrupted {
        /// Description of the violated invariant
        reason: String,
    },

    /// Serialized node bytes could not be decoded
    Malformed {
        /// Byte offset where decoding failed
        offset: u64,
        /// Description of the problem
        reason: String,
    },

    /// Configuration parameters are out of range
    InvalidConfig {
        /// Which parameter is invalid and why
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn corrupted(reason: impl Into<String>) -> Self {
        StoreError::Corrupted { reason: reason.into() }
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        StoreError::Malformed { offset: offset as u64, reason: reason.into() }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NilKey => write!(f, "key cannot be nil"),

            StoreError::KeyTooLarge { size, max } => {
                write!(f, "key is too large: {} bytes exceeds limit of {} bytes", size, max)
            }

            StoreError::ValueTooLarge { size, max } => {
                write!(f, "value is too large: {} bytes exceeds limit of {} bytes", size, max)
            }

            StoreError::NotFound => write!(f, "key not found"),

            StoreError::InvalidChecksum { stored, computed } => {
                write!(f, "invalid node checksum: stored 0x{:08x}, computed 0x{:08x}",
                       stored, computed)
            }

            StoreError::Corrupted { reason } => {
                write!(f, "database corruption detected: {}", reason)
            }

            StoreError::Malformed { offset, reason } => {
                write!(f, "malformed node encoding at offset {}: {}", offset, reason)
            }

            StoreError::InvalidConfig { reason } => {
                write!(f, "invalid configuration: {}", reason)
            }
        }
    }
}

impl Error for StoreError {}

/// Result type alias for RadixStore operations
pub type StoreResult<T> = Result<T, StoreError>;
