//! Binary format definitions for RadixStore nodes
//!
//! A node is serialized without its key segment; the consumer supplies the
//! key from traversal context. All integers are little-endian:
//!
//!   [0..4]        checksum:      u32  - CRC32C of key + value bytes + record flag
//!   [4..12]       value_len:     u64  - length of the stored value bytes
//!   [12..12+n]    value:         [u8] - inline value or blob id
//!   [+0..+2]      child_count:   u16
//!   [+2..+18]     child offsets: [u64;2] - first child / next sibling, reserved
//!
//! Serialization is gated on the node's checksum: a node whose cached
//! checksum is stale cannot be encoded.

use crate::error::{StoreError, StoreResult};
use crate::node::{node_checksum, Node};

/// Maximum key size in bytes (64KB)
pub const MAX_KEY_BYTES: usize = u16::MAX as usize;

/// Maximum value size in bytes (4GB)
pub const MAX_VALUE_BYTES: u64 = u32::MAX as u64;

pub const CHECKSUM_SIZE: usize = 4;
pub const VALUE_LEN_SIZE: usize = 8;
pub const CHILD_COUNT_SIZE: usize = 2;

/// Reserved region for the first-child and next-sibling offsets
pub const CHILD_OFFSETS_SIZE: usize = 2 * std::mem::size_of::<u64>();

/// Encoded size of everything except the value bytes
pub const FIXED_SIZE: usize = CHECKSUM_SIZE + VALUE_LEN_SIZE + CHILD_COUNT_SIZE + CHILD_OFFSETS_SIZE;

/// Descriptor flag: node holds a record
pub const FLAG_RECORD: u8 = 0x01;

/// Descriptor flag: value bytes are a blob id
pub const FLAG_BLOB: u8 = 0x02;

/// Read view over a node in its serialized shape.
///
/// `data` borrows the node's own value buffer; nothing is copied.
#[derive(Debug, Clone)]
pub struct NodeDescriptor<'a> {
    pub checksum: u32,
    pub flags: u8,
    pub data_len: u64,
    pub data: &'a [u8],
    pub num_children: u16,
    /// One slot per child, filled once nodes have on-disk positions
    pub child_offsets: Vec<u64>,
}

impl<'a> NodeDescriptor<'a> {
    pub fn is_record(&self) -> bool {
        self.flags & FLAG_RECORD != 0
    }

    pub fn has_blob(&self) -> bool {
        self.flags & FLAG_BLOB != 0
    }

    /// Exact length of the encoding produced by `serialize`.
    pub fn serialized_size(&self) -> usize {
        FIXED_SIZE + self.data.len()
    }

    /// Encode into a fresh buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.serialized_size());
        self.serialize_into(&mut buffer);
        buffer
    }

    /// Append the encoding to `buffer`.
    pub fn serialize_into(&self, buffer: &mut Vec<u8>) {
        buffer.reserve(self.serialized_size());
        buffer.extend_from_slice(&self.checksum.to_le_bytes());
        buffer.extend_from_slice(&self.data_len.to_le_bytes());
        buffer.extend_from_slice(self.data);
        buffer.extend_from_slice(&self.num_children.to_le_bytes());
        // Offsets are unassigned while the tree lives in memory
        buffer.extend_from_slice(&[0u8; CHILD_OFFSETS_SIZE]);
    }
}

impl Node {
    /// Build a zero-copy descriptor. Fails if the checksum is stale.
    pub fn as_descriptor(&self) -> StoreResult<NodeDescriptor<'_>> {
        let computed = self.calculate_checksum();
        if computed != self.checksum {
            return Err(StoreError::InvalidChecksum {
                stored: self.checksum,
                computed,
            });
        }

        let mut flags = 0;
        if self.is_record {
            flags |= FLAG_RECORD;
        }
        if self.value.is_blob() {
            flags |= FLAG_BLOB;
        }

        let data = self.value.as_bytes();
        let num_children = self.children.len() as u16;

        Ok(NodeDescriptor {
            checksum: self.checksum,
            flags,
            data_len: data.len() as u64,
            data,
            num_children,
            child_offsets: vec![0; num_children as usize],
        })
    }

    /// Encode the node without its key segment.
    pub fn serialize_without_key(&self) -> StoreResult<Vec<u8>> {
        Ok(self.as_descriptor()?.serialize())
    }

    /// Exact length of `serialize_without_key` output, without encoding.
    pub fn serialized_size(&self) -> usize {
        FIXED_SIZE + self.value.as_bytes().len()
    }
}

/// Decoded view over serialized node bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode<'a> {
    pub checksum: u32,
    pub value: &'a [u8],
    pub num_children: u16,
    pub child_offsets: [u64; 2],
}

impl<'a> RawNode<'a> {
    /// Parse a node encoding. The buffer must hold exactly one node.
    pub fn parse(bytes: &'a [u8]) -> StoreResult<Self> {
        if bytes.len() < FIXED_SIZE {
            return Err(StoreError::malformed(0, format!(
                "node too short: {} bytes, need at least {}",
                bytes.len(),
                FIXED_SIZE
            )));
        }

        let checksum = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let value_len = read_u64(bytes, CHECKSUM_SIZE);

        let value_start = CHECKSUM_SIZE + VALUE_LEN_SIZE;
        let available = bytes.len() - FIXED_SIZE;
        let value_len = match usize::try_from(value_len) {
            Ok(len) if len <= available => len,
            _ => {
                return Err(StoreError::malformed(CHECKSUM_SIZE, format!(
                    "value length {} exceeds {} available bytes",
                    value_len, available
                )));
            }
        };

        let value_end = value_start + value_len;
        if bytes.len() != value_end + CHILD_COUNT_SIZE + CHILD_OFFSETS_SIZE {
            return Err(StoreError::malformed(value_end, format!(
                "{} trailing bytes after node",
                bytes.len() - FIXED_SIZE - value_len
            )));
        }

        let num_children = u16::from_le_bytes([bytes[value_end], bytes[value_end + 1]]);
        let offsets_start = value_end + CHILD_COUNT_SIZE;

        Ok(Self {
            checksum,
            value: &bytes[value_start..value_end],
            num_children,
            child_offsets: [
                read_u64(bytes, offsets_start),
                read_u64(bytes, offsets_start + 8),
            ],
        })
    }

    /// Check the encoded checksum against an externally supplied key segment.
    pub fn verify(&self, key: &[u8], is_record: bool) -> bool {
        self.checksum == node_checksum(key, self.value, is_record)
    }
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}
