//! WAL Entry definitions
//!
//! Defines the log record kinds and the framing of a single record.

use std::collections::BTreeMap;

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::value::{mixed_types, Value};

use super::{WalRecord, WalSegmentReader};

/// Frame header size: Type (1) + Len (4) + CRC (4) = 9 bytes
pub const HEADER_SIZE: usize = 9;

/// Kind of a framed log record
///
/// Only write records carry cache data. Every other kind still has a
/// checksummed frame and is skipped on replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalEntryType {
    /// Values written to one or more series keys
    Write,
    /// Any other record kind, by its raw tag
    Other(u8),
}

impl WalEntryType {
    /// Tag byte of a write record
    pub const WRITE_TAG: u8 = 0x01;

    /// Tag byte as stored in the frame header
    pub fn tag(self) -> u8 {
        match self {
            WalEntryType::Write => Self::WRITE_TAG,
            WalEntryType::Other(tag) => tag,
        }
    }
}

impl From<u8> for WalEntryType {
    fn from(tag: u8) -> Self {
        match tag {
            Self::WRITE_TAG => WalEntryType::Write,
            other => WalEntryType::Other(other),
        }
    }
}

/// A write record: series key → values written to it.
///
/// Each key's values must share one payload type; `decode` rejects a record
/// that mixes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteWalEntry {
    pub values: BTreeMap<String, Vec<Value>>,
}

impl WriteWalEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: BTreeMap<String, Vec<Value>>) -> Self {
        Self { values }
    }

    /// Append values for `key`
    pub fn insert(&mut self, key: impl Into<String>, values: Vec<Value>) {
        self.values.entry(key.into()).or_default().extend(values);
    }

    pub fn entry_type(&self) -> WalEntryType {
        WalEntryType::Write
    }

    /// Total number of values across all keys
    pub fn value_count(&self) -> usize {
        self.values.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encode the uncompressed payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Decode an uncompressed payload
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let entry: WriteWalEntry = bincode::deserialize(bytes)
            .map_err(|e| CacheError::WalCorruption(format!("undecodable write entry: {}", e)))?;

        for (key, values) in &entry.values {
            if let Some((first, other)) = mixed_types(values) {
                return Err(CacheError::WalCorruption(format!(
                    "key {:?} mixes {} and {} values",
                    key, first, other
                )));
            }
        }

        Ok(entry)
    }

    /// Encode, compress and frame this entry
    pub fn to_frame(&self, compression_level: i32) -> Result<Vec<u8>> {
        let compressed = compress(&self.encode()?, compression_level)?;
        Ok(encode_frame(self.entry_type(), &compressed))
    }

    /// Parse exactly one frame, which must be a write record
    pub fn from_frame(bytes: &[u8]) -> Result<Self> {
        let mut reader = WalSegmentReader::new(bytes);
        let record = reader.next_record()?.ok_or_else(|| {
            CacheError::WalTruncated("empty buffer, expected one frame".to_string())
        })?;

        if reader.position() != bytes.len() as u64 {
            return Err(CacheError::WalCorruption(format!(
                "{} trailing bytes after frame",
                bytes.len() as u64 - reader.position()
            )));
        }

        match record {
            WalRecord::Write(entry) => Ok(entry),
            WalRecord::Other { tag, .. } => Err(CacheError::UnexpectedEntryType(tag)),
        }
    }
}

/// CRC over the type tag followed by the compressed payload
pub(crate) fn frame_checksum(entry_type: u8, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[entry_type]);
    hasher.update(payload);
    hasher.finalize()
}

/// Build `type | len | crc | payload`
pub(crate) fn encode_frame(entry_type: WalEntryType, payload: &[u8]) -> Vec<u8> {
    let tag = entry_type.tag();
    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u8(tag);
    frame.put_u32(payload.len() as u32);
    frame.put_u32(frame_checksum(tag, payload));
    frame.put_slice(payload);
    frame.to_vec()
}

pub(crate) fn compress(bytes: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::stream::encode_all(bytes, level).map_err(|e| CacheError::Compression(e.to_string()))
}

pub(crate) fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    zstd::stream::decode_all(bytes)
        .map_err(|e| CacheError::WalCorruption(format!("payload decompression failed: {}", e)))
}
