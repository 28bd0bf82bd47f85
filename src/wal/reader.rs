//! WAL Reader
//!
//! Handles reading framed entries from a WAL segment.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use bytes::Buf;

use crate::config::DEFAULT_MAX_WAL_ENTRY_SIZE;
use crate::error::{CacheError, Result};

use super::entry::{decompress, frame_checksum};
use super::{WalEntryType, WriteWalEntry, HEADER_SIZE};

/// One checksummed record read from a segment
#[derive(Debug, Clone, PartialEq)]
pub enum WalRecord {
    /// A decoded write entry
    Write(WriteWalEntry),
    /// A record of another kind; its payload is not decoded
    Other { tag: u8, len: u32 },
}

/// Reads entries from a WAL segment, generic over the byte source
pub struct WalSegmentReader<R> {
    inner: R,
    /// Offset of the next unread frame (end of the last valid frame)
    position: u64,
    max_entry_size: u32,
}

impl WalSegmentReader<BufReader<File>> {
    /// Open a segment file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> WalSegmentReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            max_entry_size: DEFAULT_MAX_WAL_ENTRY_SIZE,
        }
    }

    /// Treat any frame claiming a longer payload as corrupt
    pub fn with_max_entry_size(mut self, max: u32) -> Self {
        self.max_entry_size = max;
        self
    }

    /// Bytes consumed by the valid frames read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next write entry, skipping records of other kinds.
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: a complete, valid write frame
    /// - `Ok(None)`: clean end of segment (exactly at a frame boundary)
    /// - `Err(WalTruncated)`: the segment ends inside a frame
    /// - `Err(WalCorruption)`: the frame is complete but invalid
    pub fn next_entry(&mut self) -> Result<Option<WriteWalEntry>> {
        while let Some(record) = self.next_record()? {
            if let WalRecord::Write(entry) = record {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Read the next record of any kind.
    ///
    /// The checksum is verified before the tag is interpreted, so a damaged
    /// tag surfaces as `WalCorruption` and a valid frame of an unknown kind
    /// comes back as `WalRecord::Other`.
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        let mut header = [0u8; HEADER_SIZE];
        let n = self.read_full(&mut header)?;
        if n == 0 {
            return Ok(None);
        }
        if n < HEADER_SIZE {
            return Err(CacheError::WalTruncated(format!(
                "partial header at offset {}: {} of {} bytes",
                self.position, n, HEADER_SIZE
            )));
        }

        let mut buf = &header[..];
        let tag = buf.get_u8();
        let len = buf.get_u32();
        let crc = buf.get_u32();

        if len > self.max_entry_size {
            return Err(CacheError::WalCorruption(format!(
                "frame at offset {} claims {} bytes, limit is {}",
                self.position, len, self.max_entry_size
            )));
        }

        let mut payload = vec![0u8; len as usize];
        let n = self.read_full(&mut payload)?;
        if n < payload.len() {
            return Err(CacheError::WalTruncated(format!(
                "partial payload at offset {}: {} of {} bytes",
                self.position, n, len
            )));
        }

        let actual = frame_checksum(tag, &payload);
        if actual != crc {
            return Err(CacheError::WalCorruption(format!(
                "checksum mismatch at offset {}: expected {:08x}, got {:08x}",
                self.position, crc, actual
            )));
        }

        let record = match WalEntryType::from(tag) {
            WalEntryType::Write => {
                WalRecord::Write(WriteWalEntry::decode(&decompress(&payload)?)?)
            }
            WalEntryType::Other(tag) => WalRecord::Other { tag, len },
        };

        self.position += (HEADER_SIZE + payload.len()) as u64;
        Ok(Some(record))
    }

    /// Iterate over write entries; stops after the first error
    pub fn entries(self) -> WalEntryIterator<R> {
        WalEntryIterator {
            reader: self,
            done: false,
        }
    }

    /// Fill `buf` until full or EOF; returns bytes read
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

/// Iterator over WAL entries
pub struct WalEntryIterator<R> {
    reader: WalSegmentReader<R>,
    done: bool,
}

impl<R: Read> Iterator for WalEntryIterator<R> {
    type Item = Result<WriteWalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
