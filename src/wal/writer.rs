//! WAL Writer
//!
//! Handles appending framed entries to a WAL segment file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{WalSyncStrategy, DEFAULT_WAL_COMPRESSION_LEVEL};
use crate::error::Result;

use super::entry::{compress, encode_frame};
use super::{WalEntryType, WriteWalEntry};

/// Writes entries to one WAL segment file
pub struct WalSegmentWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_strategy: WalSyncStrategy,
    compression_level: i32,
    /// Bytes in the segment, including buffered frames
    size: u64,
    entries_written: u64,
    /// Frames written since the last fsync
    unsynced: usize,
}

impl WalSegmentWriter {
    /// Create a new segment, truncating any existing file at `path`
    pub fn create(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self::from_file(path, file, 0, sync_strategy))
    }

    /// Open an existing segment (or create it) and append to its end
    pub fn open_append(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();

        Ok(Self::from_file(path, file, size, sync_strategy))
    }

    fn from_file(path: &Path, file: File, size: u64, sync_strategy: WalSyncStrategy) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            sync_strategy,
            compression_level: DEFAULT_WAL_COMPRESSION_LEVEL,
            size,
            entries_written: 0,
            unsynced: 0,
        }
    }

    /// Use a different zstd level for subsequent entries
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Append a write entry; returns the frame length in bytes
    pub fn write(&mut self, entry: &WriteWalEntry) -> Result<u64> {
        let compressed = compress(&entry.encode()?, self.compression_level)?;
        self.write_raw(entry.entry_type(), &compressed)
    }

    /// Append an already-compressed payload under `entry_type`
    pub fn write_raw(&mut self, entry_type: WalEntryType, compressed: &[u8]) -> Result<u64> {
        let frame = encode_frame(entry_type, compressed);
        self.writer.write_all(&frame)?;

        let written = frame.len() as u64;
        self.size += written;
        self.entries_written += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(written)
    }

    /// Flush buffered frames and fsync the segment
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        if self.unsynced > 0 {
            debug!(path = %self.path.display(), frames = self.unsynced, "synced WAL segment");
        }
        self.unsynced = 0;
        Ok(())
    }

    /// Current segment size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Entries appended through this writer
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
