//! Write-Ahead Log (WAL) Segment Module
//!
//! Binary framing for WAL segment files and the writer/reader pair used to
//! produce and replay them.
//!
//! ## Responsibilities
//! - Encode write entries (series key → values) as compressed frames
//! - CRC32 checksums for corruption detection
//! - Distinguish clean end-of-segment from torn or corrupt tails
//! - Replay and verify whole segments
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Entry 1                                      │
//! │ ┌──────────┬─────────┬─────────┬───────────┐ │
//! │ │ Type (1) │ Len (4) │ CRC (4) │ Payload   │ │
//! │ └──────────┴─────────┴─────────┴───────────┘ │
//! ├──────────────────────────────────────────────┤
//! │ Entry 2                                      │
//! │ ┌──────────┬─────────┬─────────┬───────────┐ │
//! │ │ Type (1) │ Len (4) │ CRC (4) │ Payload   │ │
//! │ └──────────┴─────────┴─────────┴───────────┘ │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Len and CRC are big-endian. The CRC covers the type byte and the payload.
//! The payload is a zstd-compressed bincode encoding of the entry.
//! Frames of kinds other than write are checksummed the same way and skipped
//! on replay.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntryType, WriteWalEntry, HEADER_SIZE};
pub use writer::WalSegmentWriter;
pub use reader::{WalEntryIterator, WalRecord, WalSegmentReader};
pub use recovery::{RecoveryResult, WalRecovery};
