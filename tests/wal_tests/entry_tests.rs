//! Tests for WAL entry encoding and framing
//!
//! These tests verify:
//! - Payload round trip with every value type
//! - CRC32 corruption detection
//! - Edge cases (truncation, unknown tags, oversized lengths, mixed types)

use std::collections::BTreeMap;

use tsmcache::value::Value;
use tsmcache::wal::{WalEntryType, WriteWalEntry, HEADER_SIZE};
use tsmcache::CacheError;

fn sample_entry() -> WriteWalEntry {
    let mut entry = WriteWalEntry::new();
    entry.insert("cpu,host=a#usage", vec![Value::new(1, 1.5), Value::new(2, 2.5)]);
    entry.insert("mem,host=a#free", vec![Value::new(1, 1024i64)]);
    entry.insert("disk,host=a#ok", vec![Value::new(1, true)]);
    entry.insert("log,host=a#msg", vec![Value::new(1, "started")]);
    entry
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_frame_round_trip_all_types() {
    let entry = sample_entry();

    let frame = entry.to_frame(3).unwrap();
    let recovered = WriteWalEntry::from_frame(&frame).unwrap();

    assert_eq!(recovered, entry);
    assert_eq!(recovered.value_count(), 5);
    assert_eq!(recovered.entry_type(), WalEntryType::Write);
}

#[test]
fn test_frame_header_layout() {
    let frame = sample_entry().to_frame(3).unwrap();

    assert_eq!(frame[0], WalEntryType::Write.tag());
    let len = u32::from_be_bytes(frame[1..5].try_into().unwrap()) as usize;
    assert_eq!(frame.len(), HEADER_SIZE + len);
}

#[test]
fn test_insert_appends_to_existing_key() {
    let mut entry = WriteWalEntry::new();
    entry.insert("k", vec![Value::new(1, 1.0)]);
    entry.insert("k", vec![Value::new(2, 2.0)]);

    assert_eq!(entry.values.len(), 1);
    assert_eq!(entry.value_count(), 2);
}

// =============================================================================
// Corruption Detection Tests
// =============================================================================

#[test]
fn test_crc_corruption_in_payload_detected() {
    let mut frame = sample_entry().to_frame(3).unwrap();

    if let Some(byte) = frame.last_mut() {
        *byte ^= 0xFF;
    }

    let result = WriteWalEntry::from_frame(&frame);
    assert!(matches!(result, Err(CacheError::WalCorruption(_))));
}

#[test]
fn test_crc_corruption_in_header_detected() {
    let mut frame = sample_entry().to_frame(3).unwrap();

    // CRC occupies bytes 5..9
    frame[6] ^= 0xFF;

    let result = WriteWalEntry::from_frame(&frame);
    assert!(matches!(result, Err(CacheError::WalCorruption(_))));
}

#[test]
fn test_damaged_tag_fails_checksum() {
    let mut frame = sample_entry().to_frame(3).unwrap();
    frame[0] = 0x7F;

    let result = WriteWalEntry::from_frame(&frame);
    assert!(matches!(result, Err(CacheError::WalCorruption(_))));
}

#[test]
fn test_valid_frame_of_other_kind_is_not_a_write() {
    let mut frame = vec![0x02];
    let payload = b"delete cpu";
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[0x02]);
    hasher.update(payload);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&hasher.finalize().to_be_bytes());
    frame.extend_from_slice(payload);

    let result = WriteWalEntry::from_frame(&frame);
    assert!(matches!(result, Err(CacheError::UnexpectedEntryType(0x02))));
}

#[test]
fn test_entry_type_tags() {
    assert_eq!(WalEntryType::from(0x01), WalEntryType::Write);
    assert_eq!(WalEntryType::from(0x02), WalEntryType::Other(0x02));
    assert_eq!(WalEntryType::Other(0x09).tag(), 0x09);
}

#[test]
fn test_oversized_length_rejected() {
    let mut frame = sample_entry().to_frame(3).unwrap();
    frame[1..5].copy_from_slice(&u32::MAX.to_be_bytes());

    let result = WriteWalEntry::from_frame(&frame);
    assert!(matches!(result, Err(CacheError::WalCorruption(_))));
}

#[test]
fn test_truncated_frame_detected() {
    let frame = sample_entry().to_frame(3).unwrap();

    let header_only = WriteWalEntry::from_frame(&frame[..HEADER_SIZE - 1]);
    assert!(matches!(header_only, Err(CacheError::WalTruncated(_))));

    let partial_payload = WriteWalEntry::from_frame(&frame[..frame.len() - 1]);
    assert!(matches!(partial_payload, Err(CacheError::WalTruncated(_))));

    let empty = WriteWalEntry::from_frame(&[]);
    assert!(matches!(empty, Err(CacheError::WalTruncated(_))));
}

#[test]
fn test_trailing_bytes_rejected() {
    let mut frame = sample_entry().to_frame(3).unwrap();
    frame.extend_from_slice(&[0, 0]);

    let result = WriteWalEntry::from_frame(&frame);
    assert!(matches!(result, Err(CacheError::WalCorruption(_))));
}

#[test]
fn test_decode_rejects_mixed_types_within_key() {
    let mut values = BTreeMap::new();
    values.insert(
        "mixed".to_string(),
        vec![Value::new(1, 1.0), Value::new(2, 2i64)],
    );
    let bytes = WriteWalEntry::with_values(values).encode().unwrap();

    let result = WriteWalEntry::decode(&bytes);
    assert!(matches!(result, Err(CacheError::WalCorruption(_))));
}

#[test]
fn test_decode_garbage_is_corruption() {
    let result = WriteWalEntry::decode(&[0xFF; 7]);
    assert!(matches!(result, Err(CacheError::WalCorruption(_))));
}
