//! Tests for WAL Reader
//!
//! These tests verify:
//! - Sequential reads and the entry iterator
//! - Torn tails read as end of log
//! - Corrupt entries surface as errors

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use chargestore::error::ChargeError;
use chargestore::wal::{Operation, WalEntry, WalReader};
use chargestore::ItemType;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn entry(lsn: u64, key: &str) -> WalEntry {
    WalEntry::new(
        lsn,
        Operation::SetItem {
            item: ItemType::Timings,
            key: key.to_string(),
            value: vec![lsn as u8; 8],
        },
    )
}

fn write_raw(path: &PathBuf, chunks: &[Vec<u8>]) {
    let mut file = File::create(path).unwrap();
    for chunk in chunks {
        file.write_all(chunk).unwrap();
    }
    file.sync_all().unwrap();
}

// =============================================================================
// Basic Reading Tests
// =============================================================================

#[test]
fn test_read_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_read_multiple_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let entries: Vec<WalEntry> = (1..=5).map(|i| entry(i, &format!("t{}", i))).collect();
    let bytes: Vec<Vec<u8>> = entries.iter().map(|e| e.serialize().unwrap()).collect();
    let total: usize = bytes.iter().map(|b| b.len()).sum();
    write_raw(&wal_path, &bytes);

    let mut reader = WalReader::open(&wal_path).unwrap();
    for expected in &entries {
        let read = reader.next_entry().unwrap().unwrap();
        assert_eq!(&read, expected);
    }
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), total as u64);
}

#[test]
fn test_iterator_collects_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let bytes: Vec<Vec<u8>> = (1..=3).map(|i| entry(i, "t").serialize().unwrap()).collect();
    write_raw(&wal_path, &bytes);

    let lsns: Vec<u64> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .map(|e| e.unwrap().lsn)
        .collect();
    assert_eq!(lsns, vec![1, 2, 3]);
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_partial_header_reads_as_end() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw(&wal_path, &[entry(1, "t").serialize().unwrap(), vec![0u8; 8]]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_partial_data_reads_as_end() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut torn = entry(2, "t2").serialize().unwrap();
    torn.truncate(20);
    write_raw(&wal_path, &[entry(1, "t1").serialize().unwrap(), torn]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert_eq!(reader.next_entry().unwrap().unwrap().lsn, 1);
    assert!(reader.next_entry().unwrap().is_none());
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_corrupt_entry_is_an_error() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut bad = entry(2, "t2").serialize().unwrap();
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    write_raw(&wal_path, &[entry(1, "t1").serialize().unwrap(), bad]);

    let mut entries = WalReader::open(&wal_path).unwrap().entries();
    assert_eq!(entries.next().unwrap().unwrap().lsn, 1);
    assert!(matches!(
        entries.next(),
        Some(Err(ChargeError::WalCorruption(_)))
    ));
    assert!(entries.next().is_none());
}

#[test]
fn test_absurd_length_is_corruption() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut header = vec![0u8; 16];
    header[0] = 1;
    header[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
    write_raw(&wal_path, &[header]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(matches!(
        reader.next_entry(),
        Err(ChargeError::WalCorruption(_))
    ));
}
