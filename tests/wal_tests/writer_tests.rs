//! Tests for WAL Writer
//!
//! These tests verify:
//! - LSN generation and sequencing, including across reopen
//! - Sync strategies (EveryWrite, EveryNEntries)
//! - Truncation and create
//! - Integration with reader

use std::path::PathBuf;

use chargestore::config::WalSyncStrategy;
use chargestore::wal::{Operation, WalReader, WalWriter};
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

fn set_op(key: &str) -> Operation {
    Operation::SetItem {
        item: ItemType::Destinations,
        key: key.to_string(),
        value: key.as_bytes().to_vec(),
    }
}

fn remove_op(key: &str) -> Operation {
    Operation::RemoveItem {
        item: ItemType::Destinations,
        key: key.to_string(),
    }
}

// =============================================================================
// LSN Tests
// =============================================================================

#[test]
fn test_write_single_entry() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let lsn = writer.append(set_op("nat")).unwrap();

    assert_eq!(lsn, 1);
    assert_eq!(writer.current_lsn(), 2);
}

#[test]
fn test_lsn_sequential() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..50u64 {
        let lsn = writer.append(set_op(&format!("dst{}", i))).unwrap();
        assert_eq!(lsn, i + 1);
    }
}

#[test]
fn test_reopen_continues_lsn() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(set_op("a")).unwrap();
        writer.append(set_op("b")).unwrap();
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 3);
    assert_eq!(writer.append(remove_op("a")).unwrap(), 3);
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_sync_every_write() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(set_op("k1")).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
    writer.append(set_op("k2")).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_sync_every_n_entries() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 5 }).unwrap();

    for i in 0..4 {
        writer.append(set_op(&format!("k{}", i))).unwrap();
    }
    assert_eq!(writer.uncommitted_count(), 4);

    writer.append(set_op("k4")).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);

    writer.append(set_op("k5")).unwrap();
    assert_eq!(writer.uncommitted_count(), 1);
}

#[test]
fn test_manual_sync() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();
    for i in 0..10 {
        writer.append(set_op(&format!("k{}", i))).unwrap();
    }
    assert_eq!(writer.uncommitted_count(), 10);

    writer.sync().unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

// =============================================================================
// Write + Read Integration Tests
// =============================================================================

#[test]
fn test_write_then_read() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(set_op("nat")).unwrap();
        writer
            .append(Operation::AddReverse {
                destination_id: "nat".to_string(),
                prefixes: vec!["0256".to_string()],
            })
            .unwrap();
        writer.append(remove_op("nat")).unwrap();
    }

    let mut reader = WalReader::open(&wal_path).unwrap();

    let first = reader.next_entry().unwrap().unwrap();
    assert_eq!(first.lsn, 1);
    assert_eq!(first.operation, set_op("nat"));

    let second = reader.next_entry().unwrap().unwrap();
    assert!(matches!(second.operation, Operation::AddReverse { .. }));

    let third = reader.next_entry().unwrap().unwrap();
    assert_eq!(third.lsn, 3);
    assert_eq!(third.operation, remove_op("nat"));

    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_buffered_entries_visible_after_sync() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();
    for i in 0..300 {
        writer.append(set_op(&format!("k{}", i))).unwrap();
    }
    writer.sync().unwrap();

    let reader = WalReader::open(&wal_path).unwrap();
    let entries: Vec<_> = reader.entries().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(entries.len(), 300);
    assert_eq!(entries.last().unwrap().lsn, 300);
}

// =============================================================================
// Truncate / Create Tests
// =============================================================================

#[test]
fn test_truncate_clears_file_but_not_lsn() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(set_op("old1")).unwrap();
    writer.append(set_op("old2")).unwrap();
    writer.truncate().unwrap();
    assert_eq!(writer.uncommitted_count(), 0);

    let lsn = writer.append(set_op("new")).unwrap();
    assert_eq!(lsn, 3);

    let mut reader = WalReader::open(&wal_path).unwrap();
    let entry = reader.next_entry().unwrap().unwrap();
    assert_eq!(entry.operation, set_op("new"));
    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_create_replaces_existing_file() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(set_op("stale")).unwrap();
    }

    let mut writer = WalWriter::create(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 1);
    writer.append(set_op("fresh")).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert_eq!(reader.next_entry().unwrap().unwrap().operation, set_op("fresh"));
    assert!(reader.next_entry().unwrap().is_none());
}
