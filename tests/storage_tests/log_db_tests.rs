//! Tests for the journal-backed backend store
//!
//! These tests verify:
//! - State survives reopen
//! - A torn journal tail is dropped on reopen
//! - Compaction keeps state and shrinks the journal
//! - `storage::open` selects the backend from config

use std::fs::{self, OpenOptions};
use std::io::Write;

use chargestore::config::{Config, DbType, WalSyncStrategy};
use chargestore::entities::{Account, Destination, Entity};
use chargestore::error::ChargeError;
use chargestore::storage::{self, DataDb, LogDb};
use chargestore::ItemType;
use tempfile::TempDir;

fn open(dir: &TempDir) -> LogDb {
    LogDb::open(dir.path(), WalSyncStrategy::EveryWrite).unwrap()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir);
        Account::new("vdf:broker").store(&db).unwrap();
        Account::new("vdf:gone").store(&db).unwrap();
        Account::erase(&db, "vdf:gone").unwrap();
        db.add_reverse_destination("nat", &strings(&["0256", "0257"])).unwrap();
        db.remove_reverse_destination("nat", "0257").unwrap();
    }

    let db = open(&dir);
    assert_eq!(Account::load(&db, "vdf:broker").unwrap().id, "vdf:broker");
    assert!(matches!(Account::load(&db, "vdf:gone"), Err(ChargeError::NotFound)));
    assert_eq!(db.get_reverse_destination("0256").unwrap(), strings(&["nat"]));
    assert!(matches!(
        db.get_reverse_destination("0257"),
        Err(ChargeError::NotFound)
    ));
}

#[test]
fn test_buffered_writes_survive_after_sync() {
    let dir = TempDir::new().unwrap();
    {
        let db = LogDb::open(dir.path(), WalSyncStrategy::EveryNEntries { count: 1000 }).unwrap();
        for i in 0..10 {
            db.set_raw(ItemType::Timings, &format!("T{}", i), vec![i]).unwrap();
        }
        db.sync().unwrap();
    }

    let db = open(&dir);
    assert_eq!(db.keys(ItemType::Timings, "").unwrap().len(), 10);
}

#[test]
fn test_flush_is_journaled() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir);
        db.set_raw(ItemType::Timings, "ASAP", Vec::new()).unwrap();
        db.flush_all().unwrap();
    }

    let db = open(&dir);
    assert!(db.state().is_empty());
}

#[test]
fn test_cache_only_item_is_rejected() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    assert!(matches!(
        db.set_raw(ItemType::ReplicationHosts, "k", Vec::new()),
        Err(ChargeError::InvalidKey(_))
    ));
    // Nothing was journaled for the rejected write
    drop(db);
    assert!(open(&dir).state().is_empty());
}

// =============================================================================
// Crash Recovery Tests
// =============================================================================

#[test]
fn test_torn_tail_is_dropped() {
    let dir = TempDir::new().unwrap();
    let wal_path;
    {
        let db = open(&dir);
        Destination::new("nat", &["0256"]).store(&db).unwrap();
        wal_path = db.wal_path();
    }
    let clean_len = fs::metadata(&wal_path).unwrap().len();

    // Simulate a crash in the middle of an append
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[7u8; 11]).unwrap();
    drop(file);

    let db = open(&dir);
    assert_eq!(Destination::load(&db, "nat").unwrap().prefixes, strings(&["0256"]));
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), clean_len);

    // New writes land after the recovered tail
    Destination::new("ret", &["0723"]).store(&db).unwrap();
    drop(db);
    let db = open(&dir);
    assert!(Destination::load(&db, "ret").is_ok());
}

// =============================================================================
// Compaction Tests
// =============================================================================

#[test]
fn test_compact_keeps_state() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    for round in 0..20 {
        db.set_raw(ItemType::Accounts, "vdf:broker", vec![round]).unwrap();
    }
    db.add_reverse_destination("nat", &strings(&["0256", "0257"])).unwrap();
    db.add_reverse_destination("ret", &strings(&["0256"])).unwrap();
    let before = fs::metadata(db.wal_path()).unwrap().len();

    // One account record plus one reverse entry per destination
    assert_eq!(db.compact().unwrap(), 3);
    assert!(fs::metadata(db.wal_path()).unwrap().len() < before);

    db.set_raw(ItemType::Accounts, "vdf:other", vec![1]).unwrap();
    drop(db);

    let db = open(&dir);
    assert_eq!(db.get_raw(ItemType::Accounts, "vdf:broker").unwrap(), vec![19]);
    assert_eq!(db.get_raw(ItemType::Accounts, "vdf:other").unwrap(), vec![1]);
    assert_eq!(db.get_reverse_destination("0256").unwrap(), strings(&["nat", "ret"]));
    assert_eq!(db.get_reverse_destination("0257").unwrap(), strings(&["nat"]));
}

// =============================================================================
// Backend Selection Tests
// =============================================================================

#[test]
fn test_open_from_config() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .db_type(DbType::Log)
        .db_path(dir.path().join("store"))
        .build();

    let db = storage::open(&config).unwrap();
    db.set_raw(ItemType::Filters, "vdf:F1", vec![1]).unwrap();
    assert!(dir.path().join("store").join("data.wal").exists());

    let memory = storage::open(&Config::default()).unwrap();
    assert!(matches!(
        memory.get_raw(ItemType::Filters, "vdf:F1"),
        Err(ChargeError::NotFound)
    ));
}
