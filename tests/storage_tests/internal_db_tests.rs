//! Tests for the in-memory backend store
//!
//! These tests verify:
//! - Keyed records per item type
//! - Reverse destination index maintenance
//! - The capability defaults of an empty `DataDb` impl

#[path = "../common/mod.rs"]
mod common;

use chargestore::entities::{Destination, Entity, ReverseDestination};
use chargestore::error::ChargeError;
use chargestore::storage::{DataDb, InternalDb};
use chargestore::ItemType;

use common::DataDbMock;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// =============================================================================
// Keyed Record Tests
// =============================================================================

#[test]
fn test_set_get_remove_raw() {
    let db = InternalDb::new();
    db.set_raw(ItemType::Accounts, "vdf:broker", b"v1".to_vec()).unwrap();

    assert_eq!(db.get_raw(ItemType::Accounts, "vdf:broker").unwrap(), b"v1");
    assert!(matches!(
        db.get_raw(ItemType::Filters, "vdf:broker"),
        Err(ChargeError::NotFound)
    ));

    db.remove_raw(ItemType::Accounts, "vdf:broker").unwrap();
    assert!(matches!(
        db.get_raw(ItemType::Accounts, "vdf:broker"),
        Err(ChargeError::NotFound)
    ));
    // Removing a missing record succeeds
    db.remove_raw(ItemType::Accounts, "vdf:broker").unwrap();
}

#[test]
fn test_keys_sorted_by_prefix() {
    let db = InternalDb::new();
    for key in ["vdf:b", "vdf:a", "itsyscom:c"] {
        db.set_raw(ItemType::Thresholds, key, Vec::new()).unwrap();
    }

    assert_eq!(db.keys(ItemType::Thresholds, "vdf:").unwrap(), strings(&["vdf:a", "vdf:b"]));
    assert_eq!(db.len(ItemType::Thresholds), 3);
}

#[test]
fn test_cache_only_item_is_rejected() {
    let db = InternalDb::new();
    assert!(matches!(
        db.set_raw(ItemType::ReplicationHosts, "k", Vec::new()),
        Err(ChargeError::InvalidKey(_))
    ));
}

#[test]
fn test_entity_round_trip_through_store() {
    let db = InternalDb::new();
    let nat = Destination::new("nat", &["0256", "0257"]);
    nat.store(&db).unwrap();

    assert_eq!(Destination::load(&db, "nat").unwrap(), nat);
    Destination::erase(&db, "nat").unwrap();
    assert!(matches!(Destination::load(&db, "nat"), Err(ChargeError::NotFound)));
}

// =============================================================================
// Reverse Index Tests
// =============================================================================

#[test]
fn test_reverse_add_and_remove() {
    let db = InternalDb::new();
    db.add_reverse_destination("nat", &strings(&["0256", "0257"])).unwrap();
    db.add_reverse_destination("ret", &strings(&["0256"])).unwrap();

    assert_eq!(db.get_reverse_destination("0256").unwrap(), strings(&["nat", "ret"]));
    assert_eq!(db.get_reverse_destination("0257").unwrap(), strings(&["nat"]));

    db.remove_reverse_destination("nat", "0257").unwrap();
    assert!(matches!(
        db.get_reverse_destination("0257"),
        Err(ChargeError::NotFound)
    ));
    assert_eq!(db.keys(ItemType::ReverseDestinations, "").unwrap(), strings(&["0256"]));
}

#[test]
fn test_reverse_entity_view() {
    let db = InternalDb::new();
    db.add_reverse_destination("nat", &strings(&["0723"])).unwrap();

    let rev = ReverseDestination::load(&db, "0723").unwrap();
    assert_eq!(rev.prefix, "0723");
    assert_eq!(rev.destination_ids, strings(&["nat"]));

    ReverseDestination::new("0723", strings(&["a", "b"])).store(&db).unwrap();
    assert_eq!(db.get_reverse_destination("0723").unwrap(), strings(&["a", "b"]));
}

#[test]
fn test_flush_all() {
    let db = InternalDb::new();
    db.set_raw(ItemType::Timings, "ASAP", Vec::new()).unwrap();
    db.add_reverse_destination("nat", &strings(&["0256"])).unwrap();

    db.flush_all().unwrap();
    assert!(db.is_empty());
}

// =============================================================================
// Capability Defaults
// =============================================================================

#[test]
fn test_empty_impl_reports_not_implemented() {
    let db = DataDbMock;

    assert!(matches!(db.get_raw(ItemType::Accounts, "k"), Err(ChargeError::NotImplemented)));
    assert!(matches!(
        db.set_raw(ItemType::Accounts, "k", Vec::new()),
        Err(ChargeError::NotImplemented)
    ));
    assert!(matches!(db.keys(ItemType::Destinations, ""), Err(ChargeError::NotImplemented)));
    assert!(matches!(
        db.add_reverse_destination("nat", &strings(&["0256"])),
        Err(ChargeError::NotImplemented)
    ));
    assert!(matches!(db.flush_all(), Err(ChargeError::NotImplemented)));
}
