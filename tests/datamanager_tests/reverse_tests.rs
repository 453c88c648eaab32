//! Tests for destinations and the reverse destination index
//!
//! These tests verify:
//! - Destination writes move the index to the new prefix set
//! - Prefixes shared by several destinations keep every owner
//! - Rebuilding the index from destination records
//! - Generic writes cannot bypass the index
//! - Cached index entries never outlive a change

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use chargestore::config::ItemOpt;
use chargestore::entities::{Destination, ItemType, ReverseDestination};
use chargestore::error::ChargeError;
use chargestore::replicator::{self, Action};
use chargestore::storage::{DataDb, InternalDb};
use chargestore::{DataManager, Entity, GetOptions};

use common::{config, dm_with_peers, dm_with_store, local_dm, DataDbMock, MockClient};

fn owners(dm: &DataManager, prefix: &str) -> Option<Vec<String>> {
    match dm.get_reverse_destination(prefix, &GetOptions::default()) {
        Ok(rev) => Some(rev.destination_ids.clone()),
        Err(ChargeError::NotFound) => None,
        Err(e) => panic!("unexpected error: {}", e),
    }
}

fn ids(values: &[&str]) -> Option<Vec<String>> {
    Some(values.iter().map(|v| v.to_string()).collect())
}

// =============================================================================
// Destination Writes
// =============================================================================

#[test]
fn test_set_destination_indexes_prefixes() {
    let dm = local_dm(config().build());
    dm.set_destination(Destination::new("nat", &["0256", "0257"]), "")
        .unwrap();

    assert_eq!(owners(&dm, "0256"), ids(&["nat"]));
    assert_eq!(owners(&dm, "0257"), ids(&["nat"]));
    assert_eq!(owners(&dm, "0723"), None);

    let destination = dm.get_destination("nat", &GetOptions::fresh()).unwrap();
    assert_eq!(destination.prefixes, vec!["0256", "0257"]);
}

#[test]
fn test_update_destination_moves_prefixes() {
    let dm = local_dm(config().build());
    dm.set_destination(Destination::new("nat", &["0256", "0257"]), "")
        .unwrap();
    // Warm the cache with the old state
    assert_eq!(owners(&dm, "0257"), ids(&["nat"]));
    assert_eq!(owners(&dm, "0723"), None);

    dm.set_destination(Destination::new("nat", &["0256", "0723"]), "")
        .unwrap();

    assert_eq!(owners(&dm, "0256"), ids(&["nat"]));
    assert_eq!(owners(&dm, "0257"), None);
    assert_eq!(owners(&dm, "0723"), ids(&["nat"]));
}

#[test]
fn test_shared_prefix_keeps_every_owner() {
    let dm = local_dm(config().build());
    dm.set_destination(Destination::new("nat", &["0256", "0257"]), "")
        .unwrap();
    dm.set_destination(Destination::new("ret", &["0256"]), "").unwrap();
    assert_eq!(owners(&dm, "0256"), ids(&["nat", "ret"]));

    dm.set_destination(Destination::new("nat", &["0257"]), "").unwrap();
    assert_eq!(owners(&dm, "0256"), ids(&["ret"]));
    assert_eq!(owners(&dm, "0257"), ids(&["nat"]));
}

#[test]
fn test_duplicate_prefixes_indexed_once() {
    let dm = local_dm(config().build());
    dm.set_destination(Destination::new("nat", &["0256", "0256"]), "")
        .unwrap();
    assert_eq!(owners(&dm, "0256"), ids(&["nat"]));

    dm.set_destination(Destination::new("nat", &["0257"]), "").unwrap();
    assert_eq!(owners(&dm, "0256"), None);
}

#[test]
fn test_remove_destination_drops_prefixes() {
    let dm = local_dm(config().build());
    dm.set_destination(Destination::new("nat", &["0256", "0723"]), "")
        .unwrap();
    dm.set_destination(Destination::new("ret", &["0256"]), "").unwrap();
    assert_eq!(owners(&dm, "0723"), ids(&["nat"]));

    dm.remove_destination("nat", "").unwrap();
    assert_eq!(owners(&dm, "0256"), ids(&["ret"]));
    assert_eq!(owners(&dm, "0723"), None);
    assert!(matches!(
        dm.get_destination("nat", &GetOptions::default()),
        Err(ChargeError::NotFound)
    ));

    // Removing again is harmless
    dm.remove_destination("nat", "").unwrap();
}

#[test]
fn test_destination_write_joins_transaction() {
    let dm = local_dm(config().build());
    let tx = dm.cache().begin_transaction();
    dm.set_destination(Destination::new("nat", &["0256"]), &tx).unwrap();

    assert!(dm.has_data(ItemType::Destinations, "nat").unwrap());
    assert!(!dm.cache().has_item(ItemType::Destinations, "nat"));

    dm.cache().commit_transaction(&tx).unwrap();
    assert!(dm.cache().has_item(ItemType::Destinations, "nat"));
}

#[test]
fn test_concurrent_writers_of_one_prefix() {
    let dm = Arc::new(local_dm(config().build()));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let dm = Arc::clone(&dm);
            std::thread::spawn(move || {
                let id = format!("dst{}", i);
                dm.set_destination(Destination::new(id, &["0256", "0040"]), "")
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: Vec<String> = (0..8).map(|i| format!("dst{}", i)).collect();
    assert_eq!(owners(&dm, "0256"), Some(expected.clone()));
    assert_eq!(owners(&dm, "0040"), Some(expected));
}

#[test]
fn test_generic_destination_writes_keep_index() {
    let dm = local_dm(config().build());
    dm.set_entity(Destination::new("nat", &["0257"])).unwrap();
    assert_eq!(owners(&dm, "0257"), ids(&["nat"]));

    dm.set_entity(Destination::new("nat", &["0723"])).unwrap();
    assert_eq!(owners(&dm, "0257"), None);
    assert_eq!(owners(&dm, "0723"), ids(&["nat"]));

    dm.remove_entity::<Destination>("nat").unwrap();
    assert_eq!(owners(&dm, "0723"), None);
}

#[test]
fn test_reverse_entries_not_written_directly() {
    let dm = local_dm(config().build());
    let entry = ReverseDestination::new("0257", vec!["nat".to_string()]);
    assert!(matches!(dm.set_entity(entry), Err(ChargeError::InvalidKey(_))));
    assert_eq!(owners(&dm, "0257"), None);

    dm.set_destination(Destination::new("nat", &["0257"]), "")
        .unwrap();
    assert!(matches!(
        dm.remove_entity::<ReverseDestination>("0257"),
        Err(ChargeError::InvalidKey(_))
    ));
    assert_eq!(owners(&dm, "0257"), ids(&["nat"]));
}

// =============================================================================
// Direct Index Updates
// =============================================================================

#[test]
fn test_set_reverse_destination() {
    let dm = local_dm(config().build());
    let prefixes = vec!["0256".to_string(), "0257".to_string()];
    dm.set_reverse_destination("nat", &prefixes, "").unwrap();
    dm.set_reverse_destination("ret", &prefixes[..1], "").unwrap();

    assert_eq!(owners(&dm, "0256"), ids(&["nat", "ret"]));
    assert_eq!(owners(&dm, "0257"), ids(&["nat"]));
}

#[test]
fn test_set_reverse_destination_every_prefix() {
    let dm = local_dm(config().build());
    let destination = Destination::new("nat", &["0257", "0256", "0723"]);
    dm.set_reverse_destination(&destination.id, &destination.prefixes, "")
        .unwrap();

    for prefix in ["0257", "0256", "0723"] {
        assert_eq!(owners(&dm, prefix), ids(&["nat"]));
    }
}

#[test]
fn test_update_reverse_destination_owner_change() {
    let dm = local_dm(config().build());
    let old = Destination::new("nat", &["0256", "0257"]);
    dm.update_reverse_destination(None, Some(&old), "").unwrap();
    assert_eq!(owners(&dm, "0256"), ids(&["nat"]));

    // Same prefixes, new owner
    let new = Destination::new("mob", &["0256", "0257"]);
    dm.update_reverse_destination(Some(&old), Some(&new), "").unwrap();
    assert_eq!(owners(&dm, "0256"), ids(&["mob"]));
    assert_eq!(owners(&dm, "0257"), ids(&["mob"]));

    dm.update_reverse_destination(Some(&new), None, "").unwrap();
    assert_eq!(owners(&dm, "0256"), None);
}

#[test]
fn test_update_reverse_destination_without_backend() {
    let dm = local_dm(config().build());
    dm.detach_data_db();
    let new = Destination::new("nat", &["0256"]);
    assert!(matches!(
        dm.update_reverse_destination(None, Some(&new), ""),
        Err(ChargeError::NoDatabaseConn)
    ));
}

// =============================================================================
// Rebuild
// =============================================================================

#[test]
fn test_rebuild_from_destination_records() {
    let db = Arc::new(InternalDb::new());
    let dm = dm_with_store(config().build(), db.clone());

    // Records written behind the data manager's back, plus a stale entry
    Destination::new("nat", &["0256", "0257"]).store(db.as_ref()).unwrap();
    Destination::new("ret", &["0256"]).store(db.as_ref()).unwrap();
    db.add_reverse_destination("gone", &["0999".to_string()]).unwrap();
    assert_eq!(owners(&dm, "0256"), None);

    dm.rebuild_reverse_for_prefix(ItemType::ReverseDestinations)
        .unwrap();

    assert_eq!(owners(&dm, "0256"), ids(&["nat", "ret"]));
    assert_eq!(owners(&dm, "0257"), ids(&["nat"]));
    assert_eq!(owners(&dm, "0999"), None);
}

#[test]
fn test_rebuild_is_idempotent() {
    let dm = local_dm(config().build());
    dm.set_destination(Destination::new("nat", &["0256", "0723"]), "")
        .unwrap();

    dm.rebuild_reverse_for_prefix(ItemType::ReverseDestinations)
        .unwrap();
    dm.rebuild_reverse_for_prefix(ItemType::ReverseDestinations)
        .unwrap();

    let db = dm.data_db().unwrap();
    assert_eq!(
        db.keys(ItemType::ReverseDestinations, "").unwrap(),
        vec!["0256".to_string(), "0723".to_string()]
    );
}

#[test]
fn test_rebuild_alongside_destination_updates() {
    let dm = Arc::new(local_dm(config().build()));
    for i in 0..16 {
        dm.set_destination(Destination::new(format!("dst{}", i), &["0040"]), "")
            .unwrap();
    }
    dm.set_destination(Destination::new("nat", &["0256"]), "")
        .unwrap();

    let rebuilder = {
        let dm = Arc::clone(&dm);
        std::thread::spawn(move || {
            for _ in 0..50 {
                dm.rebuild_reverse_for_prefix(ItemType::ReverseDestinations)
                    .unwrap();
            }
        })
    };
    let writer = {
        let dm = Arc::clone(&dm);
        std::thread::spawn(move || {
            for i in 0..200 {
                let prefix = if i % 2 == 0 { "0257" } else { "0256" };
                dm.set_destination(Destination::new("nat", &[prefix]), "")
                    .unwrap();
            }
        })
    };
    rebuilder.join().unwrap();
    writer.join().unwrap();

    // Last write moved nat to 0256
    let fresh = GetOptions::uncached();
    let owner_of = |prefix: &str| match dm.get_reverse_destination(prefix, &fresh) {
        Ok(rev) => Some(rev.destination_ids.clone()),
        Err(ChargeError::NotFound) => None,
        Err(e) => panic!("unexpected error: {}", e),
    };
    assert_eq!(owner_of("0256"), ids(&["nat"]));
    assert_eq!(owner_of("0257"), None);
    assert_eq!(owner_of("0040").map(|owners| owners.len()), Some(16));
}

#[test]
fn test_rebuild_needs_key_iteration() {
    let dm = dm_with_store(config().build(), Arc::new(DataDbMock));
    assert!(matches!(
        dm.rebuild_reverse_for_prefix(ItemType::ReverseDestinations),
        Err(ChargeError::NotImplemented)
    ));
}

#[test]
fn test_rebuild_rejects_other_items() {
    let dm = local_dm(config().build());
    assert!(matches!(
        dm.rebuild_reverse_for_prefix(ItemType::Destinations),
        Err(ChargeError::InvalidKey(_))
    ));
}

// =============================================================================
// Replication
// =============================================================================

#[test]
fn test_reverse_updates_replicated_as_destinations() {
    let set = replicator::method_name(Action::Set, ItemType::ReverseDestinations).unwrap();
    let remove = replicator::method_name(Action::Remove, ItemType::ReverseDestinations).unwrap();
    let peer = MockClient::new().acking(&set).acking(&remove).into_arc();
    let config = config()
        .rpl_conns(&["peer"])
        .item(ItemType::ReverseDestinations, ItemOpt::default().replicated())
        .build();
    let dm = dm_with_peers(config, &[("peer", peer.clone())]);

    let prefixes = vec!["0256".to_string()];
    dm.set_reverse_destination("nat", &prefixes, "").unwrap();
    let arg = peer.last_arg::<Destination>(&set).unwrap();
    assert_eq!(arg.arg, Destination::new("nat", &["0256"]));

    // Destination writes maintain the peer's index through the destination
    // itself, not through reverse calls
    dm.set_destination(Destination::new("ret", &["0723"]), "").unwrap();
    assert_eq!(peer.calls(&set), 1);
}

#[test]
fn test_destination_replication() {
    let set = replicator::method_name(Action::Set, ItemType::Destinations).unwrap();
    let remove = replicator::method_name(Action::Remove, ItemType::Destinations).unwrap();
    let peer = MockClient::new().acking(&set).acking(&remove).into_arc();
    let config = config()
        .rpl_conns(&["peer"])
        .item(ItemType::Destinations, ItemOpt::default().replicated())
        .build();
    let dm = dm_with_peers(config, &[("peer", peer.clone())]);

    dm.set_destination(Destination::new("nat", &["0256"]), "").unwrap();
    assert_eq!(
        peer.last_arg::<Destination>(&set).unwrap().arg,
        Destination::new("nat", &["0256"])
    );
    dm.remove_destination("nat", "").unwrap();
    assert_eq!(peer.last_arg::<String>(&remove).unwrap().arg, "nat");
}
