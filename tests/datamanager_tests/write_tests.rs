//! Tests for the DataManager write path
//!
//! These tests verify:
//! - Backend store first, then cache, then replication
//! - Replication targets: global, per item and filtered by readers
//! - A failed replication leaves the local write committed

#[path = "../common/mod.rs"]
mod common;

use chargestore::config::ItemOpt;
use chargestore::entities::{Account, Balance, ItemType, Threshold, ThresholdProfile};
use chargestore::error::ChargeError;
use chargestore::replicator::{self, Action};
use chargestore::GetOptions;

use std::sync::Arc;

use common::{config, dm_with_peers, dm_with_store, local_dm, DataDbMock, MockClient};

fn method(action: Action, item: ItemType) -> String {
    replicator::method_name(action, item).unwrap()
}

fn broker() -> Account {
    let mut account = Account::new("vdf:broker");
    account.add_balance("*monetary", Balance::new("main", 21.0));
    account
}

fn replicating_peer() -> MockClient {
    MockClient::new()
        .acking(&method(Action::Set, ItemType::Accounts))
        .acking(&method(Action::Remove, ItemType::Accounts))
}

// =============================================================================
// Local Writes
// =============================================================================

#[test]
fn test_set_updates_backend_and_cache() {
    let dm = local_dm(config().build());
    dm.get_account("vdf:broker", &GetOptions::default()).unwrap_err();

    dm.set_account(broker()).unwrap();
    assert!(dm.has_data(ItemType::Accounts, "vdf:broker").unwrap());

    // The negative entry was replaced by the new value
    let cached = dm
        .cache()
        .get_as::<Account>(ItemType::Accounts, "vdf:broker")
        .unwrap()
        .unwrap();
    assert_eq!(*cached, broker());
}

#[test]
fn test_set_replaces_record() {
    let dm = local_dm(config().build());
    dm.set_account(broker()).unwrap();

    let mut updated = broker();
    updated.disabled = true;
    dm.set_account(updated.clone()).unwrap();

    let loaded = dm.get_account("vdf:broker", &GetOptions::fresh()).unwrap();
    assert_eq!(*loaded, updated);
}

#[test]
fn test_remove_evicts_cache() {
    let dm = local_dm(config().build());
    dm.set_account(broker()).unwrap();
    dm.remove_account("vdf:broker").unwrap();

    assert!(!dm.has_data(ItemType::Accounts, "vdf:broker").unwrap());
    assert!(!dm.cache().has_item(ItemType::Accounts, "vdf:broker"));
    assert!(matches!(
        dm.get_account("vdf:broker", &GetOptions::default()),
        Err(ChargeError::NotFound)
    ));
}

#[test]
fn test_remove_missing_record_succeeds() {
    let dm = local_dm(config().build());
    dm.remove_account("vdf:nobody").unwrap();
}

#[test]
fn test_tenant_scoped_writes() {
    let dm = local_dm(config().build());
    dm.set_threshold_profile(ThresholdProfile::new("vdf", "THD_ACNT_1001"))
        .unwrap();
    dm.set_threshold(Threshold::new("vdf", "THD_ACNT_1001")).unwrap();

    assert!(dm.has_data(ItemType::ThresholdProfiles, "vdf:THD_ACNT_1001").unwrap());
    dm.remove_threshold("vdf", "THD_ACNT_1001").unwrap();
    assert!(!dm.has_data(ItemType::Thresholds, "vdf:THD_ACNT_1001").unwrap());
    assert!(dm
        .get_threshold_profile("vdf", "THD_ACNT_1001", &GetOptions::fresh())
        .is_ok());
}

#[test]
fn test_write_without_backend() {
    let dm = local_dm(config().build());
    dm.set_account(broker()).unwrap();
    dm.detach_data_db();

    assert!(matches!(dm.set_account(broker()), Err(ChargeError::NoDatabaseConn)));
    assert!(matches!(
        dm.remove_account("vdf:broker"),
        Err(ChargeError::NoDatabaseConn)
    ));
    // The cache still holds the last committed value
    assert!(dm.cache().has_item(ItemType::Accounts, "vdf:broker"));
}

#[test]
fn test_write_to_backend_without_capability() {
    let dm = dm_with_store(config().build(), Arc::new(DataDbMock));
    assert!(matches!(dm.set_account(broker()), Err(ChargeError::NotImplemented)));
    assert!(matches!(
        dm.remove_account("vdf:broker"),
        Err(ChargeError::NotImplemented)
    ));
    assert!(!dm.cache().has_item(ItemType::Accounts, "vdf:broker"));
}

// =============================================================================
// Replication
// =============================================================================

#[test]
fn test_set_and_remove_replicated() {
    let peer = replicating_peer().into_arc();
    let config = config()
        .rpl_conns(&["peer"])
        .item(ItemType::Accounts, ItemOpt::default().replicated().with_route_id("r1"))
        .build();
    let dm = dm_with_peers(config, &[("peer", peer.clone())]);

    dm.set_account(broker()).unwrap();
    let set = method(Action::Set, ItemType::Accounts);
    assert_eq!(peer.calls(&set), 1);
    let arg = peer.last_arg::<Account>(&set).unwrap();
    assert_eq!(arg.arg, broker());
    assert_eq!(arg.api_opts.route_id.as_deref(), Some("r1"));
    assert_eq!(arg.api_opts.remote_host, None);

    dm.remove_account("vdf:broker").unwrap();
    let remove = method(Action::Remove, ItemType::Accounts);
    assert_eq!(peer.calls(&remove), 1);
    assert_eq!(peer.last_arg::<String>(&remove).unwrap().arg, "vdf:broker");
}

#[test]
fn test_no_replication_without_flag() {
    let peer = replicating_peer().into_arc();
    let config = config().rpl_conns(&["peer"]).build();
    let dm = dm_with_peers(config, &[("peer", peer.clone())]);

    dm.set_account(broker()).unwrap();
    dm.remove_account("vdf:broker").unwrap();
    assert_eq!(peer.total_calls(), 0);
}

#[test]
fn test_item_replication_connections() {
    let global = replicating_peer().into_arc();
    let dedicated = replicating_peer().into_arc();
    let config = config()
        .rpl_conns(&["global"])
        .item(
            ItemType::Accounts,
            ItemOpt::default()
                .replicated()
                .with_replication_conns(&["dedicated"]),
        )
        .build();
    let dm = dm_with_peers(
        config,
        &[("global", global.clone()), ("dedicated", dedicated.clone())],
    );

    dm.set_account(broker()).unwrap();
    assert_eq!(global.total_calls(), 0);
    assert_eq!(dedicated.calls(&method(Action::Set, ItemType::Accounts)), 1);
}

#[test]
fn test_replication_fails_over() {
    let down = MockClient::new().into_arc();
    let up = replicating_peer().into_arc();
    let config = config()
        .rpl_conns(&["down", "up"])
        .item(ItemType::Accounts, ItemOpt::default().replicated())
        .build();
    let dm = dm_with_peers(config, &[("down", down.clone()), ("up", up.clone())]);

    dm.set_account(broker()).unwrap();
    assert_eq!(down.total_calls(), 1);
    assert_eq!(up.calls(&method(Action::Set, ItemType::Accounts)), 1);
}

#[test]
fn test_replication_failure_keeps_local_write() {
    let peer = MockClient::new()
        .failing(&method(Action::Set, ItemType::Accounts), || {
            ChargeError::Remote("disk full".to_string())
        })
        .into_arc();
    let config = config()
        .rpl_conns(&["peer"])
        .item(ItemType::Accounts, ItemOpt::default().replicated())
        .build();
    let dm = dm_with_peers(config, &[("peer", peer)]);

    let result = dm.set_account(broker());
    assert!(matches!(result, Err(ChargeError::Remote(_))));
    assert!(dm.has_data(ItemType::Accounts, "vdf:broker").unwrap());
    assert!(dm.cache().has_item(ItemType::Accounts, "vdf:broker"));
}

#[test]
fn test_replication_without_wired_peers() {
    let config = config()
        .rpl_conns(&["peer"])
        .item(ItemType::Accounts, ItemOpt::default().replicated())
        .build();
    let dm = local_dm(config);

    assert!(matches!(dm.set_account(broker()), Err(ChargeError::Config(_))));
    assert!(dm.has_data(ItemType::Accounts, "vdf:broker").unwrap());
}

// =============================================================================
// Filtered Replication
// =============================================================================

fn filtered_dm(peer_a: Arc<MockClient>, peer_b: Arc<MockClient>) -> chargestore::DataManager {
    let config = config()
        .rpl_conns(&["peer_a", "peer_b"])
        .rpl_filtered(true)
        .item(ItemType::Accounts, ItemOpt::default().replicated())
        .build();
    dm_with_peers(config, &[("peer_a", peer_a), ("peer_b", peer_b)])
}

#[test]
fn test_filtered_replication_skips_unregistered_object() {
    let peer_a = replicating_peer().into_arc();
    let peer_b = replicating_peer().into_arc();
    let dm = filtered_dm(peer_a.clone(), peer_b.clone());

    dm.set_account(broker()).unwrap();
    assert_eq!(peer_a.total_calls() + peer_b.total_calls(), 0);
}

#[test]
fn test_filtered_replication_targets_readers() {
    let peer_a = replicating_peer().into_arc();
    let peer_b = replicating_peer().into_arc();
    let dm = filtered_dm(peer_a.clone(), peer_b.clone());

    dm.register_replication_host(ItemType::Accounts, "vdf:broker", "peer_b");
    assert_eq!(
        dm.replication_hosts(ItemType::Accounts, "vdf:broker"),
        vec!["peer_b".to_string()]
    );
    // Hosts are tracked per object
    assert!(dm.replication_hosts(ItemType::Accounts, "vdf:other").is_empty());
    assert!(dm.replication_hosts(ItemType::Filters, "vdf:broker").is_empty());

    dm.set_account(broker()).unwrap();
    assert_eq!(peer_a.total_calls(), 0);
    assert_eq!(peer_b.calls(&method(Action::Set, ItemType::Accounts)), 1);
}

#[test]
fn test_replication_hosts_are_not_duplicated() {
    let dm = local_dm(config().build());
    dm.register_replication_host(ItemType::Accounts, "vdf:broker", "peer_a");
    dm.register_replication_host(ItemType::Accounts, "vdf:broker", "peer_a");
    dm.register_replication_host(ItemType::Accounts, "vdf:broker", "peer_b");

    let mut hosts = dm.replication_hosts(ItemType::Accounts, "vdf:broker");
    hosts.sort();
    assert_eq!(hosts, vec!["peer_a".to_string(), "peer_b".to_string()]);
}
