//! Write fan-out to peers
//!
//! Replication is best effort relative to the local write: the backend
//! store has already committed when peers are called, and a failed call is
//! logged and returned without undoing anything.
//!
//! With `rpl_filtered`, only peers registered as replication hosts of the
//! object receive it. Hosts are cache-only group members:
//!
//! ```text
//! *replication_hosts partition
//!   group "acc_vdf:broker"  ──▶ { "acc_vdf:broker" + "node_b", ... }
//! ```

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::NON_TRANSACTIONAL;
use crate::entities::{Entity, ItemType};
use crate::error::{ChargeError, Result};
use crate::replicator::{self, Action, ApiOpts, ArgWithApiOpts};

use super::DataManager;

impl DataManager {
    /// Call metadata for `item`; `with_remote_host` advertises this node
    /// so a peer serving a read can replicate back to it
    pub(crate) fn api_opts(&self, item: ItemType, with_remote_host: bool) -> ApiOpts {
        let opt = self.config.item(item);
        ApiOpts {
            api_key: opt.api_key.clone(),
            route_id: opt.route_id.clone(),
            remote_host: if with_remote_host {
                self.config.data_db.rmt_conn_id.clone()
            } else {
                None
            },
        }
    }

    /// Record that peer `host` read `key` of `item` from this node
    pub fn register_replication_host(&self, item: ItemType, key: &str, host: &str) {
        let object = Self::object_id(item, key);
        let member = format!("{}{}", object, host);
        self.cache.set(
            ItemType::ReplicationHosts,
            &member,
            None,
            &[object],
            false,
            NON_TRANSACTIONAL,
        );
    }

    /// Peers registered as replication hosts of `key`
    pub fn replication_hosts(&self, item: ItemType, key: &str) -> Vec<String> {
        let object = Self::object_id(item, key);
        self.cache
            .group_item_ids(ItemType::ReplicationHosts, &object)
            .into_iter()
            .filter_map(|member| member.strip_prefix(object.as_str()).map(str::to_string))
            .collect()
    }

    /// Connections a write of `key` goes to
    pub(crate) fn replication_targets(&self, item: ItemType, key: &str) -> Vec<String> {
        let mut conns = self.config.replication_conns(item).to_vec();
        if self.config.data_db.rpl_filtered {
            let hosts = self.replication_hosts(item, key);
            conns.retain(|conn| hosts.contains(conn));
        }
        conns
    }

    pub(crate) fn replicate_set<T: Entity>(&self, value: &T, key: &str) -> Result<()> {
        if !self.config.item(T::ITEM).replicate {
            return Ok(());
        }
        let arg = ArgWithApiOpts::new(value, self.api_opts(T::ITEM, false));
        self.replicate(T::ITEM, key, Action::Set, &arg)
    }

    pub(crate) fn replicate_remove(&self, item: ItemType, key: &str) -> Result<()> {
        if !self.config.item(item).replicate {
            return Ok(());
        }
        let arg = ArgWithApiOpts::new(key, self.api_opts(item, false));
        self.replicate(item, key, Action::Remove, &arg)
    }

    /// Send one replicator call to the targets of `key`
    pub(crate) fn replicate<A: Serialize + ?Sized>(
        &self,
        item: ItemType,
        key: &str,
        action: Action,
        arg: &A,
    ) -> Result<()> {
        let conns = self.replication_targets(item, key);
        if conns.is_empty() {
            debug!(item = %item, key, "no replication targets");
            return Ok(());
        }

        let conn_mgr = self.conn_mgr.as_ref().ok_or_else(|| {
            ChargeError::Config(format!("{} is replicated but no peers are wired", item))
        })?;
        let method = replicator::method_name(action, item)?;

        match conn_mgr.call_typed::<A, String>(&conns, &method, arg) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(item = %item, key, method = %method, error = %e, "replication failed");
                Err(e)
            }
        }
    }

    /// Namespaced id of an object across item types, e.g. `acc_vdf:broker`
    fn object_id(item: ItemType, key: &str) -> String {
        format!("{}{}", item.prefix(), key)
    }
}
