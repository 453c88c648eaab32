//! Configuration for chargestore
//!
//! Centralized configuration with sensible defaults. Every section can be
//! loaded from JSON; missing fields fall back to their defaults.
//!
//! ```text
//! Config
//!   ├── general     node identity, default tenant, reply timeout
//!   ├── data_db     backend selection, read/write peers, per-item policies
//!   ├── rpc_conns   conn id → peer addresses + pool size
//!   └── listen      replicator endpoint of this node
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entities::ItemType;
use crate::error::{ChargeError, Result};

/// Transaction id meaning "apply immediately"
pub const NON_TRANSACTIONAL: &str = "";

/// Policy applied to item types without an explicit entry
pub static DEFAULT_ITEM_OPT: ItemOpt = ItemOpt {
    limit: None,
    ttl_ms: None,
    remote: false,
    replicate: false,
    api_key: None,
    route_id: None,
    store_remote: true,
    remote_conns: None,
    replication_conns: None,
};

/// Main configuration for a chargestore node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub data_db: DataDbConfig,
    /// Logical connection id → peer pool definition
    pub rpc_conns: HashMap<String, RpcConnConfig>,
    pub listen: ListenConfig,
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Identity of this node in logs
    pub node_id: String,

    /// Tenant used by callers that do not name one
    pub default_tenant: String,

    /// Budget for one remote call, covering pool borrow and invocation
    pub reply_timeout_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            node_id: "chargestore-1".to_string(),
            default_tenant: "chargestore.org".to_string(),
            reply_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataDbConfig {
    // -------------------------------------------------------------------------
    // Backend Store
    // -------------------------------------------------------------------------
    pub db_type: DbType,

    /// Root directory for the journal (`*log` backend only)
    ///   {db_path}/
    ///     └── data.wal
    pub db_path: PathBuf,

    /// How often to fsync the journal
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Peers
    // -------------------------------------------------------------------------
    /// Connections tried, in order, for remote reads
    pub rmt_conns: Vec<String>,

    /// Connections written to on replication
    pub rpl_conns: Vec<String>,

    /// How this node identifies itself to peers it reads from, so they
    /// can replicate back to it
    pub rmt_conn_id: Option<String>,

    /// Replicate only to peers that read the object from us
    pub rpl_filtered: bool,

    /// Per item type policies
    pub items: HashMap<ItemType, ItemOpt>,
}

impl Default for DataDbConfig {
    fn default() -> Self {
        Self {
            db_type: DbType::Internal,
            db_path: PathBuf::from("./chargestore_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            rmt_conns: Vec::new(),
            rpl_conns: Vec::new(),
            rmt_conn_id: None,
            rpl_filtered: false,
            items: HashMap::new(),
        }
    }
}

/// Backend store implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DbType {
    /// Memory only
    #[default]
    #[serde(rename = "*internal")]
    Internal,

    /// Memory state rebuilt from an on-disk journal
    #[serde(rename = "*log")]
    Log,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Caching, remote-read and replication policy of one item type
///
/// Remote reads and replication are independent: each has its own flag and
/// its own optional connection list overriding the global one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemOpt {
    /// Cache capacity; `None` unbounded, `Some(0)` never stores values
    pub limit: Option<usize>,

    /// Cache entry lifetime
    pub ttl_ms: Option<u64>,

    /// Fall back to a peer on local miss
    pub remote: bool,

    /// Push local writes to peers
    pub replicate: bool,

    pub api_key: Option<String>,
    pub route_id: Option<String>,

    /// Persist a successful remote read into the local backend
    pub store_remote: bool,

    pub remote_conns: Option<Vec<String>>,
    pub replication_conns: Option<Vec<String>>,
}

impl Default for ItemOpt {
    fn default() -> Self {
        DEFAULT_ITEM_OPT.clone()
    }
}

impl ItemOpt {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    pub fn remote(mut self) -> Self {
        self.remote = true;
        self
    }

    pub fn replicated(mut self) -> Self {
        self.replicate = true;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_route_id(mut self, route: impl Into<String>) -> Self {
        self.route_id = Some(route.into());
        self
    }

    pub fn store_remote(mut self, store: bool) -> Self {
        self.store_remote = store;
        self
    }

    pub fn with_remote_conns(mut self, conns: &[&str]) -> Self {
        self.remote_conns = Some(conns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_replication_conns(mut self, conns: &[&str]) -> Self {
        self.replication_conns = Some(conns.iter().map(|c| c.to_string()).collect());
        self
    }
}

/// A pool of handles to one peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConnConfig {
    /// Peer replicator addresses; each gets `pool_size` handles
    pub addresses: Vec<String>,
    pub pool_size: usize,
}

impl Default for RpcConnConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            pool_size: 4,
        }
    }
}

impl RpcConnConfig {
    pub fn new(addresses: &[&str]) -> Self {
        Self {
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// TCP listen address of the replicator endpoint
    pub rpc_addr: String,

    /// Max queued client connections
    pub max_connections: usize,

    /// Connection handler threads
    pub workers: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            rpc_addr: "127.0.0.1:2012".to_string(),
            max_connections: 1024,
            workers: 8,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

// =============================================================================
// Config API
// =============================================================================

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Policy of an item type (the defaults when not configured)
    pub fn item(&self, item: ItemType) -> &ItemOpt {
        self.data_db.items.get(&item).unwrap_or(&DEFAULT_ITEM_OPT)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.general.reply_timeout_ms)
    }

    /// Connections used to read `item` from peers
    pub fn remote_conns(&self, item: ItemType) -> &[String] {
        self.item(item)
            .remote_conns
            .as_deref()
            .unwrap_or(&self.data_db.rmt_conns)
    }

    /// Connections `item` is replicated to
    pub fn replication_conns(&self, item: ItemType) -> &[String] {
        self.item(item)
            .replication_conns
            .as_deref()
            .unwrap_or(&self.data_db.rpl_conns)
    }

    /// Check that every referenced connection id is defined and timeouts
    /// are usable
    pub fn validate(&self) -> Result<()> {
        if self.general.reply_timeout_ms == 0 {
            return Err(ChargeError::Config(
                "general.reply_timeout_ms must be positive".to_string(),
            ));
        }
        if self.listen.workers == 0 {
            return Err(ChargeError::Config(
                "listen.workers must be positive".to_string(),
            ));
        }

        let mut referenced: Vec<(&str, &String)> = Vec::new();
        referenced.extend(self.data_db.rmt_conns.iter().map(|c| ("data_db.rmt_conns", c)));
        referenced.extend(self.data_db.rpl_conns.iter().map(|c| ("data_db.rpl_conns", c)));
        for opt in self.data_db.items.values() {
            for conns in [&opt.remote_conns, &opt.replication_conns].into_iter().flatten() {
                referenced.extend(conns.iter().map(|c| ("data_db.items", c)));
            }
        }
        for (field, conn_id) in referenced {
            if !self.rpc_conns.contains_key(conn_id) {
                return Err(ChargeError::Config(format!(
                    "{} references undefined connection {}",
                    field, conn_id
                )));
            }
        }

        for (conn_id, conn) in &self.rpc_conns {
            if conn.addresses.is_empty() {
                return Err(ChargeError::Config(format!(
                    "rpc_conns.{} has no addresses",
                    conn_id
                )));
            }
            if conn.pool_size == 0 {
                return Err(ChargeError::Config(format!(
                    "rpc_conns.{}.pool_size must be positive",
                    conn_id
                )));
            }
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn node_id(mut self, id: impl Into<String>) -> Self {
        self.config.general.node_id = id.into();
        self
    }

    pub fn default_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.config.general.default_tenant = tenant.into();
        self
    }

    pub fn reply_timeout_ms(mut self, ms: u64) -> Self {
        self.config.general.reply_timeout_ms = ms;
        self
    }

    pub fn db_type(mut self, db_type: DbType) -> Self {
        self.config.data_db.db_type = db_type;
        self
    }

    /// Set the data directory (root for the journal)
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_db.db_path = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.data_db.wal_sync_strategy = strategy;
        self
    }

    pub fn rmt_conns(mut self, conns: &[&str]) -> Self {
        self.config.data_db.rmt_conns = conns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn rpl_conns(mut self, conns: &[&str]) -> Self {
        self.config.data_db.rpl_conns = conns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn rmt_conn_id(mut self, id: impl Into<String>) -> Self {
        self.config.data_db.rmt_conn_id = Some(id.into());
        self
    }

    pub fn rpl_filtered(mut self, filtered: bool) -> Self {
        self.config.data_db.rpl_filtered = filtered;
        self
    }

    /// Set the policy of one item type
    pub fn item(mut self, item: ItemType, opt: ItemOpt) -> Self {
        self.config.data_db.items.insert(item, opt);
        self
    }

    /// Define a peer connection
    pub fn rpc_conn(mut self, id: impl Into<String>, conn: RpcConnConfig) -> Self {
        self.config.rpc_conns.insert(id.into(), conn);
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen.rpc_addr = addr.into();
        self
    }

    /// Set the maximum number of queued connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.listen.max_connections = count;
        self
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.config.listen.workers = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.listen.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.listen.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
