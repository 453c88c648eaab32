//! Data Manager Module
//!
//! Orchestrates cache, backend store and peers into one consistency
//! protocol, one Get/Set/Remove per item type.
//!
//! ## Read path
//! ```text
//! get_x(key, opts)
//!   │
//!   ├─ cache_read? ── Cache ── hit ───────────────────▶ Found
//!   │                     └─ negative hit ────────────▶ NotFound
//!   ├─ Backend Store ── found ── cache ───────────────▶ Found
//!   ├─ remote? ── peer Get ── value ── store_remote? ─▶ Found
//!   │                     ├─ NotFound ────────────────▶ NotFound
//!   │                     └─ other error ─────────────▶ Server(cause)
//!   └────────────────────────────────────────────────▶ NotFound
//! ```
//!
//! ## Write path
//! ```text
//! set_x / remove_x
//!   1. backend store   (point of commit; NoDatabaseConn / NotImplemented)
//!   2. cache           (new value / evicted)
//!   3. replicate?      (peer Set/Remove; failure logged, never rolled back)
//! ```

mod access;
mod locks;
mod ops;
mod replication;
mod reverse;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::cache::Cache;
use crate::config::{Config, NON_TRANSACTIONAL};
use crate::connection::ConnManager;
use crate::error::{ChargeError, Result};
use crate::storage::{self, DataDb};

use locks::StripedLocks;

/// Stripes guarding destination and prefix read-modify-write sections
const LOCK_STRIPES: usize = 64;

/// Per-call read options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOptions {
    /// Consult the cache first
    pub cache_read: bool,
    /// Write the result (or a negative entry) back to the cache
    pub cache_write: bool,
    /// Cache transaction the write-back joins
    pub transaction_id: String,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            cache_read: true,
            cache_write: true,
            transaction_id: NON_TRANSACTIONAL.to_string(),
        }
    }
}

impl GetOptions {
    /// Skip the cache read, still refreshing the cache
    pub fn fresh() -> Self {
        Self {
            cache_read: false,
            ..Default::default()
        }
    }

    /// Neither read nor populate the cache
    pub fn uncached() -> Self {
        Self {
            cache_read: false,
            cache_write: false,
            ..Default::default()
        }
    }

    pub fn with_transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = transaction_id.into();
        self
    }
}

/// The data manager
///
/// ## Concurrency:
/// - `data_db`: RwLock around the attached store handle, written only on
///   attach/detach
/// - Cache partitions and connection pools carry their own locks
/// - Destination writes hold a destination stripe, then one prefix stripe
///   at a time
pub struct DataManager {
    data_db: RwLock<Option<Arc<dyn DataDb>>>,
    cache: Arc<Cache>,
    conn_mgr: Option<Arc<ConnManager>>,
    config: Arc<Config>,
    destination_locks: StripedLocks,
    prefix_locks: StripedLocks,
}

impl DataManager {
    /// Create a new data manager builder
    pub fn builder(config: impl Into<Arc<Config>>) -> DataManagerBuilder {
        DataManagerBuilder {
            config: config.into(),
            data_db: None,
            cache: None,
            conn_mgr: None,
        }
    }

    /// Wire a data manager from configuration alone: backend from
    /// `data_db`, cache sized by item policies, TCP pools from `rpc_conns`
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let data_db = storage::open(&config)?;
        let conn_mgr = Arc::new(ConnManager::new(&config)?);
        let dm = Self::builder(config)
            .data_db(data_db)
            .conn_manager(conn_mgr)
            .build();
        info!(node_id = %dm.config.general.node_id, "data manager ready");
        Ok(dm)
    }

    /// The attached backend store
    pub fn data_db(&self) -> Result<Arc<dyn DataDb>> {
        self.data_db.read().clone().ok_or(ChargeError::NoDatabaseConn)
    }

    /// Attach (or swap) the backend store
    pub fn set_data_db(&self, db: Arc<dyn DataDb>) {
        *self.data_db.write() = Some(db);
    }

    /// Detach the backend store; later operations fail with
    /// `NoDatabaseConn`
    pub fn detach_data_db(&self) -> Option<Arc<dyn DataDb>> {
        self.data_db.write().take()
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn conn_manager(&self) -> Option<&Arc<ConnManager>> {
        self.conn_mgr.as_ref()
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }
}

/// Builder for DataManager
pub struct DataManagerBuilder {
    config: Arc<Config>,
    data_db: Option<Arc<dyn DataDb>>,
    cache: Option<Arc<Cache>>,
    conn_mgr: Option<Arc<ConnManager>>,
}

impl DataManagerBuilder {
    pub fn data_db(mut self, db: Arc<dyn DataDb>) -> Self {
        self.data_db = Some(db);
        self
    }

    /// Share an existing cache; by default one is sized from the config
    pub fn cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn conn_manager(mut self, conn_mgr: Arc<ConnManager>) -> Self {
        self.conn_mgr = Some(conn_mgr);
        self
    }

    pub fn build(self) -> DataManager {
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(Cache::new(&self.config)));
        DataManager {
            data_db: RwLock::new(self.data_db),
            cache,
            conn_mgr: self.conn_mgr,
            config: self.config,
            destination_locks: StripedLocks::new(LOCK_STRIPES),
            prefix_locks: StripedLocks::new(LOCK_STRIPES),
        }
    }
}
