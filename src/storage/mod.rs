//! Storage Module
//!
//! The backend store: durable source of truth behind the cache.
//!
//! ## Responsibilities
//! - Keyed raw-record access per item type
//! - Bulk key iteration for index rebuilds
//! - Reverse destination index primitives
//! - Explicit `NotImplemented` for capabilities a store lacks
//!
//! ## Implementations
//! ```text
//! ┌────────────────────────────────────────┐
//! │ DataDb (capability trait)              │
//! │  every method defaults to              │
//! │  Err(NotImplemented)                   │
//! ├────────────────────┬───────────────────┤
//! │ InternalDb         │ LogDb             │
//! │ per-item RwLock    │ InternalDb state  │
//! │ tables in memory   │ + append journal  │
//! │                    │ replayed on open  │
//! └────────────────────┴───────────────────┘
//! ```

mod internal;
mod log_db;
pub mod marshal;

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, DbType};
use crate::entities::ItemType;
use crate::error::{ChargeError, Result};

pub use internal::InternalDb;
pub use log_db::LogDb;

/// Capability set of a backend store
///
/// A store overrides what it supports; everything else reports
/// `NotImplemented` so callers can tell a structural limitation from a
/// transient failure.
pub trait DataDb: Send + Sync {
    /// Marshaled record stored under `key`; `NotFound` when absent
    fn get_raw(&self, _item: ItemType, _key: &str) -> Result<Vec<u8>> {
        Err(ChargeError::NotImplemented)
    }

    /// Replace the record stored under `key`
    fn set_raw(&self, _item: ItemType, _key: &str, _value: Vec<u8>) -> Result<()> {
        Err(ChargeError::NotImplemented)
    }

    /// Delete a record; deleting a missing key succeeds
    fn remove_raw(&self, _item: ItemType, _key: &str) -> Result<()> {
        Err(ChargeError::NotImplemented)
    }

    /// Keys of `item` starting with `prefix`, sorted
    fn keys(&self, _item: ItemType, _prefix: &str) -> Result<Vec<String>> {
        Err(ChargeError::NotImplemented)
    }

    /// Destination ids indexed under `prefix`; `NotFound` when none
    fn get_reverse_destination(&self, _prefix: &str) -> Result<Vec<String>> {
        Err(ChargeError::NotImplemented)
    }

    /// Add `destination_id` to the entry of every prefix
    fn add_reverse_destination(&self, _destination_id: &str, _prefixes: &[String]) -> Result<()> {
        Err(ChargeError::NotImplemented)
    }

    /// Drop `destination_id` from one prefix entry, deleting the entry
    /// when it becomes empty
    fn remove_reverse_destination(&self, _destination_id: &str, _prefix: &str) -> Result<()> {
        Err(ChargeError::NotImplemented)
    }

    /// Drop every record
    fn flush_all(&self) -> Result<()> {
        Err(ChargeError::NotImplemented)
    }
}

/// Open the backend store the config selects
pub fn open(config: &Config) -> Result<Arc<dyn DataDb>> {
    match config.data_db.db_type {
        DbType::Internal => {
            info!(db_type = "*internal", "opening backend store");
            Ok(Arc::new(InternalDb::new()))
        }
        DbType::Log => {
            info!(
                db_type = "*log",
                path = %config.data_db.db_path.display(),
                "opening backend store"
            );
            let db = LogDb::open(&config.data_db.db_path, config.data_db.wal_sync_strategy)?;
            Ok(Arc::new(db))
        }
    }
}
