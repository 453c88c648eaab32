//! Journal-backed backend store
//!
//! Keeps the same in-memory tables as [`InternalDb`] and appends every
//! mutation to a write-ahead log before applying it. Opening replays the
//! log; a torn tail left by a crash is truncated.
//!
//! ```text
//! set_raw / remove_raw / reverse ops
//!        │
//!        ▼
//!   ┌─────────┐  append   ┌──────────┐
//!   │  Mutex  │ ────────▶ │ data.wal │
//!   │ (wal)   │           └──────────┘
//!   └────┬────┘
//!        │ apply (same critical section)
//!        ▼
//!   ┌────────────┐
//!   │ InternalDb │
//!   └────────────┘
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::WalSyncStrategy;
use crate::entities::ItemType;
use crate::error::{ChargeError, Result};
use crate::wal::{Operation, WalRecovery, WalWriter};

use super::{DataDb, InternalDb};

/// Durable backend store
pub struct LogDb {
    dir: PathBuf,
    state: InternalDb,
    /// Serializes journal appends with their application to `state`
    wal: Mutex<WalWriter>,
    sync_strategy: WalSyncStrategy,
}

impl LogDb {
    const WAL_FILENAME: &'static str = "data.wal";
    const COMPACT_FILENAME: &'static str = "data.wal.compact";

    /// Open or create a store rooted at `dir`
    ///
    /// On startup:
    /// 1. Create the directory if it doesn't exist
    /// 2. Recover the journal, truncating a partial tail
    /// 3. Replay recovered entries into memory
    pub fn open(dir: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let wal_path = dir.join(Self::WAL_FILENAME);
        let state = InternalDb::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;
            if recovery.was_truncated {
                warn!(
                    path = %wal_path.display(),
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "journal tail truncated during recovery"
                );
            }
            for entry in &entries {
                if let Err(e) = state.apply(&entry.operation) {
                    warn!(lsn = entry.lsn, error = %e, "skipping unreplayable journal entry");
                }
            }
            info!(
                path = %wal_path.display(),
                entries = recovery.entries_recovered,
                last_lsn = recovery.last_lsn,
                "journal replayed"
            );
        }

        let wal = WalWriter::open(&wal_path, sync_strategy)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            state,
            wal: Mutex::new(wal),
            sync_strategy,
        })
    }

    /// Rewrite the journal from the live state, dropping superseded entries
    ///
    /// Returns the number of entries in the new journal.
    pub fn compact(&self) -> Result<usize> {
        let mut wal = self.wal.lock();
        wal.sync()?;

        let ops = self.state.snapshot();
        let compact_path = self.dir.join(Self::COMPACT_FILENAME);
        {
            let mut fresh = WalWriter::create(&compact_path, WalSyncStrategy::EveryNEntries {
                count: usize::MAX,
            })?;
            for op in &ops {
                fresh.append(op.clone())?;
            }
            fresh.sync()?;
        }

        fs::rename(&compact_path, self.wal_path())?;
        *wal = WalWriter::open(&self.wal_path(), self.sync_strategy)?;

        info!(entries = ops.len(), "journal compacted");
        Ok(ops.len())
    }

    /// Force buffered journal entries to disk
    pub fn sync(&self) -> Result<()> {
        self.wal.lock().sync()
    }

    pub fn wal_path(&self) -> PathBuf {
        self.dir.join(Self::WAL_FILENAME)
    }

    /// The in-memory tables behind the journal
    pub fn state(&self) -> &InternalDb {
        &self.state
    }

    fn log(&self, operation: Operation) -> Result<()> {
        let mut wal = self.wal.lock();
        wal.append(operation.clone())?;
        self.state.apply(&operation)
    }

    fn check_stored(item: ItemType) -> Result<()> {
        if item.is_persistent() {
            Ok(())
        } else {
            Err(ChargeError::InvalidKey(format!(
                "{} is not stored in the backend",
                item
            )))
        }
    }
}

impl DataDb for LogDb {
    fn get_raw(&self, item: ItemType, key: &str) -> Result<Vec<u8>> {
        self.state.get_raw(item, key)
    }

    fn set_raw(&self, item: ItemType, key: &str, value: Vec<u8>) -> Result<()> {
        Self::check_stored(item)?;
        self.log(Operation::SetItem {
            item,
            key: key.to_string(),
            value,
        })
    }

    fn remove_raw(&self, item: ItemType, key: &str) -> Result<()> {
        Self::check_stored(item)?;
        self.log(Operation::RemoveItem {
            item,
            key: key.to_string(),
        })
    }

    fn keys(&self, item: ItemType, prefix: &str) -> Result<Vec<String>> {
        self.state.keys(item, prefix)
    }

    fn get_reverse_destination(&self, prefix: &str) -> Result<Vec<String>> {
        self.state.get_reverse_destination(prefix)
    }

    fn add_reverse_destination(&self, destination_id: &str, prefixes: &[String]) -> Result<()> {
        self.log(Operation::AddReverse {
            destination_id: destination_id.to_string(),
            prefixes: prefixes.to_vec(),
        })
    }

    fn remove_reverse_destination(&self, destination_id: &str, prefix: &str) -> Result<()> {
        self.log(Operation::RemoveReverse {
            destination_id: destination_id.to_string(),
            prefix: prefix.to_string(),
        })
    }

    fn flush_all(&self) -> Result<()> {
        self.log(Operation::Flush)
    }
}
