//! Cache Module
//!
//! In-process cache in front of the backend store. Knows nothing about the
//! backend or the network.
//!
//! ## Responsibilities
//! - One bounded LRU partition per item type, each with its own lock
//! - Negative entries ("known absent") alongside values
//! - Group membership without occupying a value slot
//! - Transactions: buffered operations applied together on commit
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Cache                                                │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐  │
//! │  │*destinations │ │  *accounts   │ │     ...      │  │
//! │  │ Mutex<LRU>   │ │ Mutex<LRU>   │ │ Mutex<LRU>   │  │
//! │  └──────────────┘ └──────────────┘ └──────────────┘  │
//! │  transactions: Mutex<tx id → buffered ops>           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Values
//! `get` returns `None` on a miss, `Some(None)` for a cached negative answer
//! and `Some(Some(v))` for a hit. Values are type-erased `Arc`s; callers
//! downcast them with [`Cache::get_as`].

mod partition;

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::config::{Config, NON_TRANSACTIONAL};
use crate::entities::ItemType;
use crate::error::{ChargeError, Result};

use partition::Partition;

/// A type-erased cached value
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// `None` is a cached negative answer
pub type CachedItem = Option<CachedValue>;

/// Counters of one partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub items: usize,
    pub groups: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Operation buffered inside a transaction
enum TxOp {
    Set {
        item: ItemType,
        key: String,
        value: CachedItem,
        groups: Vec<String>,
        cache_write: bool,
    },
    Remove {
        item: ItemType,
        key: String,
    },
    RemoveGroup {
        item: ItemType,
        group: String,
    },
}

impl TxOp {
    fn item(&self) -> ItemType {
        match self {
            TxOp::Set { item, .. } | TxOp::Remove { item, .. } | TxOp::RemoveGroup { item, .. } => {
                *item
            }
        }
    }
}

/// The in-process cache
///
/// ## Concurrency:
/// - Each partition has its own `Mutex`; item types never contend
/// - A commit locks the partitions it touches in `ItemType` order
pub struct Cache {
    partitions: HashMap<ItemType, Mutex<Partition>>,
    transactions: Mutex<HashMap<String, Vec<TxOp>>>,
    next_tx_id: AtomicU64,
}

impl Default for Cache {
    /// Unbounded partitions without TTL
    fn default() -> Self {
        Self::with_limits(|_| (None, None))
    }
}

impl Cache {
    /// Partitions sized from the per-item policies of `config`
    pub fn new(config: &Config) -> Self {
        Self::with_limits(|item| {
            let opt = config.item(item);
            (opt.limit, opt.ttl_ms.map(Duration::from_millis))
        })
    }

    /// Partitions sized by `limits(item) -> (capacity, ttl)`
    pub fn with_limits(limits: impl Fn(ItemType) -> (Option<usize>, Option<Duration>)) -> Self {
        let partitions = ItemType::ALL
            .iter()
            .map(|item| {
                let (limit, ttl) = limits(*item);
                (*item, Mutex::new(Partition::new(limit, ttl)))
            })
            .collect();
        Self {
            partitions,
            transactions: Mutex::new(HashMap::new()),
            next_tx_id: AtomicU64::new(1),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get(&self, item: ItemType, key: &str) -> Option<CachedItem> {
        self.partition(item).get(key)
    }

    /// `get` with the value downcast to `T`; a value of another type is
    /// reported as a miss
    pub fn get_as<T: Any + Send + Sync>(&self, item: ItemType, key: &str) -> Option<Option<Arc<T>>> {
        match self.get(item, key)? {
            None => Some(None),
            Some(value) => value.downcast::<T>().ok().map(Some),
        }
    }

    /// Whether `key` has an entry (value or negative), without counting a
    /// hit or refreshing recency
    pub fn has_item(&self, item: ItemType, key: &str) -> bool {
        self.partition(item).peek(key).is_some()
    }

    pub fn group_item_ids(&self, item: ItemType, group: &str) -> Vec<String> {
        self.partition(item).group_item_ids(group)
    }

    pub fn has_group(&self, item: ItemType, group: &str) -> bool {
        self.partition(item).has_group(group)
    }

    /// Keys of `item` holding an entry, filtered by key prefix
    pub fn item_ids(&self, item: ItemType, prefix: &str) -> Vec<String> {
        self.partition(item).item_ids(prefix)
    }

    pub fn stats(&self, item: ItemType) -> CacheStats {
        self.partition(item).stats()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Cache `value` under `key`, adding it to `groups`
    ///
    /// With `cache_write = false` only group membership is recorded. A
    /// non-empty `transaction_id` of an open transaction buffers the
    /// operation until commit; unknown ids apply immediately.
    pub fn set(
        &self,
        item: ItemType,
        key: &str,
        value: CachedItem,
        groups: &[String],
        cache_write: bool,
        transaction_id: &str,
    ) {
        let op = TxOp::Set {
            item,
            key: key.to_string(),
            value,
            groups: groups.to_vec(),
            cache_write,
        };
        if let Some(op) = self.buffer(transaction_id, op) {
            self.apply_now(op);
        }
    }

    pub fn remove(&self, item: ItemType, key: &str, transaction_id: &str) {
        let op = TxOp::Remove {
            item,
            key: key.to_string(),
        };
        if let Some(op) = self.buffer(transaction_id, op) {
            self.apply_now(op);
        }
    }

    /// Remove every member of `group`
    pub fn remove_group(&self, item: ItemType, group: &str, transaction_id: &str) {
        let op = TxOp::RemoveGroup {
            item,
            group: group.to_string(),
        };
        if let Some(op) = self.buffer(transaction_id, op) {
            self.apply_now(op);
        }
    }

    /// Empty the given partitions, or all of them
    pub fn clear(&self, items: Option<&[ItemType]>) {
        let items = items.unwrap_or(&ItemType::ALL);
        for item in items {
            self.partition(*item).clear();
        }
        debug!(partitions = items.len(), "cache cleared");
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub fn begin_transaction(&self) -> String {
        let id = format!("tx-{}", self.next_tx_id.fetch_add(1, Ordering::SeqCst));
        self.transactions.lock().insert(id.clone(), Vec::new());
        id
    }

    /// Apply the buffered operations of `transaction_id` in order
    pub fn commit_transaction(&self, transaction_id: &str) -> Result<()> {
        let ops = self
            .transactions
            .lock()
            .remove(transaction_id)
            .ok_or_else(|| ChargeError::InvalidKey(format!("unknown transaction {}", transaction_id)))?;

        let touched: BTreeSet<ItemType> = ops.iter().map(TxOp::item).collect();
        let mut guards: BTreeMap<ItemType, MutexGuard<'_, Partition>> = BTreeMap::new();
        for item in touched {
            guards.insert(item, self.partition(item));
        }

        let count = ops.len();
        for op in ops {
            if let Some(partition) = guards.get_mut(&op.item()) {
                Self::apply(partition, op);
            }
        }
        debug!(transaction_id, ops = count, "cache transaction committed");
        Ok(())
    }

    /// Discard the buffered operations of `transaction_id`
    pub fn rollback_transaction(&self, transaction_id: &str) {
        self.transactions.lock().remove(transaction_id);
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn partition(&self, item: ItemType) -> MutexGuard<'_, Partition> {
        // Every ItemType gets a partition at construction
        self.partitions[&item].lock()
    }

    /// Queue `op` under an open transaction, or hand it back to be applied
    fn buffer(&self, transaction_id: &str, op: TxOp) -> Option<TxOp> {
        if transaction_id == NON_TRANSACTIONAL {
            return Some(op);
        }
        let mut transactions = self.transactions.lock();
        match transactions.get_mut(transaction_id) {
            Some(ops) => {
                ops.push(op);
                None
            }
            None => Some(op),
        }
    }

    fn apply_now(&self, op: TxOp) {
        let mut partition = self.partition(op.item());
        Self::apply(&mut partition, op);
    }

    fn apply(partition: &mut Partition, op: TxOp) {
        match op {
            TxOp::Set {
                key,
                value,
                groups,
                cache_write,
                ..
            } => partition.set(&key, value, &groups, cache_write),
            TxOp::Remove { key, .. } => partition.remove(&key),
            TxOp::RemoveGroup { group, .. } => partition.remove_group(&group),
        }
    }
}
