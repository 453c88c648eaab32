//! In-memory backend store
//!
//! One `RwLock`-protected table per item type plus the reverse destination
//! index. Supports the full capability set.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use crate::entities::{ItemType, ReverseDestination};
use crate::error::{ChargeError, Result};
use crate::wal::Operation;

use super::{marshal, DataDb};

type Table = RwLock<BTreeMap<String, Vec<u8>>>;

/// Memory-only backend store
///
/// ## Concurrency:
/// - One `RwLock` per item type: readers of different types never contend
/// - The reverse index has its own lock; multi-prefix updates hold it once
pub struct InternalDb {
    tables: HashMap<ItemType, Table>,
    /// Prefix → destination ids
    reverse: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl Default for InternalDb {
    fn default() -> Self {
        Self::new()
    }
}

impl InternalDb {
    pub fn new() -> Self {
        let tables = ItemType::ALL
            .iter()
            .filter(|item| item.is_persistent() && **item != ItemType::ReverseDestinations)
            .map(|item| (*item, RwLock::new(BTreeMap::new())))
            .collect();
        Self {
            tables,
            reverse: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of records stored for `item`
    pub fn len(&self, item: ItemType) -> usize {
        if item == ItemType::ReverseDestinations {
            return self.reverse.read().len();
        }
        self.tables.get(&item).map(|t| t.read().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.read().is_empty() && self.tables.values().all(|t| t.read().is_empty())
    }

    /// Apply a journaled mutation
    pub(crate) fn apply(&self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::SetItem { item, key, value } => self.set_raw(*item, key, value.clone()),
            Operation::RemoveItem { item, key } => self.remove_raw(*item, key),
            Operation::AddReverse {
                destination_id,
                prefixes,
            } => self.add_reverse_destination(destination_id, prefixes),
            Operation::RemoveReverse {
                destination_id,
                prefix,
            } => self.remove_reverse_destination(destination_id, prefix),
            Operation::Flush => self.flush_all(),
        }
    }

    /// The mutations that rebuild the current state from empty
    pub(crate) fn snapshot(&self) -> Vec<Operation> {
        let mut ops = Vec::new();
        let mut items: Vec<&ItemType> = self.tables.keys().collect();
        items.sort();
        for item in items {
            if let Some(table) = self.tables.get(item) {
                for (key, value) in table.read().iter() {
                    ops.push(Operation::SetItem {
                        item: *item,
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        // Regroup the index by destination so each id is one entry
        let mut by_destination: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (prefix, ids) in self.reverse.read().iter() {
            for id in ids {
                by_destination
                    .entry(id.clone())
                    .or_default()
                    .push(prefix.clone());
            }
        }
        for (destination_id, prefixes) in by_destination {
            ops.push(Operation::AddReverse {
                destination_id,
                prefixes,
            });
        }
        ops
    }

    fn table(&self, item: ItemType) -> Result<&Table> {
        self.tables
            .get(&item)
            .ok_or_else(|| ChargeError::InvalidKey(format!("{} is not stored in the backend", item)))
    }
}

impl DataDb for InternalDb {
    fn get_raw(&self, item: ItemType, key: &str) -> Result<Vec<u8>> {
        if item == ItemType::ReverseDestinations {
            let ids = self.get_reverse_destination(key)?;
            return marshal::encode(&ReverseDestination::new(key, ids));
        }
        self.table(item)?
            .read()
            .get(key)
            .cloned()
            .ok_or(ChargeError::NotFound)
    }

    fn set_raw(&self, item: ItemType, key: &str, value: Vec<u8>) -> Result<()> {
        if item == ItemType::ReverseDestinations {
            let rev: ReverseDestination = marshal::decode(&value)?;
            let mut reverse = self.reverse.write();
            if rev.destination_ids.is_empty() {
                reverse.remove(key);
            } else {
                reverse.insert(key.to_string(), rev.destination_ids.into_iter().collect());
            }
            return Ok(());
        }
        self.table(item)?.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove_raw(&self, item: ItemType, key: &str) -> Result<()> {
        if item == ItemType::ReverseDestinations {
            self.reverse.write().remove(key);
            return Ok(());
        }
        self.table(item)?.write().remove(key);
        Ok(())
    }

    fn keys(&self, item: ItemType, prefix: &str) -> Result<Vec<String>> {
        if item == ItemType::ReverseDestinations {
            return Ok(self
                .reverse
                .read()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect());
        }
        Ok(self
            .table(item)?
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn get_reverse_destination(&self, prefix: &str) -> Result<Vec<String>> {
        self.reverse
            .read()
            .get(prefix)
            .filter(|ids| !ids.is_empty())
            .map(|ids| ids.iter().cloned().collect())
            .ok_or(ChargeError::NotFound)
    }

    fn add_reverse_destination(&self, destination_id: &str, prefixes: &[String]) -> Result<()> {
        let mut reverse = self.reverse.write();
        for prefix in prefixes {
            reverse
                .entry(prefix.clone())
                .or_default()
                .insert(destination_id.to_string());
        }
        Ok(())
    }

    fn remove_reverse_destination(&self, destination_id: &str, prefix: &str) -> Result<()> {
        let mut reverse = self.reverse.write();
        if let Some(ids) = reverse.get_mut(prefix) {
            ids.remove(destination_id);
            if ids.is_empty() {
                reverse.remove(prefix);
            }
        }
        Ok(())
    }

    fn flush_all(&self) -> Result<()> {
        for table in self.tables.values() {
            table.write().clear();
        }
        self.reverse.write().clear();
        Ok(())
    }
}
