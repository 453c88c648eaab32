//! One item type's slice of the cache
//!
//! LRU bookkeeping uses a monotonically increasing tick per access:
//! `entries` maps key → (value, tick) and `recency` maps tick → key, so the
//! least recently used entry is the first key of `recency`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use super::{CacheStats, CachedItem};

struct Entry {
    value: CachedItem,
    tick: u64,
    expires_at: Option<Instant>,
}

pub(crate) struct Partition {
    /// `None` unbounded, `Some(0)` stores no values
    limit: Option<usize>,
    ttl: Option<Duration>,
    entries: HashMap<String, Entry>,
    recency: BTreeMap<u64, String>,
    /// Group → member keys
    groups: HashMap<String, HashSet<String>>,
    /// Key → groups it belongs to
    memberships: HashMap<String, HashSet<String>>,
    next_tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Partition {
    pub(crate) fn new(limit: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            limit,
            ttl,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            groups: HashMap::new(),
            memberships: HashMap::new(),
            next_tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub(crate) fn get(&mut self, key: &str) -> Option<CachedItem> {
        if self.is_expired(key) {
            self.remove(key);
        }

        let tick = self.bump();
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.recency.remove(&entry.tick);
                entry.tick = tick;
                self.recency.insert(tick, key.to_string());
                self.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Like `get` without touching recency or counters
    pub(crate) fn peek(&self, key: &str) -> Option<CachedItem> {
        if self.is_expired(key) {
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub(crate) fn set(&mut self, key: &str, value: CachedItem, groups: &[String], cache_write: bool) {
        for group in groups {
            self.groups
                .entry(group.clone())
                .or_default()
                .insert(key.to_string());
            self.memberships
                .entry(key.to_string())
                .or_default()
                .insert(group.clone());
        }

        if !cache_write || self.limit == Some(0) {
            return;
        }

        let tick = self.bump();
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        if let Some(old) = self.entries.insert(
            key.to_string(),
            Entry {
                value,
                tick,
                expires_at,
            },
        ) {
            self.recency.remove(&old.tick);
        }
        self.recency.insert(tick, key.to_string());

        if let Some(limit) = self.limit {
            while self.entries.len() > limit {
                let Some((_, oldest)) = self.recency.pop_first() else {
                    break;
                };
                self.entries.remove(&oldest);
                self.drop_memberships(&oldest);
                self.evictions += 1;
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.tick);
        }
        self.drop_memberships(key);
    }

    /// Remove every member of `group`
    pub(crate) fn remove_group(&mut self, group: &str) {
        if let Some(keys) = self.groups.remove(group) {
            for key in keys {
                self.remove(&key);
            }
        }
    }

    /// Member keys of `group`, sorted
    pub(crate) fn group_item_ids(&self, group: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .groups
            .get(group)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub(crate) fn has_group(&self, group: &str) -> bool {
        self.groups.get(group).map(|g| !g.is_empty()).unwrap_or(false)
    }

    /// Keys holding a value and starting with `prefix`, sorted
    pub(crate) fn item_ids(&self, prefix: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.groups.clear();
        self.memberships.clear();
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            items: self.entries.len(),
            groups: self.groups.len(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn is_expired(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| Instant::now() >= at)
            .unwrap_or(false)
    }

    fn drop_memberships(&mut self, key: &str) {
        if let Some(groups) = self.memberships.remove(key) {
            for group in groups {
                if let Some(members) = self.groups.get_mut(&group) {
                    members.remove(key);
                    if members.is_empty() {
                        self.groups.remove(&group);
                    }
                }
            }
        }
    }
}
