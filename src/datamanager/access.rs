//! Generic read/write paths shared by every item type

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::CachedValue;
use crate::config::NON_TRANSACTIONAL;
use crate::entities::{
    Account, ActionProfile, ActionTriggers, Destination, Entity, Filter, ItemType, RatingProfile,
    ReverseDestination, StatQueue, StatQueueProfile, Threshold, ThresholdProfile, Timing,
};
use crate::error::{ChargeError, Result};
use crate::replicator::{self, Action, ArgWithApiOpts};
use crate::storage::DataDb;

use super::{DataManager, GetOptions};

impl DataManager {
    // =========================================================================
    // Read Path
    // =========================================================================

    /// Read a record: cache, then backend store, then (remote item types)
    /// a peer
    pub fn get_entity<T: Entity>(&self, key: &str, opts: &GetOptions) -> Result<Arc<T>> {
        let item = T::ITEM;
        if opts.cache_read {
            if let Some(cached) = self.cache.get_as::<T>(item, key) {
                return cached.ok_or(ChargeError::NotFound);
            }
        }

        let db = self.data_db()?;
        match T::load(db.as_ref(), key) {
            Ok(value) => {
                let value = Arc::new(value);
                self.cache_result(item, key, Some(Arc::clone(&value)), opts);
                return Ok(value);
            }
            Err(ChargeError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let item_opt = self.config.item(item);
        if item_opt.remote {
            match self.get_remote::<T>(key) {
                Ok(value) => {
                    debug!(item = %item, key, "served from peer");
                    if item_opt.store_remote {
                        self.persist_remote(db.as_ref(), &value, &opts.transaction_id)?;
                    }
                    let value = Arc::new(value);
                    self.cache_result(item, key, Some(Arc::clone(&value)), opts);
                    return Ok(value);
                }
                Err(ChargeError::NotFound) => {}
                Err(e) => return Err(ChargeError::server(e)),
            }
        }

        self.cache_result::<T>(item, key, None, opts);
        Err(ChargeError::NotFound)
    }

    /// Ask the read peers of `T` for `key`
    fn get_remote<T: Entity>(&self, key: &str) -> Result<T> {
        let conn_mgr = self.conn_mgr.as_ref().ok_or_else(|| {
            ChargeError::Config(format!("{} is remote but no peers are wired", T::ITEM))
        })?;
        let method = replicator::method_name(Action::Get, T::ITEM)?;
        let arg = ArgWithApiOpts::new(key.to_string(), self.api_opts(T::ITEM, true));
        conn_mgr.call_typed(self.config.remote_conns(T::ITEM), &method, &arg)
    }

    /// Keep a value served by a peer in the backend store
    fn persist_remote<T: Entity>(
        &self,
        db: &dyn DataDb,
        value: &T,
        transaction_id: &str,
    ) -> Result<()> {
        match value.as_destination() {
            Some(destination) => self.persist_destination(db, destination, transaction_id),
            // derived from local destinations; cached only
            None if T::ITEM == ItemType::ReverseDestinations => Ok(()),
            None => value.store(db),
        }
    }

    fn cache_result<T: Entity>(
        &self,
        item: ItemType,
        key: &str,
        value: Option<Arc<T>>,
        opts: &GetOptions,
    ) {
        if !opts.cache_write {
            return;
        }
        let value = value.map(|v| v as CachedValue);
        self.cache.set(item, key, value, &[], true, &opts.transaction_id);
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Replace a record in the backend store and the cache, then push it
    /// to the replication peers of its item type
    ///
    /// Destinations move the reverse index along; reverse destinations are
    /// derived and rejected with `InvalidKey`.
    pub fn set_entity<T: Entity>(&self, value: T) -> Result<()> {
        self.store_entity(value, NON_TRANSACTIONAL, true)
    }

    /// Remove a record everywhere; removing a missing record succeeds
    pub fn remove_entity<T: Entity>(&self, key: &str) -> Result<()> {
        self.erase_entity::<T>(key, NON_TRANSACTIONAL, true)
    }

    /// `set_entity` with an explicit cache transaction; `fan_out = false`
    /// for writes applied on behalf of a peer
    pub(crate) fn store_entity<T: Entity>(
        &self,
        value: T,
        transaction_id: &str,
        fan_out: bool,
    ) -> Result<()> {
        Self::reject_derived(T::ITEM)?;
        if let Some(destination) = value.as_destination() {
            return self.write_destination(destination.clone(), transaction_id, fan_out);
        }

        let db = self.data_db()?;
        value.store(db.as_ref())?;

        let key = value.key();
        let value = Arc::new(value);
        self.cache.set(
            T::ITEM,
            &key,
            Some(Arc::clone(&value) as CachedValue),
            &[],
            true,
            transaction_id,
        );

        if fan_out {
            self.replicate_set(value.as_ref(), &key)?;
        }
        Ok(())
    }

    pub(crate) fn erase_entity<T: Entity>(
        &self,
        key: &str,
        transaction_id: &str,
        fan_out: bool,
    ) -> Result<()> {
        Self::reject_derived(T::ITEM)?;
        if T::ITEM == ItemType::Destinations {
            return self.delete_destination(key, transaction_id, fan_out);
        }

        let db = self.data_db()?;
        T::erase(db.as_ref(), key)?;
        self.cache.remove(T::ITEM, key, transaction_id);

        if fan_out {
            self.replicate_remove(T::ITEM, key)?;
        }
        Ok(())
    }

    fn reject_derived(item: ItemType) -> Result<()> {
        if item == ItemType::ReverseDestinations {
            return Err(ChargeError::InvalidKey(format!(
                "{} is derived from destinations",
                item
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Bulk Helpers
    // =========================================================================

    /// Whether the backend store holds `key` of `item`
    pub fn has_data(&self, item: ItemType, key: &str) -> Result<bool> {
        let db = self.data_db()?;
        match db.get_raw(item, key) {
            Ok(_) => Ok(true),
            Err(ChargeError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Load records of `item` from the backend store into the cache
    ///
    /// `ids = None` loads every key of the item type. Returns the number of
    /// records cached.
    pub fn cache_data_from_db(&self, item: ItemType, ids: Option<&[String]>) -> Result<usize> {
        let count = match item {
            ItemType::Destinations => self.preload::<Destination>(ids),
            ItemType::ReverseDestinations => self.preload::<ReverseDestination>(ids),
            ItemType::Accounts => self.preload::<Account>(ids),
            ItemType::Filters => self.preload::<Filter>(ids),
            ItemType::Thresholds => self.preload::<Threshold>(ids),
            ItemType::ThresholdProfiles => self.preload::<ThresholdProfile>(ids),
            ItemType::StatQueues => self.preload::<StatQueue>(ids),
            ItemType::StatQueueProfiles => self.preload::<StatQueueProfile>(ids),
            ItemType::Timings => self.preload::<Timing>(ids),
            ItemType::ActionTriggers => self.preload::<ActionTriggers>(ids),
            ItemType::RatingProfiles => self.preload::<RatingProfile>(ids),
            ItemType::ActionProfiles => self.preload::<ActionProfile>(ids),
            ItemType::ReplicationHosts => Err(ChargeError::InvalidKey(format!(
                "{} is not stored in the backend",
                item
            ))),
        }?;
        info!(item = %item, records = count, "cache loaded from backend store");
        Ok(count)
    }

    fn preload<T: Entity>(&self, ids: Option<&[String]>) -> Result<usize> {
        let db = self.data_db()?;
        let keys = match ids {
            Some(ids) => ids.to_vec(),
            None => db.keys(T::ITEM, "")?,
        };

        let mut count = 0;
        for key in keys {
            match self.get_entity::<T>(&key, &GetOptions::fresh()) {
                Ok(_) => count += 1,
                Err(ChargeError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }
}
