//! Destinations and the reverse destination index
//!
//! The index maps each dialing prefix to the destinations that own it and
//! is always derivable from the destination records. Every write to it is
//! a read-modify-write of one prefix entry, done under that prefix's
//! stripe. Destination writes and the rebuild first take the destination's
//! stripe, so neither can interleave with another writer's diff.
//!
//! ```text
//! set_destination(nat: [0256, 0723])     previous nat: [0256, 0257]
//!   0257  ── remove "nat" (entry dropped when empty)
//!   0723  ── add "nat"
//!   0256  ── unchanged
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::cache::CachedValue;
use crate::entities::{Destination, Entity, ItemType, ReverseDestination};
use crate::error::{ChargeError, Result};
use crate::replicator::{Action, ArgWithApiOpts};
use crate::storage::DataDb;

use super::{DataManager, GetOptions};

impl DataManager {
    // =========================================================================
    // Destinations
    // =========================================================================

    pub fn get_destination(&self, id: &str, opts: &GetOptions) -> Result<Arc<Destination>> {
        self.get_entity(id, opts)
    }

    /// Replace a destination and move the reverse index to its new prefixes
    pub fn set_destination(&self, destination: Destination, transaction_id: &str) -> Result<()> {
        self.write_destination(destination, transaction_id, true)
    }

    /// Remove a destination and drop it from every prefix it owned
    pub fn remove_destination(&self, id: &str, transaction_id: &str) -> Result<()> {
        self.delete_destination(id, transaction_id, true)
    }

    pub(crate) fn write_destination(
        &self,
        destination: Destination,
        transaction_id: &str,
        fan_out: bool,
    ) -> Result<()> {
        let db = self.data_db()?;
        self.persist_destination(db.as_ref(), &destination, transaction_id)?;

        let key = destination.key();
        let destination = Arc::new(destination);
        self.cache.set(
            ItemType::Destinations,
            &key,
            Some(Arc::clone(&destination) as CachedValue),
            &[],
            true,
            transaction_id,
        );

        if fan_out {
            self.replicate_set(destination.as_ref(), &key)?;
        }
        Ok(())
    }

    /// Store a destination and move the reverse index from its previous
    /// version, under the destination's stripe
    pub(crate) fn persist_destination(
        &self,
        db: &dyn DataDb,
        destination: &Destination,
        transaction_id: &str,
    ) -> Result<()> {
        let _guard = self.destination_locks.lock(&destination.id);
        let previous = Self::load_optional(db, &destination.id)?;
        destination.store(db)?;
        self.diff_reverse(db, previous.as_ref(), Some(destination), transaction_id)
    }

    pub(crate) fn delete_destination(
        &self,
        id: &str,
        transaction_id: &str,
        fan_out: bool,
    ) -> Result<()> {
        let db = self.data_db()?;
        let _guard = self.destination_locks.lock(id);

        let previous = Self::load_optional(db.as_ref(), id)?;
        Destination::erase(db.as_ref(), id)?;
        self.diff_reverse(db.as_ref(), previous.as_ref(), None, transaction_id)?;
        self.cache.remove(ItemType::Destinations, id, transaction_id);

        if fan_out {
            self.replicate_remove(ItemType::Destinations, id)?;
        }
        Ok(())
    }

    // =========================================================================
    // Reverse Index
    // =========================================================================

    pub fn get_reverse_destination(
        &self,
        prefix: &str,
        opts: &GetOptions,
    ) -> Result<Arc<ReverseDestination>> {
        self.get_entity(prefix, opts)
    }

    /// Index `destination_id` under every prefix
    pub fn set_reverse_destination(
        &self,
        destination_id: &str,
        prefixes: &[String],
        transaction_id: &str,
    ) -> Result<()> {
        self.add_reverse_destination(destination_id, prefixes, transaction_id, true)
    }

    /// Move the index from `old` to `new`: prefixes only `old` owned lose
    /// its id, prefixes only `new` owns gain it. Either side may be absent.
    pub fn update_reverse_destination(
        &self,
        old: Option<&Destination>,
        new: Option<&Destination>,
        transaction_id: &str,
    ) -> Result<()> {
        let db = self.data_db()?;
        self.diff_reverse(db.as_ref(), old, new, transaction_id)
    }

    /// Regenerate the reverse destination index from the destination
    /// records
    ///
    /// Needs key iteration from the backend store; a store without it
    /// fails with `NotImplemented` before anything is touched.
    pub fn rebuild_reverse_for_prefix(&self, item: ItemType) -> Result<()> {
        if item != ItemType::ReverseDestinations {
            return Err(ChargeError::InvalidKey(format!(
                "no reverse index for {}",
                item
            )));
        }
        let db = self.data_db()?;

        let stale = db.keys(ItemType::ReverseDestinations, "")?;
        for prefix in &stale {
            let _guard = self.prefix_locks.lock(prefix);
            db.remove_raw(ItemType::ReverseDestinations, prefix)?;
        }

        // Listed after the wipe: a destination stored during it is either
        // listed here or indexes itself
        let destination_ids = db.keys(ItemType::Destinations, "")?;
        let mut indexed = 0;
        for id in &destination_ids {
            let _destination_guard = self.destination_locks.lock(id);
            let destination = match Destination::load(db.as_ref(), id) {
                Ok(destination) => destination,
                Err(ChargeError::NotFound) => continue,
                Err(e) => return Err(e),
            };
            for prefix in destination.prefix_set() {
                let _guard = self.prefix_locks.lock(prefix);
                db.add_reverse_destination(&destination.id, &[prefix.to_string()])?;
                indexed += 1;
            }
        }

        self.cache.clear(Some(&[ItemType::ReverseDestinations][..]));
        info!(
            destinations = destination_ids.len(),
            stale_prefixes = stale.len(),
            indexed_prefixes = indexed,
            "reverse destination index rebuilt"
        );
        Ok(())
    }

    pub(crate) fn add_reverse_destination(
        &self,
        destination_id: &str,
        prefixes: &[String],
        transaction_id: &str,
        fan_out: bool,
    ) -> Result<()> {
        let db = self.data_db()?;
        for prefix in prefixes.iter().collect::<BTreeSet<_>>() {
            let _guard = self.prefix_locks.lock(prefix);
            db.add_reverse_destination(destination_id, std::slice::from_ref(prefix))?;
            self.cache.remove(ItemType::ReverseDestinations, prefix, transaction_id);
        }

        if fan_out {
            self.replicate_reverse(Action::Set, destination_id, prefixes)?;
        }
        Ok(())
    }

    pub(crate) fn drop_reverse_destination(
        &self,
        destination_id: &str,
        prefixes: &[String],
        transaction_id: &str,
        fan_out: bool,
    ) -> Result<()> {
        let db = self.data_db()?;
        for prefix in prefixes.iter().collect::<BTreeSet<_>>() {
            let _guard = self.prefix_locks.lock(prefix);
            db.remove_reverse_destination(destination_id, prefix)?;
            self.cache.remove(ItemType::ReverseDestinations, prefix, transaction_id);
        }

        if fan_out {
            self.replicate_reverse(Action::Remove, destination_id, prefixes)?;
        }
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Apply the prefix difference between two versions of a destination
    fn diff_reverse(
        &self,
        db: &dyn DataDb,
        old: Option<&Destination>,
        new: Option<&Destination>,
        transaction_id: &str,
    ) -> Result<()> {
        let old_prefixes: BTreeSet<&str> = old.map(|d| d.prefix_set()).unwrap_or_default();
        let new_prefixes: BTreeSet<&str> = new.map(|d| d.prefix_set()).unwrap_or_default();

        if let Some(old) = old {
            for prefix in &old_prefixes {
                let moved_owner = new.map(|n| n.id != old.id).unwrap_or(false);
                if new_prefixes.contains(prefix) && !moved_owner {
                    continue;
                }
                let _guard = self.prefix_locks.lock(prefix);
                db.remove_reverse_destination(&old.id, prefix)?;
                self.cache.remove(ItemType::ReverseDestinations, prefix, transaction_id);
            }
        }

        if let Some(new) = new {
            let unchanged_owner = old.map(|o| o.id == new.id).unwrap_or(false);
            for prefix in &new_prefixes {
                if old_prefixes.contains(prefix) && unchanged_owner {
                    continue;
                }
                let _guard = self.prefix_locks.lock(prefix);
                db.add_reverse_destination(&new.id, &[prefix.to_string()])?;
                self.cache.remove(ItemType::ReverseDestinations, prefix, transaction_id);
            }
        }
        Ok(())
    }

    fn replicate_reverse(
        &self,
        action: Action,
        destination_id: &str,
        prefixes: &[String],
    ) -> Result<()> {
        let item = ItemType::ReverseDestinations;
        if !self.config.item(item).replicate {
            return Ok(());
        }
        let destination = Destination {
            id: destination_id.to_string(),
            prefixes: prefixes.to_vec(),
        };
        let arg = ArgWithApiOpts::new(&destination, self.api_opts(item, false));
        self.replicate(item, destination_id, action, &arg)
    }

    fn load_optional(db: &dyn DataDb, id: &str) -> Result<Option<Destination>> {
        match Destination::load(db, id) {
            Ok(destination) => Ok(Some(destination)),
            Err(ChargeError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
