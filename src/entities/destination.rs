//! Destinations and the derived reverse index

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ChargeError, Result};
use crate::storage::DataDb;

use super::{Entity, ItemType};

/// A named set of dialing prefixes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub prefixes: Vec<String>,
}

impl Destination {
    pub fn new(id: impl Into<String>, prefixes: &[&str]) -> Self {
        Self {
            id: id.into(),
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.prefixes.iter().any(|p| p == prefix)
    }

    /// Longest prefix of this destination matching `number`, if any
    pub fn match_number(&self, number: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .filter(|p| number.starts_with(p.as_str()))
            .max_by_key(|p| p.len())
            .map(|p| p.as_str())
    }

    /// Distinct prefixes, in sorted order
    pub fn prefix_set(&self) -> BTreeSet<&str> {
        self.prefixes.iter().map(|p| p.as_str()).collect()
    }
}

impl Entity for Destination {
    const ITEM: ItemType = ItemType::Destinations;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn as_destination(&self) -> Option<&Destination> {
        Some(self)
    }
}

/// Prefix → destination ids. Never written directly by callers; always
/// derivable from the set of destinations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReverseDestination {
    pub prefix: String,
    /// Sorted, without duplicates
    pub destination_ids: Vec<String>,
}

impl ReverseDestination {
    pub fn new(prefix: impl Into<String>, ids: impl IntoIterator<Item = String>) -> Self {
        let ids: BTreeSet<String> = ids.into_iter().collect();
        Self {
            prefix: prefix.into(),
            destination_ids: ids.into_iter().collect(),
        }
    }
}

impl Entity for ReverseDestination {
    const ITEM: ItemType = ItemType::ReverseDestinations;

    fn key(&self) -> String {
        self.prefix.clone()
    }

    fn load(db: &dyn DataDb, key: &str) -> Result<Self> {
        let ids = db.get_reverse_destination(key)?;
        if ids.is_empty() {
            return Err(ChargeError::NotFound);
        }
        Ok(ReverseDestination::new(key, ids))
    }

    fn store(&self, db: &dyn DataDb) -> Result<()> {
        db.remove_raw(ItemType::ReverseDestinations, &self.prefix)?;
        let prefixes = [self.prefix.clone()];
        for id in &self.destination_ids {
            db.add_reverse_destination(id, &prefixes)?;
        }
        Ok(())
    }
}
