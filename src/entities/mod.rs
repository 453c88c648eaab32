//! Entities Module
//!
//! Typed billing records handled by the data manager.
//!
//! ## Responsibilities
//! - Define one value type per item type
//! - Derive the cache/backend key of every record
//! - Marshal records to and from the backend store
//!
//! ## Keys
//! Tenant-scoped records are keyed by `tenant:id`; the rest by a bare id.
//! Two records with the same concatenated key are the same record.

mod item;
mod destination;
mod account;
mod filter;
mod threshold;
mod stats;
mod timing;
mod action_trigger;
mod rating;
mod action_profile;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{marshal, DataDb};

pub use item::ItemType;
pub use destination::{Destination, ReverseDestination};
pub use account::{Account, Balance};
pub use filter::{ActivationInterval, Filter, FilterRule};
pub use threshold::{Threshold, ThresholdProfile};
pub use stats::{MetricKind, SqItem, StatEvent, StatMetric, StatQueue, StatQueueProfile};
pub use timing::Timing;
pub use action_trigger::{ActionTrigger, ActionTriggers, BalanceFilter};
pub use rating::{RatingPlanActivation, RatingProfile};
pub use action_profile::{ActionDefinition, ActionProfile};

/// Separator between the parts of a composite key
pub const KEY_SEPARATOR: char = ':';

/// Join key parts into a composite identity (`tenant:id`)
pub fn concatenated_key(parts: &[&str]) -> String {
    parts.join(":")
}

/// Split a `tenant:id` key at the first separator
pub fn split_tenant_id(key: &str) -> Option<(&str, &str)> {
    key.split_once(KEY_SEPARATOR)
}

/// A tenant-scoped identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId {
    pub tenant: String,
    pub id: String,
}

impl TenantId {
    pub fn new(tenant: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            id: id.into(),
        }
    }

    pub fn key(&self) -> String {
        concatenated_key(&[&self.tenant, &self.id])
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tenant, self.id)
    }
}

/// A record the data manager can cache, persist and replicate
///
/// `load`/`store`/`erase` default to plain keyed records in the item type's
/// backend table; records with derived storage (reverse destinations)
/// override them.
pub trait Entity:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// The partition/table this record lives in
    const ITEM: ItemType;

    /// Cache and backend key of this record
    fn key(&self) -> String;

    /// Read a record from the backend store
    fn load(db: &dyn DataDb, key: &str) -> Result<Self> {
        let bytes = db.get_raw(Self::ITEM, key)?;
        marshal::decode(&bytes)
    }

    /// Write (replace) this record in the backend store
    fn store(&self, db: &dyn DataDb) -> Result<()> {
        db.set_raw(Self::ITEM, &self.key(), marshal::encode(self)?)
    }

    /// Remove a record from the backend store
    fn erase(db: &dyn DataDb, key: &str) -> Result<()> {
        db.remove_raw(Self::ITEM, key)
    }

    /// The record as a destination; writes of destinations also move the
    /// reverse index
    fn as_destination(&self) -> Option<&Destination> {
        None
    }
}
