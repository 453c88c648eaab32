//! Action profiles

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{concatenated_key, Entity, ItemType};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub id: String,
    /// e.g. `*topup`, `*reset_threshold`
    pub action_type: String,
    pub path: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionProfile {
    pub tenant: String,
    pub id: String,
    pub filter_ids: Vec<String>,
    pub weight: f64,
    /// `*asap` or a recurrence understood by the scheduler
    pub schedule: String,
    /// Target type (`*accounts`, `*thresholds`) → ids
    pub targets: BTreeMap<String, BTreeSet<String>>,
    pub actions: Vec<ActionDefinition>,
}

impl ActionProfile {
    pub fn new(tenant: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            id: id.into(),
            ..Default::default()
        }
    }
}

impl Entity for ActionProfile {
    const ITEM: ItemType = ItemType::ActionProfiles;

    fn key(&self) -> String {
        concatenated_key(&[&self.tenant, &self.id])
    }
}
