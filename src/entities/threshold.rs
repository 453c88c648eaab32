//! Thresholds (runtime state) and threshold profiles (configuration)

use serde::{Deserialize, Serialize};

use super::{concatenated_key, ActivationInterval, Entity, ItemType};

/// Runtime hit counter for a threshold profile
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Threshold {
    pub tenant: String,
    pub id: String,
    pub hits: u64,
    /// Unix millis until which the threshold stays silent
    pub snooze: Option<u64>,
}

impl Threshold {
    pub fn new(tenant: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn is_snoozed_at(&self, now_ms: u64) -> bool {
        self.snooze.map(|until| now_ms < until).unwrap_or(false)
    }
}

impl Entity for Threshold {
    const ITEM: ItemType = ItemType::Thresholds;

    fn key(&self) -> String {
        concatenated_key(&[&self.tenant, &self.id])
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub tenant: String,
    pub id: String,
    pub filter_ids: Vec<String>,
    pub activation_interval: Option<ActivationInterval>,
    /// Negative means unlimited
    pub max_hits: i64,
    pub min_hits: u64,
    pub min_sleep_ms: u64,
    pub blocker: bool,
    pub weight: f64,
    pub action_ids: Vec<String>,
    pub async_exec: bool,
}

impl ThresholdProfile {
    pub fn new(tenant: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            id: id.into(),
            max_hits: -1,
            ..Default::default()
        }
    }
}

impl Entity for ThresholdProfile {
    const ITEM: ItemType = ItemType::ThresholdProfiles;

    fn key(&self) -> String {
        concatenated_key(&[&self.tenant, &self.id])
    }
}
