//! Rating profiles

use serde::{Deserialize, Serialize};

use super::{Entity, ItemType};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingPlanActivation {
    /// Unix millis
    pub activation_time: u64,
    pub rating_plan_id: String,
    /// Subjects to fall back to when this plan has no rate
    pub fallback_keys: Vec<String>,
}

/// Rating plan history of one subject, keyed `*out:tenant:category:subject`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingProfile {
    pub id: String,
    pub activations: Vec<RatingPlanActivation>,
}

impl RatingProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            activations: Vec::new(),
        }
    }

    /// Build the conventional outbound key
    pub fn key_for(tenant: &str, category: &str, subject: &str) -> String {
        format!("*out:{}:{}:{}", tenant, category, subject)
    }

    /// The activation in force at `now_ms` (latest one already started)
    pub fn activation_at(&self, now_ms: u64) -> Option<&RatingPlanActivation> {
        self.activations
            .iter()
            .filter(|a| a.activation_time <= now_ms)
            .max_by_key(|a| a.activation_time)
    }
}

impl Entity for RatingProfile {
    const ITEM: ItemType = ItemType::RatingProfiles;

    fn key(&self) -> String {
        self.id.clone()
    }
}
