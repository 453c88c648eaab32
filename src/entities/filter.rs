//! Filters

use serde::{Deserialize, Serialize};

use super::{concatenated_key, Entity, ItemType};

/// Time window in which a profile is active (unix millis, open ends allowed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivationInterval {
    pub activation_time: Option<u64>,
    pub expiry_time: Option<u64>,
}

impl ActivationInterval {
    pub fn is_active_at(&self, now_ms: u64) -> bool {
        let started = self.activation_time.map(|t| t <= now_ms).unwrap_or(true);
        let not_expired = self.expiry_time.map(|t| now_ms < t).unwrap_or(true);
        started && not_expired
    }
}

/// One rule: a rule type (`*string`, `*prefix`, ...) applied to an element path
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterRule {
    pub rule_type: String,
    pub element: String,
    pub values: Vec<String>,
}

impl FilterRule {
    pub fn new(rule_type: impl Into<String>, element: impl Into<String>, values: &[&str]) -> Self {
        Self {
            rule_type: rule_type.into(),
            element: element.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Filter {
    pub tenant: String,
    pub id: String,
    /// Evaluated in order
    pub rules: Vec<FilterRule>,
    pub activation_interval: Option<ActivationInterval>,
}

impl Filter {
    pub fn new(tenant: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_rule(mut self, rule: FilterRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn is_active_at(&self, now_ms: u64) -> bool {
        self.activation_interval
            .map(|interval| interval.is_active_at(now_ms))
            .unwrap_or(true)
    }
}

impl Entity for Filter {
    const ITEM: ItemType = ItemType::Filters;

    fn key(&self) -> String {
        concatenated_key(&[&self.tenant, &self.id])
    }
}
