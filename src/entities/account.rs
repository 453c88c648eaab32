//! Accounts and balances

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{split_tenant_id, Entity, ItemType};

/// A single balance inside an account
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub id: String,
    pub value: f64,
    pub weight: f64,
    pub destination_ids: BTreeSet<String>,
    pub rating_subject: String,
    /// Unix millis; `None` never expires
    pub expiration_time: Option<u64>,
    pub disabled: bool,
    pub blocker: bool,
}

impl Balance {
    pub fn new(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value,
            ..Default::default()
        }
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expiration_time.map(|t| t <= now_ms).unwrap_or(false)
    }

    pub fn is_active_at(&self, now_ms: u64) -> bool {
        !self.disabled && !self.is_expired_at(now_ms)
    }
}

/// A charging account, keyed `tenant:account`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Balance type (`*monetary`, `*voice`, ...) → balances
    pub balance_map: BTreeMap<String, Vec<Balance>>,
    /// Unix millis of the last update
    pub update_time: u64,
    pub disabled: bool,
    pub allow_negative: bool,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn tenant(&self) -> Option<&str> {
        split_tenant_id(&self.id).map(|(tenant, _)| tenant)
    }

    /// Append a balance, keeping heavier balances first
    pub fn add_balance(&mut self, balance_type: impl Into<String>, balance: Balance) {
        let balances = self.balance_map.entry(balance_type.into()).or_default();
        balances.push(balance);
        balances.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    }

    /// Sum of active balances of one type
    pub fn balance_total(&self, balance_type: &str, now_ms: u64) -> f64 {
        self.balance_map
            .get(balance_type)
            .map(|balances| {
                balances
                    .iter()
                    .filter(|b| b.is_active_at(now_ms))
                    .map(|b| b.value)
                    .sum()
            })
            .unwrap_or(0.0)
    }
}

impl Entity for Account {
    const ITEM: ItemType = ItemType::Accounts;

    fn key(&self) -> String {
        self.id.clone()
    }
}
