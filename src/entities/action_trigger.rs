//! Action triggers

use serde::{Deserialize, Serialize};

use super::{Entity, ItemType};

/// Which balances a trigger watches
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BalanceFilter {
    pub balance_type: Option<String>,
    pub balance_id: Option<String>,
    pub destination_ids: Vec<String>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionTrigger {
    pub id: String,
    pub unique_id: String,
    /// e.g. `*min_balance`, `*max_event_counter`
    pub threshold_type: String,
    pub threshold_value: f64,
    pub recurrent: bool,
    pub min_sleep_ms: u64,
    pub balance: Option<BalanceFilter>,
    pub weight: f64,
    pub actions_id: String,
    pub executed: bool,
}

/// Ordered trigger list stored under a key independent of any tenant
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionTriggers {
    pub id: String,
    pub triggers: Vec<ActionTrigger>,
}

impl ActionTriggers {
    pub fn new(id: impl Into<String>, triggers: Vec<ActionTrigger>) -> Self {
        Self {
            id: id.into(),
            triggers,
        }
    }
}

impl Entity for ActionTriggers {
    const ITEM: ItemType = ItemType::ActionTriggers;

    fn key(&self) -> String {
        self.id.clone()
    }
}
