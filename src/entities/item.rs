//! Item type catalogue
//!
//! Every cache partition, backend table and replicator method is keyed by an
//! `ItemType`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChargeError;

/// The kinds of records the data manager handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemType {
    #[serde(rename = "*destinations")]
    Destinations,
    #[serde(rename = "*reverse_destinations")]
    ReverseDestinations,
    #[serde(rename = "*accounts")]
    Accounts,
    #[serde(rename = "*filters")]
    Filters,
    #[serde(rename = "*thresholds")]
    Thresholds,
    #[serde(rename = "*threshold_profiles")]
    ThresholdProfiles,
    #[serde(rename = "*statqueues")]
    StatQueues,
    #[serde(rename = "*statqueue_profiles")]
    StatQueueProfiles,
    #[serde(rename = "*timings")]
    Timings,
    #[serde(rename = "*action_triggers")]
    ActionTriggers,
    #[serde(rename = "*rating_profiles")]
    RatingProfiles,
    #[serde(rename = "*action_profiles")]
    ActionProfiles,
    /// Cache-only partition tracking which peers read which objects
    #[serde(rename = "*replication_hosts")]
    ReplicationHosts,
}

impl ItemType {
    pub const ALL: [ItemType; 13] = [
        ItemType::Destinations,
        ItemType::ReverseDestinations,
        ItemType::Accounts,
        ItemType::Filters,
        ItemType::Thresholds,
        ItemType::ThresholdProfiles,
        ItemType::StatQueues,
        ItemType::StatQueueProfiles,
        ItemType::Timings,
        ItemType::ActionTriggers,
        ItemType::RatingProfiles,
        ItemType::ActionProfiles,
        ItemType::ReplicationHosts,
    ];

    /// Config/log name, e.g. `*destinations`
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Destinations => "*destinations",
            ItemType::ReverseDestinations => "*reverse_destinations",
            ItemType::Accounts => "*accounts",
            ItemType::Filters => "*filters",
            ItemType::Thresholds => "*thresholds",
            ItemType::ThresholdProfiles => "*threshold_profiles",
            ItemType::StatQueues => "*statqueues",
            ItemType::StatQueueProfiles => "*statqueue_profiles",
            ItemType::Timings => "*timings",
            ItemType::ActionTriggers => "*action_triggers",
            ItemType::RatingProfiles => "*rating_profiles",
            ItemType::ActionProfiles => "*action_profiles",
            ItemType::ReplicationHosts => "*replication_hosts",
        }
    }

    /// Short key prefix used to namespace object ids across item types
    pub fn prefix(&self) -> &'static str {
        match self {
            ItemType::Destinations => "dst_",
            ItemType::ReverseDestinations => "rds_",
            ItemType::Accounts => "acc_",
            ItemType::Filters => "ftr_",
            ItemType::Thresholds => "thd_",
            ItemType::ThresholdProfiles => "thp_",
            ItemType::StatQueues => "stq_",
            ItemType::StatQueueProfiles => "sqp_",
            ItemType::Timings => "tmg_",
            ItemType::ActionTriggers => "atr_",
            ItemType::RatingProfiles => "rpf_",
            ItemType::ActionProfiles => "acp_",
            ItemType::ReplicationHosts => "rph_",
        }
    }

    /// Entity name used in replicator method names. `None` for cache-only
    /// partitions that have no remote surface.
    pub fn entity_name(&self) -> Option<&'static str> {
        match self {
            ItemType::Destinations => Some("Destination"),
            ItemType::ReverseDestinations => Some("ReverseDestination"),
            ItemType::Accounts => Some("Account"),
            ItemType::Filters => Some("Filter"),
            ItemType::Thresholds => Some("Threshold"),
            ItemType::ThresholdProfiles => Some("ThresholdProfile"),
            ItemType::StatQueues => Some("StatQueue"),
            ItemType::StatQueueProfiles => Some("StatQueueProfile"),
            ItemType::Timings => Some("Timing"),
            ItemType::ActionTriggers => Some("ActionTriggers"),
            ItemType::RatingProfiles => Some("RatingProfile"),
            ItemType::ActionProfiles => Some("ActionProfile"),
            ItemType::ReplicationHosts => None,
        }
    }

    /// Reverse lookup of [`ItemType::entity_name`]
    pub fn from_entity_name(name: &str) -> Option<ItemType> {
        ItemType::ALL
            .iter()
            .copied()
            .find(|item| item.entity_name() == Some(name))
    }

    /// Item types whose records live in the backend store
    pub fn is_persistent(&self) -> bool {
        !matches!(self, ItemType::ReplicationHosts)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = ChargeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemType::ALL
            .iter()
            .copied()
            .find(|item| {
                item.as_str() == s || item.as_str().trim_start_matches('*') == s || item.prefix() == s
            })
            .ok_or_else(|| ChargeError::InvalidKey(format!("unknown item type {}", s)))
    }
}
