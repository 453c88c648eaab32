//! Calendar timings

use serde::{Deserialize, Serialize};

use super::{Entity, ItemType};

/// Calendar recurrence. Empty lists match any value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timing {
    pub id: String,
    pub years: Vec<u32>,
    pub months: Vec<u32>,
    pub month_days: Vec<u32>,
    /// 0 = Sunday
    pub week_days: Vec<u32>,
    /// `HH:MM:SS`
    pub start_time: String,
    pub end_time: String,
}

impl Timing {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Whether a calendar date falls inside the recurrence
    pub fn matches_date(&self, year: u32, month: u32, month_day: u32, week_day: u32) -> bool {
        fn any_or(list: &[u32], value: u32) -> bool {
            list.is_empty() || list.contains(&value)
        }
        any_or(&self.years, year)
            && any_or(&self.months, month)
            && any_or(&self.month_days, month_day)
            && any_or(&self.week_days, week_day)
    }
}

impl Entity for Timing {
    const ITEM: ItemType = ItemType::Timings;

    fn key(&self) -> String {
        self.id.clone()
    }
}
