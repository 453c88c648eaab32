//! Stat queues and their profiles
//!
//! A stat queue keeps a bounded window of recent events and a set of named
//! metrics computed over that window. Metrics are accumulators selected by
//! [`MetricKind`]; each keeps one sample per event so an event leaving the
//! window can be subtracted again.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChargeError;

use super::{concatenated_key, Entity, ItemType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// Total call duration
    #[serde(rename = "*tcd")]
    Tcd,
    /// Average call duration
    #[serde(rename = "*acd")]
    Acd,
    /// Answer seizure ratio, in percent
    #[serde(rename = "*asr")]
    Asr,
    /// Total call cost
    #[serde(rename = "*tcc")]
    Tcc,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Tcd => "*tcd",
            MetricKind::Acd => "*acd",
            MetricKind::Asr => "*asr",
            MetricKind::Tcc => "*tcc",
        }
    }
}

impl FromStr for MetricKind {
    type Err = ChargeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "*tcd" => Ok(MetricKind::Tcd),
            "*acd" => Ok(MetricKind::Acd),
            "*asr" => Ok(MetricKind::Asr),
            "*tcc" => Ok(MetricKind::Tcc),
            other => Err(ChargeError::InvalidKey(format!("unknown metric {}", other))),
        }
    }
}

/// The fields of an event the metrics look at
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatEvent {
    pub id: String,
    pub usage_ms: Option<u64>,
    pub cost: Option<f64>,
    pub answered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatMetric {
    pub kind: MetricKind,
    /// Fewer samples than this and the metric has no value yet
    pub min_items: usize,
    /// Event id → sample
    pub samples: BTreeMap<String, f64>,
}

impl StatMetric {
    pub fn new(kind: MetricKind, min_items: usize) -> Self {
        Self {
            kind,
            min_items,
            samples: BTreeMap::new(),
        }
    }

    pub fn add_event(&mut self, event: &StatEvent) {
        let sample = match self.kind {
            MetricKind::Tcd | MetricKind::Acd => event.usage_ms.map(|u| u as f64),
            MetricKind::Tcc => event.cost,
            MetricKind::Asr => Some(if event.answered { 1.0 } else { 0.0 }),
        };
        if let Some(sample) = sample {
            self.samples.insert(event.id.clone(), sample);
        }
    }

    pub fn remove_event(&mut self, event_id: &str) {
        self.samples.remove(event_id);
    }

    pub fn value(&self) -> Option<f64> {
        let count = self.samples.len();
        if count == 0 || count < self.min_items {
            return None;
        }
        let sum: f64 = self.samples.values().sum();
        match self.kind {
            MetricKind::Tcd | MetricKind::Tcc => Some(sum),
            MetricKind::Acd => Some(sum / count as f64),
            MetricKind::Asr => Some(sum / count as f64 * 100.0),
        }
    }
}

/// An event held in the queue window
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SqItem {
    pub event_id: String,
    /// Unix millis after which the event leaves the window
    pub expiry_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatQueue {
    pub tenant: String,
    pub id: String,
    /// Oldest first
    pub items: Vec<SqItem>,
    /// Metric id → accumulator
    pub metrics: BTreeMap<String, StatMetric>,
}

impl StatQueue {
    pub fn new(tenant: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            id: id.into(),
            ..Default::default()
        }
    }

    /// Fresh queue with one accumulator per metric the profile names
    pub fn from_profile(profile: &StatQueueProfile) -> crate::Result<Self> {
        let mut queue = StatQueue::new(profile.tenant.clone(), profile.id.clone());
        for metric_id in &profile.metric_ids {
            let kind: MetricKind = metric_id.parse()?;
            queue
                .metrics
                .insert(metric_id.clone(), StatMetric::new(kind, profile.min_items));
        }
        Ok(queue)
    }

    /// Add an event, dropping expired events and anything beyond the
    /// profile's queue length
    pub fn process_event(&mut self, event: &StatEvent, profile: &StatQueueProfile, now_ms: u64) {
        self.expire(now_ms);

        let expiry_time = profile.ttl_ms.map(|ttl| now_ms + ttl);
        self.items.push(SqItem {
            event_id: event.id.clone(),
            expiry_time,
        });
        for metric in self.metrics.values_mut() {
            metric.add_event(event);
        }

        if profile.queue_length > 0 {
            while self.items.len() > profile.queue_length {
                let evicted = self.items.remove(0);
                self.remove_from_metrics(&evicted.event_id);
            }
        }
    }

    /// Drop events whose expiry time has passed
    pub fn expire(&mut self, now_ms: u64) {
        let (expired, live): (Vec<SqItem>, Vec<SqItem>) = self
            .items
            .drain(..)
            .partition(|item| item.expiry_time.map(|t| t <= now_ms).unwrap_or(false));
        self.items = live;
        for item in expired {
            self.remove_from_metrics(&item.event_id);
        }
    }

    pub fn metric_value(&self, metric_id: &str) -> Option<f64> {
        self.metrics.get(metric_id).and_then(|m| m.value())
    }

    fn remove_from_metrics(&mut self, event_id: &str) {
        for metric in self.metrics.values_mut() {
            metric.remove_event(event_id);
        }
    }
}

impl Entity for StatQueue {
    const ITEM: ItemType = ItemType::StatQueues;

    fn key(&self) -> String {
        concatenated_key(&[&self.tenant, &self.id])
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatQueueProfile {
    pub tenant: String,
    pub id: String,
    pub filter_ids: Vec<String>,
    /// 0 means unbounded
    pub queue_length: usize,
    pub ttl_ms: Option<u64>,
    pub min_items: usize,
    pub metric_ids: Vec<String>,
    pub threshold_ids: Vec<String>,
    pub blocker: bool,
    pub weight: f64,
}

impl StatQueueProfile {
    pub fn new(tenant: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            id: id.into(),
            ..Default::default()
        }
    }
}

impl Entity for StatQueueProfile {
    const ITEM: ItemType = ItemType::StatQueueProfiles;

    fn key(&self) -> String {
        concatenated_key(&[&self.tenant, &self.id])
    }
}
