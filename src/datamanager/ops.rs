//! Per item type operations
//!
//! Thin typed entry points over the generic paths. Tenant-scoped records
//! are addressed by `(tenant, id)`; the rest by their bare key. Destinations
//! and reverse destinations live in `reverse.rs`.

use std::sync::Arc;

use crate::entities::{
    concatenated_key, Account, ActionProfile, ActionTriggers, Filter, RatingProfile, StatQueue,
    StatQueueProfile, Threshold, ThresholdProfile, Timing,
};
use crate::error::Result;

use super::{DataManager, GetOptions};

impl DataManager {
    // =========================================================================
    // Accounts (`tenant:account` keys)
    // =========================================================================

    pub fn get_account(&self, id: &str, opts: &GetOptions) -> Result<Arc<Account>> {
        self.get_entity(id, opts)
    }

    pub fn set_account(&self, account: Account) -> Result<()> {
        self.set_entity(account)
    }

    pub fn remove_account(&self, id: &str) -> Result<()> {
        self.remove_entity::<Account>(id)
    }

    // =========================================================================
    // Filters
    // =========================================================================

    pub fn get_filter(&self, tenant: &str, id: &str, opts: &GetOptions) -> Result<Arc<Filter>> {
        self.get_entity(&concatenated_key(&[tenant, id]), opts)
    }

    pub fn set_filter(&self, filter: Filter) -> Result<()> {
        self.set_entity(filter)
    }

    pub fn remove_filter(&self, tenant: &str, id: &str) -> Result<()> {
        self.remove_entity::<Filter>(&concatenated_key(&[tenant, id]))
    }

    // =========================================================================
    // Thresholds
    // =========================================================================

    pub fn get_threshold(&self, tenant: &str, id: &str, opts: &GetOptions) -> Result<Arc<Threshold>> {
        self.get_entity(&concatenated_key(&[tenant, id]), opts)
    }

    pub fn set_threshold(&self, threshold: Threshold) -> Result<()> {
        self.set_entity(threshold)
    }

    pub fn remove_threshold(&self, tenant: &str, id: &str) -> Result<()> {
        self.remove_entity::<Threshold>(&concatenated_key(&[tenant, id]))
    }

    pub fn get_threshold_profile(
        &self,
        tenant: &str,
        id: &str,
        opts: &GetOptions,
    ) -> Result<Arc<ThresholdProfile>> {
        self.get_entity(&concatenated_key(&[tenant, id]), opts)
    }

    pub fn set_threshold_profile(&self, profile: ThresholdProfile) -> Result<()> {
        self.set_entity(profile)
    }

    pub fn remove_threshold_profile(&self, tenant: &str, id: &str) -> Result<()> {
        self.remove_entity::<ThresholdProfile>(&concatenated_key(&[tenant, id]))
    }

    // =========================================================================
    // Stat Queues
    // =========================================================================

    pub fn get_stat_queue(&self, tenant: &str, id: &str, opts: &GetOptions) -> Result<Arc<StatQueue>> {
        self.get_entity(&concatenated_key(&[tenant, id]), opts)
    }

    pub fn set_stat_queue(&self, queue: StatQueue) -> Result<()> {
        self.set_entity(queue)
    }

    pub fn remove_stat_queue(&self, tenant: &str, id: &str) -> Result<()> {
        self.remove_entity::<StatQueue>(&concatenated_key(&[tenant, id]))
    }

    pub fn get_stat_queue_profile(
        &self,
        tenant: &str,
        id: &str,
        opts: &GetOptions,
    ) -> Result<Arc<StatQueueProfile>> {
        self.get_entity(&concatenated_key(&[tenant, id]), opts)
    }

    pub fn set_stat_queue_profile(&self, profile: StatQueueProfile) -> Result<()> {
        self.set_entity(profile)
    }

    pub fn remove_stat_queue_profile(&self, tenant: &str, id: &str) -> Result<()> {
        self.remove_entity::<StatQueueProfile>(&concatenated_key(&[tenant, id]))
    }

    // =========================================================================
    // Timings, Action Triggers, Rating Profiles (bare keys)
    // =========================================================================

    pub fn get_timing(&self, id: &str, opts: &GetOptions) -> Result<Arc<Timing>> {
        self.get_entity(id, opts)
    }

    pub fn set_timing(&self, timing: Timing) -> Result<()> {
        self.set_entity(timing)
    }

    pub fn remove_timing(&self, id: &str) -> Result<()> {
        self.remove_entity::<Timing>(id)
    }

    pub fn get_action_triggers(&self, id: &str, opts: &GetOptions) -> Result<Arc<ActionTriggers>> {
        self.get_entity(id, opts)
    }

    pub fn set_action_triggers(&self, triggers: ActionTriggers) -> Result<()> {
        self.set_entity(triggers)
    }

    pub fn remove_action_triggers(&self, id: &str) -> Result<()> {
        self.remove_entity::<ActionTriggers>(id)
    }

    pub fn get_rating_profile(&self, id: &str, opts: &GetOptions) -> Result<Arc<RatingProfile>> {
        self.get_entity(id, opts)
    }

    pub fn set_rating_profile(&self, profile: RatingProfile) -> Result<()> {
        self.set_entity(profile)
    }

    pub fn remove_rating_profile(&self, id: &str) -> Result<()> {
        self.remove_entity::<RatingProfile>(id)
    }

    // =========================================================================
    // Action Profiles
    // =========================================================================

    pub fn get_action_profile(
        &self,
        tenant: &str,
        id: &str,
        opts: &GetOptions,
    ) -> Result<Arc<ActionProfile>> {
        self.get_entity(&concatenated_key(&[tenant, id]), opts)
    }

    pub fn set_action_profile(&self, profile: ActionProfile) -> Result<()> {
        self.set_entity(profile)
    }

    pub fn remove_action_profile(&self, tenant: &str, id: &str) -> Result<()> {
        self.remove_entity::<ActionProfile>(&concatenated_key(&[tenant, id]))
    }
}
