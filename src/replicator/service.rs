//! Replicator service
//!
//! Serves peer calls from a local data manager:
//! - Get reads the backend store only, never a further peer
//! - Set/Remove update backend and cache but never fan out again, so
//!   replication cannot loop between nodes
//! - A Get carrying `remote_host` registers the caller as a replication
//!   host of the object

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::NON_TRANSACTIONAL;
use crate::connection::RpcClient;
use crate::datamanager::DataManager;
use crate::entities::{
    Account, ActionProfile, ActionTriggers, Destination, Entity, Filter, ItemType, RatingProfile,
    ReverseDestination, StatQueue, StatQueueProfile, Threshold, ThresholdProfile, Timing,
};
use crate::error::{ChargeError, Result};
use crate::storage::marshal;

use super::{Action, ArgWithApiOpts, Method, OK, PONG};

/// Replicator endpoint backed by a local data manager
pub struct ReplicatorService {
    dm: Arc<DataManager>,
}

impl ReplicatorService {
    pub fn new(dm: Arc<DataManager>) -> Self {
        Self { dm }
    }

    pub fn data_manager(&self) -> &Arc<DataManager> {
        &self.dm
    }

    /// Execute one replicator call
    pub fn dispatch(&self, method: &str, args: &[u8]) -> Result<Vec<u8>> {
        let parsed = Method::parse(method)?;
        debug!(method, "replicator call");

        let (action, item) = match parsed {
            Method::Ping => return marshal::encode(PONG),
            Method::Item { action, item } => (action, item),
        };

        match item {
            ItemType::Destinations => self.destination(action, args),
            ItemType::ReverseDestinations => self.reverse_destination(action, args),
            ItemType::Accounts => self.entity::<Account>(action, args),
            ItemType::Filters => self.entity::<Filter>(action, args),
            ItemType::Thresholds => self.entity::<Threshold>(action, args),
            ItemType::ThresholdProfiles => self.entity::<ThresholdProfile>(action, args),
            ItemType::StatQueues => self.entity::<StatQueue>(action, args),
            ItemType::StatQueueProfiles => self.entity::<StatQueueProfile>(action, args),
            ItemType::Timings => self.entity::<Timing>(action, args),
            ItemType::ActionTriggers => self.entity::<ActionTriggers>(action, args),
            ItemType::RatingProfiles => self.entity::<RatingProfile>(action, args),
            ItemType::ActionProfiles => self.entity::<ActionProfile>(action, args),
            ItemType::ReplicationHosts => Err(ChargeError::UnsupportedMethod(method.to_string())),
        }
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    fn entity<T: Entity>(&self, action: Action, args: &[u8]) -> Result<Vec<u8>> {
        match action {
            Action::Get => self.get::<T>(args),
            Action::Set => {
                let arg: ArgWithApiOpts<T> = decode_arg(args)?;
                self.dm.store_entity(arg.arg, NON_TRANSACTIONAL, false)?;
                marshal::encode(OK)
            }
            Action::Remove => {
                let arg: ArgWithApiOpts<String> = decode_arg(args)?;
                self.dm.erase_entity::<T>(&arg.arg, NON_TRANSACTIONAL, false)?;
                marshal::encode(OK)
            }
        }
    }

    fn destination(&self, action: Action, args: &[u8]) -> Result<Vec<u8>> {
        match action {
            Action::Get => self.get::<Destination>(args),
            Action::Set => {
                let arg: ArgWithApiOpts<Destination> = decode_arg(args)?;
                self.dm.write_destination(arg.arg, NON_TRANSACTIONAL, false)?;
                marshal::encode(OK)
            }
            Action::Remove => {
                let arg: ArgWithApiOpts<String> = decode_arg(args)?;
                self.dm.delete_destination(&arg.arg, NON_TRANSACTIONAL, false)?;
                marshal::encode(OK)
            }
        }
    }

    fn reverse_destination(&self, action: Action, args: &[u8]) -> Result<Vec<u8>> {
        match action {
            Action::Get => self.get::<ReverseDestination>(args),
            Action::Set => {
                let arg: ArgWithApiOpts<Destination> = decode_arg(args)?;
                self.dm.add_reverse_destination(
                    &arg.arg.id,
                    &arg.arg.prefixes,
                    NON_TRANSACTIONAL,
                    false,
                )?;
                marshal::encode(OK)
            }
            Action::Remove => {
                let arg: ArgWithApiOpts<Destination> = decode_arg(args)?;
                self.dm.drop_reverse_destination(
                    &arg.arg.id,
                    &arg.arg.prefixes,
                    NON_TRANSACTIONAL,
                    false,
                )?;
                marshal::encode(OK)
            }
        }
    }

    fn get<T: Entity>(&self, args: &[u8]) -> Result<Vec<u8>> {
        let ArgWithApiOpts { arg: key, api_opts } = decode_arg::<ArgWithApiOpts<String>>(args)?;
        let db = self.dm.data_db()?;
        let value = T::load(db.as_ref(), &key)?;
        if let Some(host) = api_opts.remote_host {
            self.dm.register_replication_host(T::ITEM, &key, &host);
        }
        marshal::encode(&value)
    }
}

impl RpcClient for ReplicatorService {
    fn call(&self, method: &str, args: &[u8], _timeout: Duration) -> Result<Vec<u8>> {
        self.dispatch(method, args)
    }
}

fn decode_arg<A: DeserializeOwned>(args: &[u8]) -> Result<A> {
    marshal::decode(args).map_err(|_| ChargeError::NotConvertible)
}
