//! Replicator Module
//!
//! The RPC surface one node exposes so peers' data managers can read and
//! write its records. The surface is symmetric: every node that is a read
//! or write target implements the same methods it calls on others.
//!
//! ## Methods
//! ```text
//! ReplicatorSv1.Ping
//! ReplicatorSv1.Get<Entity>     arg: ArgWithApiOpts<String>  (key)   → entity
//! ReplicatorSv1.Set<Entity>     arg: ArgWithApiOpts<Entity>          → "OK"
//! ReplicatorSv1.Remove<Entity>  arg: ArgWithApiOpts<String>  (key)   → "OK"
//!
//! ReverseDestination Set/Remove take ArgWithApiOpts<Destination>
//! ```
//!
//! Arguments and replies are bincode encoded.

mod service;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::ItemType;
use crate::error::{ChargeError, Result};

pub use service::ReplicatorService;

pub const SERVICE: &str = "ReplicatorSv1";
pub const PING: &str = "ReplicatorSv1.Ping";
pub const OK: &str = "OK";
pub const PONG: &str = "Pong";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Set,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "Get",
            Action::Set => "Set",
            Action::Remove => "Remove",
        }
    }
}

/// A parsed replicator method name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Ping,
    Item { action: Action, item: ItemType },
}

impl Method {
    pub fn parse(method: &str) -> Result<Self> {
        if method == PING {
            return Ok(Method::Ping);
        }

        let unsupported = || ChargeError::UnsupportedMethod(method.to_string());
        let name = method
            .strip_prefix(SERVICE)
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or_else(unsupported)?;

        for action in [Action::Remove, Action::Get, Action::Set] {
            if let Some(entity) = name.strip_prefix(action.as_str()) {
                let item = ItemType::from_entity_name(entity).ok_or_else(unsupported)?;
                return Ok(Method::Item { action, item });
            }
        }
        Err(unsupported())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Ping => f.write_str(PING),
            Method::Item { action, item } => write!(
                f,
                "{}.{}{}",
                SERVICE,
                action.as_str(),
                item.entity_name().unwrap_or_default()
            ),
        }
    }
}

/// Method name of `action` on `item`, e.g. `ReplicatorSv1.SetAccount`
pub fn method_name(action: Action, item: ItemType) -> Result<String> {
    if item.entity_name().is_none() {
        return Err(ChargeError::InvalidKey(format!(
            "{} has no replicator methods",
            item
        )));
    }
    Ok(Method::Item { action, item }.to_string())
}

/// Call metadata sent with every replicator argument
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOpts {
    pub api_key: Option<String>,
    pub route_id: Option<String>,
    /// Connection id under which the callee can reach the caller; a peer
    /// serving a Get records it as a replication host of the object
    pub remote_host: Option<String>,
}

/// A replicator argument with its call metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgWithApiOpts<T> {
    pub arg: T,
    pub api_opts: ApiOpts,
}

impl<T> ArgWithApiOpts<T> {
    pub fn new(arg: T, api_opts: ApiOpts) -> Self {
        Self { arg, api_opts }
    }
}
