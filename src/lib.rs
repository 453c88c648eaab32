//! # chargestore
//!
//! Data-access core of a real-time charging node:
//! - Typed billing records (destinations, accounts, thresholds, stat queues, ...)
//! - Per item type LRU cache with negative entries, groups and transactions
//! - Pluggable backend store (in-memory or write-ahead logged)
//! - Read fallback to peers and write replication to peers
//! - Reverse destination index (prefix → destinations)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │           TCP Server ── ReplicatorService (peers in)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      DataManager                             │
//! │      read: cache → backend → peer   write: backend → cache   │
//! │                                     → replicate              │
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//!  ┌───────────┐        ┌──────────────┐       ┌──────────────┐
//!  │   Cache   │        │  DataDb      │       │ ConnManager  │
//!  │ (per-type │        │ internal/log │       │ pools → TCP  │
//!  │   LRU)    │        │   (+ WAL)    │       │ (peers out)  │
//!  └───────────┘        └──────────────┘       └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod entities;

pub mod cache;
pub mod wal;
pub mod storage;
pub mod connection;
pub mod replicator;
pub mod datamanager;
pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ChargeError, Result};
pub use config::{Config, ItemOpt};
pub use entities::{Entity, ItemType};
pub use cache::Cache;
pub use storage::DataDb;
pub use connection::{ConnManager, RpcClient};
pub use replicator::ReplicatorService;
pub use datamanager::{DataManager, GetOptions};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of chargestore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
