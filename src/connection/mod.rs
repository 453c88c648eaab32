//! Connection Module
//!
//! Routes remote calls to peers by logical connection id.
//!
//! ## Responsibilities
//! - Abstract a remote-callable handle (`RpcClient`)
//! - Pool handles per connection id with bounded borrow and RAII return
//! - Fail over across an ordered list of connection ids
//!
//! ## Call flow
//! ```text
//! call(["peer_a", "peer_b"], method, args)
//!   │
//!   ├─▶ peer_a pool ── acquire (≤ timeout) ── call ──┐
//!   │        transport error / borrow timeout        │ app error or reply
//!   ├─▶ peer_b pool ── acquire ── call ──────────────┤──▶ returned as-is
//!   │        transport error                         │
//!   └─▶ Unreachable { conn_ids, reason }             │
//! ```

mod pool;
mod manager;

use std::time::Duration;

use crate::error::Result;

pub use manager::ConnManager;
pub use pool::{ConnPool, PooledClient};

/// A handle able to invoke a named method on a peer
///
/// Transport failures must be reported as `Transport`, `Timeout`, `Io` or
/// `Protocol` errors; anything else is treated as the peer's answer.
pub trait RpcClient: Send + Sync {
    fn call(&self, method: &str, args: &[u8], timeout: Duration) -> Result<Vec<u8>>;
}
