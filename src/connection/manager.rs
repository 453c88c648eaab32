//! Connection Manager
//!
//! Maps logical connection ids to handle pools and performs ordered
//! failover calls across them.
//!
//! A connection id owns one pool per peer address. A call walks the
//! addresses of an id in order before moving to the next id:
//!
//! ```text
//! conn_ids ["node_a", "node_b"]
//!   node_a ── 10.0.0.1 pool ── transport error
//!          └─ 10.0.0.2 pool ── reply ──▶ Ok
//!   node_b ── (not tried)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ChargeError, Result};
use crate::network::TcpClient;
use crate::storage::marshal;

use super::{ConnPool, RpcClient};

/// Connection id → address pools registry
///
/// ## Concurrency:
/// - `pools`: RwLock, written only when pools are added or removed
/// - Calls clone the pool `Arc`s out of the lock before borrowing
pub struct ConnManager {
    pools: RwLock<HashMap<String, Vec<Arc<ConnPool>>>>,
    /// Budget of one attempt, borrow wait included
    timeout: Duration,
}

impl ConnManager {
    /// Build one TCP pool per address of every entry of `config.rpc_conns`
    ///
    /// Clients dial lazily on first use, so unreachable peers do not fail
    /// startup.
    pub fn new(config: &Config) -> Result<Self> {
        let manager = Self::empty(config.reply_timeout());
        for (conn_id, conn) in &config.rpc_conns {
            let mut pools = Vec::with_capacity(conn.addresses.len());
            for address in &conn.addresses {
                let pool = ConnPool::new(conn.pool_size);
                for _ in 0..conn.pool_size {
                    pool.add(Arc::new(TcpClient::new(address.clone())))?;
                }
                pools.push(Arc::new(pool));
            }
            debug!(
                conn_id = %conn_id,
                addresses = pools.len(),
                handles_per_address = conn.pool_size,
                "connection pools configured"
            );
            manager.pools.write().insert(conn_id.clone(), pools);
        }
        Ok(manager)
    }

    /// Manager without pools
    pub fn empty(timeout: Duration) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// Register or replace the pools of `conn_id` with a single pool
    pub fn add_pool(&self, conn_id: impl Into<String>, pool: ConnPool) {
        self.pools
            .write()
            .insert(conn_id.into(), vec![Arc::new(pool)]);
    }

    /// Append a pool tried after the existing pools of `conn_id`
    pub fn push_pool(&self, conn_id: impl Into<String>, pool: ConnPool) {
        self.pools
            .write()
            .entry(conn_id.into())
            .or_default()
            .push(Arc::new(pool));
    }

    /// Register a single in-process handle as `conn_id`
    pub fn add_client(&self, conn_id: impl Into<String>, client: Arc<dyn RpcClient>) -> Result<()> {
        let pool = ConnPool::with_clients(vec![client])?;
        self.add_pool(conn_id, pool);
        Ok(())
    }

    pub fn remove_pool(&self, conn_id: &str) -> bool {
        self.pools.write().remove(conn_id).is_some()
    }

    /// First pool of `conn_id`
    pub fn pool(&self, conn_id: &str) -> Option<Arc<ConnPool>> {
        self.pools
            .read()
            .get(conn_id)
            .and_then(|pools| pools.first().cloned())
    }

    /// Every pool of `conn_id`, in call order
    pub fn pools(&self, conn_id: &str) -> Option<Vec<Arc<ConnPool>>> {
        self.pools.read().get(conn_id).cloned()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke `method` on the first connection that answers
    ///
    /// Transport failures (including a borrow timeout) move on to the next
    /// address of the id, then to the next id; any other error is the
    /// peer's answer and is returned at once.
    pub fn call(&self, conn_ids: &[String], method: &str, args: &[u8]) -> Result<Vec<u8>> {
        if conn_ids.is_empty() {
            return Err(ChargeError::Config(format!(
                "no connections configured for {}",
                method
            )));
        }

        let mut last_failure = String::new();
        for conn_id in conn_ids {
            let pools = self
                .pools(conn_id)
                .ok_or_else(|| ChargeError::Config(format!("unknown connection {}", conn_id)))?;

            for (index, pool) in pools.iter().enumerate() {
                match self.call_pool(pool, method, args) {
                    Ok(reply) => return Ok(reply),
                    Err(e) if e.is_transport() => {
                        warn!(conn_id = %conn_id, address = index, method, error = %e, "transport failure, trying next connection");
                        last_failure = format!("{}: {}", conn_id, e);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Err(ChargeError::Unreachable {
            conn_ids: conn_ids.to_vec(),
            reason: last_failure,
        })
    }

    /// `call` with bincode-encoded argument and reply
    pub fn call_typed<A, R>(&self, conn_ids: &[String], method: &str, arg: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let args = marshal::encode(arg)?;
        let reply = self.call(conn_ids, method, &args)?;
        marshal::decode(&reply).map_err(|_| ChargeError::NotConvertible)
    }

    fn call_pool(&self, pool: &ConnPool, method: &str, args: &[u8]) -> Result<Vec<u8>> {
        let started = Instant::now();
        let client = pool.acquire(self.timeout)?;
        let remaining = self.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(ChargeError::Timeout(self.timeout));
        }
        client.call(method, args, remaining)
    }
}
