//! Handle pool of one logical connection
//!
//! Handles live in a bounded channel: borrowing receives one, dropping the
//! guard sends it back. A drained pool blocks the borrower up to the call
//! timeout.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::warn;

use crate::error::{ChargeError, Result};

use super::RpcClient;

/// Pool of interchangeable handles to one peer
pub struct ConnPool {
    tx: Sender<Arc<dyn RpcClient>>,
    rx: Receiver<Arc<dyn RpcClient>>,
    capacity: usize,
}

impl ConnPool {
    /// Empty pool holding at most `capacity` handles
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Pool pre-filled with `clients`
    pub fn with_clients(clients: Vec<Arc<dyn RpcClient>>) -> Result<Self> {
        let pool = Self::new(clients.len());
        for client in clients {
            pool.add(client)?;
        }
        Ok(pool)
    }

    /// Add a handle at runtime
    pub fn add(&self, client: Arc<dyn RpcClient>) -> Result<()> {
        self.tx.try_send(client).map_err(|_| {
            ChargeError::Config(format!("connection pool full ({} handles)", self.capacity))
        })
    }

    /// Borrow a handle, waiting up to `timeout`
    pub fn acquire(&self, timeout: Duration) -> Result<PooledClient<'_>> {
        match self.rx.recv_timeout(timeout) {
            Ok(client) => Ok(PooledClient { client, pool: self }),
            Err(RecvTimeoutError::Timeout) => Err(ChargeError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ChargeError::Transport("connection pool closed".to_string()))
            }
        }
    }

    /// Handles currently idle in the pool
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A borrowed handle, returned to its pool on drop
pub struct PooledClient<'a> {
    client: Arc<dyn RpcClient>,
    pool: &'a ConnPool,
}

impl Deref for PooledClient<'_> {
    type Target = dyn RpcClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

impl Drop for PooledClient<'_> {
    fn drop(&mut self) {
        if self.pool.tx.try_send(Arc::clone(&self.client)).is_err() {
            warn!("connection pool full on release, dropping handle");
        }
    }
}
