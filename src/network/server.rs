//! TCP Server
//!
//! Accepts peer connections and dispatches them to worker threads.
//!
//! ```text
//! acceptor (non-blocking, polls shutdown)
//!    │  bounded channel (max_connections)
//!    ▼
//! worker 1..N ── Connection::handle ── ReplicatorService
//! ```

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, TrySendError};

use super::Connection;
use crate::config::ListenConfig;
use crate::error::{ChargeError, Result};
use crate::replicator::ReplicatorService;

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// TCP server exposing a replicator service
pub struct Server {
    config: ListenConfig,
    service: Arc<ReplicatorService>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listen address; connections are served once `run` starts
    pub fn bind(config: ListenConfig, service: Arc<ReplicatorService>) -> Result<Self> {
        if config.workers == 0 {
            return Err(ChargeError::Config("listen.workers must be > 0".to_string()));
        }
        let listener = TcpListener::bind(&config.rpc_addr)?;
        listener.set_nonblocking(true)?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            service,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Actual bound address (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Flag that stops `run` when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&self) -> Result<()> {
        let (tx, rx) = channel::bounded::<TcpStream>(self.config.max_connections.max(1));

        let mut workers = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            let rx = rx.clone();
            let service = Arc::clone(&self.service);
            let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);
            let handle = thread::Builder::new()
                .name(format!("chargestore-worker-{}", id))
                .spawn(move || worker_loop(rx, service, read_ms, write_ms))?;
            workers.push(handle);
        }
        drop(rx);

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => match tx.try_send(stream) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("Connection limit reached, refusing {}", addr);
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                },
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        tracing::info!("Shutting down, waiting for {} workers", workers.len());
        drop(tx);
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn worker_loop(
    rx: Receiver<TcpStream>,
    service: Arc<ReplicatorService>,
    read_ms: u64,
    write_ms: u64,
) {
    for stream in rx.iter() {
        let mut conn = match Connection::new(stream, Arc::clone(&service)) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Failed to set up connection: {}", e);
                continue;
            }
        };
        if let Err(e) = conn.set_timeouts(read_ms, write_ms) {
            tracing::warn!("Failed to set timeouts for {}: {}", conn.peer_addr(), e);
            continue;
        }
        if let Err(e) = conn.handle() {
            tracing::debug!("Connection {} closed with error: {}", conn.peer_addr(), e);
        }
    }
}
