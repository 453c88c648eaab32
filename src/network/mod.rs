//! Network Module
//!
//! TCP transport for replicator calls between nodes.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Worker thread pool for inbound connections
//! - Calls routed through the ReplicatorService
//! - `TcpClient`: the outbound `RpcClient` the connection manager pools

mod client;
mod connection;
mod server;

pub use client::TcpClient;
pub use connection::Connection;
pub use server::Server;
