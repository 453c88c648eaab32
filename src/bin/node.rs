//! chargestore Node Binary
//!
//! Opens the data manager and serves the replicator endpoint to peers.

use std::path::PathBuf;
use std::sync::Arc;

use chargestore::config::DbType;
use chargestore::network::Server;
use chargestore::{Config, DataManager, ItemType, ReplicatorService};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

/// chargestore node
#[derive(Parser, Debug)]
#[command(name = "chargestore-node")]
#[command(about = "Charging data node: cache, backend store and peer replication")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node identity in logs
    #[arg(long)]
    node_id: Option<String>,

    /// Backend store implementation
    #[arg(long, value_enum)]
    db_type: Option<DbKind>,

    /// Data directory of the log backend
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Connection worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Load every stored record into the cache before serving
    #[arg(long)]
    preload: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DbKind {
    Internal,
    Log,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chargestore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("chargestore node v{}", chargestore::VERSION);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Node id: {}", config.general.node_id);
    tracing::info!("Backend: {:?} at {}", config.data_db.db_type, config.data_db.db_path.display());
    tracing::info!("Listen address: {}", config.listen.rpc_addr);

    let listen = config.listen.clone();
    let dm = match DataManager::open(config) {
        Ok(dm) => Arc::new(dm),
        Err(e) => {
            tracing::error!("Failed to open data manager: {}", e);
            std::process::exit(1);
        }
    };

    if args.preload {
        for item in ItemType::ALL.iter().filter(|item| item.is_persistent()) {
            if let Err(e) = dm.cache_data_from_db(*item, None) {
                tracing::warn!("Preload of {} failed: {}", item, e);
            }
        }
    }

    let service = Arc::new(ReplicatorService::new(dm));
    let server = match Server::bind(listen, service) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Node stopped");
}

/// Config file (or defaults) with command line overrides applied
fn load_config(args: &Args) -> chargestore::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(node_id) = &args.node_id {
        config.general.node_id = node_id.clone();
    }
    if let Some(kind) = args.db_type {
        config.data_db.db_type = match kind {
            DbKind::Internal => DbType::Internal,
            DbKind::Log => DbType::Log,
        };
    }
    if let Some(dir) = &args.data_dir {
        config.data_db.db_path = dir.clone();
    }
    if let Some(listen) = &args.listen {
        config.listen.rpc_addr = listen.clone();
    }
    if let Some(workers) = args.workers {
        config.listen.workers = workers;
    }

    config.validate()?;
    Ok(config)
}
