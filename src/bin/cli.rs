//! chargestore CLI Client
//!
//! Calls the replicator endpoint of a node. Records are read and written
//! as JSON.

use std::time::Duration;

use chargestore::connection::RpcClient;
use chargestore::entities::{
    Account, ActionProfile, ActionTriggers, Destination, Filter, RatingProfile,
    ReverseDestination, StatQueue, StatQueueProfile, Threshold, ThresholdProfile, Timing,
};
use chargestore::network::TcpClient;
use chargestore::replicator::{self, Action, ApiOpts, ArgWithApiOpts};
use chargestore::storage::marshal;
use chargestore::{ChargeError, Entity, ItemType, Result};
use clap::{Parser, Subcommand};

/// chargestore CLI
#[derive(Parser, Debug)]
#[command(name = "chargestore-cli")]
#[command(about = "CLI for a chargestore node")]
struct Args {
    /// Node address
    #[arg(short, long, default_value = "127.0.0.1:2012")]
    server: String,

    /// Reply timeout in milliseconds
    #[arg(short, long, default_value = "2000")]
    timeout_ms: u64,

    /// API key sent with every call
    #[arg(long)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the node
    Ping,

    /// Get a record, e.g. `get accounts vdf:broker`
    Get {
        /// Item type (`*accounts`, `accounts` or `acc_`)
        item: ItemType,

        /// Record key
        key: String,
    },

    /// Set a record from JSON
    Set {
        item: ItemType,

        /// The record as JSON (a destination for `reverse_destinations`)
        json: String,
    },

    /// Remove a record
    Remove {
        item: ItemType,

        /// Record key (a destination JSON for `reverse_destinations`)
        key: String,
    },
}

struct Cli {
    client: TcpClient,
    timeout: Duration,
    api_opts: ApiOpts,
}

impl Cli {
    fn call(&self, method: &str, args: &[u8]) -> Result<Vec<u8>> {
        self.client.call(method, args, self.timeout)
    }

    fn ping(&self) -> Result<String> {
        let reply = self.call(replicator::PING, &marshal::encode(&())?)?;
        marshal::decode(&reply)
    }

    fn get<T: Entity>(&self, item: ItemType, key: &str) -> Result<String> {
        let method = replicator::method_name(Action::Get, item)?;
        let arg = ArgWithApiOpts::new(key.to_string(), self.api_opts.clone());
        let reply = self.call(&method, &marshal::encode(&arg)?)?;
        let value: T = marshal::decode(&reply)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }

    fn set<T: Entity>(&self, item: ItemType, json: &str) -> Result<String> {
        let value: T = serde_json::from_str(json)?;
        let method = replicator::method_name(Action::Set, item)?;
        let arg = ArgWithApiOpts::new(value, self.api_opts.clone());
        let reply = self.call(&method, &marshal::encode(&arg)?)?;
        marshal::decode(&reply)
    }

    fn remove(&self, item: ItemType, key: &str) -> Result<String> {
        let method = replicator::method_name(Action::Remove, item)?;
        let args = if item == ItemType::ReverseDestinations {
            let destination: Destination = serde_json::from_str(key)?;
            marshal::encode(&ArgWithApiOpts::new(destination, self.api_opts.clone()))?
        } else {
            marshal::encode(&ArgWithApiOpts::new(key.to_string(), self.api_opts.clone()))?
        };
        let reply = self.call(&method, &args)?;
        marshal::decode(&reply)
    }
}

fn run(cli: &Cli, command: Commands) -> Result<String> {
    match command {
        Commands::Ping => cli.ping(),
        Commands::Get { item, key } => match item {
            ItemType::Destinations => cli.get::<Destination>(item, &key),
            ItemType::ReverseDestinations => cli.get::<ReverseDestination>(item, &key),
            ItemType::Accounts => cli.get::<Account>(item, &key),
            ItemType::Filters => cli.get::<Filter>(item, &key),
            ItemType::Thresholds => cli.get::<Threshold>(item, &key),
            ItemType::ThresholdProfiles => cli.get::<ThresholdProfile>(item, &key),
            ItemType::StatQueues => cli.get::<StatQueue>(item, &key),
            ItemType::StatQueueProfiles => cli.get::<StatQueueProfile>(item, &key),
            ItemType::Timings => cli.get::<Timing>(item, &key),
            ItemType::ActionTriggers => cli.get::<ActionTriggers>(item, &key),
            ItemType::RatingProfiles => cli.get::<RatingProfile>(item, &key),
            ItemType::ActionProfiles => cli.get::<ActionProfile>(item, &key),
            ItemType::ReplicationHosts => Err(not_remote(item)),
        },
        Commands::Set { item, json } => match item {
            ItemType::Destinations | ItemType::ReverseDestinations => {
                cli.set::<Destination>(item, &json)
            }
            ItemType::Accounts => cli.set::<Account>(item, &json),
            ItemType::Filters => cli.set::<Filter>(item, &json),
            ItemType::Thresholds => cli.set::<Threshold>(item, &json),
            ItemType::ThresholdProfiles => cli.set::<ThresholdProfile>(item, &json),
            ItemType::StatQueues => cli.set::<StatQueue>(item, &json),
            ItemType::StatQueueProfiles => cli.set::<StatQueueProfile>(item, &json),
            ItemType::Timings => cli.set::<Timing>(item, &json),
            ItemType::ActionTriggers => cli.set::<ActionTriggers>(item, &json),
            ItemType::RatingProfiles => cli.set::<RatingProfile>(item, &json),
            ItemType::ActionProfiles => cli.set::<ActionProfile>(item, &json),
            ItemType::ReplicationHosts => Err(not_remote(item)),
        },
        Commands::Remove { item, key } => cli.remove(item, &key),
    }
}

fn not_remote(item: ItemType) -> ChargeError {
    ChargeError::InvalidKey(format!("{} has no replicator methods", item))
}

fn main() {
    let args = Args::parse();

    let cli = Cli {
        client: TcpClient::new(args.server.clone()),
        timeout: Duration::from_millis(args.timeout_ms),
        api_opts: ApiOpts {
            api_key: args.api_key.clone(),
            ..Default::default()
        },
    };

    match run(&cli, args.command) {
        Ok(output) => println!("{}", output),
        Err(ChargeError::NotFound) => {
            eprintln!("(not found)");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}
