//! etcd-gateway: command-line access to an etcd v3 JSON gateway
//!
//! Prints each reply as JSON on stdout. Logs go to stderr.
//!
//! ## Configuration
//! - `--config <file>` or ETCD_GATEWAY_CONFIG: YAML configuration file
//! - ETCD_GATEWAY__HOST, ETCD_GATEWAY__PORT, ...: per-field overrides
//! - ETCD_GATEWAY_LOG: tracing filter (default: info)

use clap::{Parser, Subcommand};
use tracing::info;

use etcd_gateway::bootstrap::init_tracing;
use etcd_gateway::{Config, Etcd, Params, Reply};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, short)]
    config: Option<String>,

    /// Strip envelopes and flatten key/value records.
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a key, or every key when none is given.
    Get { key: Option<String> },
    /// Write a key.
    Put {
        key: String,
        value: String,
        /// Attach the key to this lease.
        #[arg(long)]
        lease: Option<i64>,
    },
    /// Delete a key, returning the removed pairs.
    Del { key: String },
    /// Read every key under a prefix.
    Prefix { prefix: String },
    /// Grant a lease with the given TTL in seconds.
    Grant { ttl: i64 },
    /// Revoke a lease and its keys.
    Revoke { id: i64 },
    /// Refresh a lease once.
    KeepAlive { id: i64 },
    /// List roles.
    Roles,
    /// List users.
    Users,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.pretty {
        config = config.with_pretty(true);
    }

    let client = Etcd::new(config).client()?;
    info!(host = %client.config().host(), port = client.config().port(), "etcd-gateway ready");

    let reply = match cli.command {
        Command::Get { key: Some(key) } => client.get(key, None).await?,
        Command::Get { key: None } => client.get_all_keys().await?,
        Command::Put { key, value, lease } => {
            let options = lease.map(|id| Params::new().with("lease", id));
            client.put(key, value, options).await?
        }
        Command::Del { key } => {
            client
                .del(key, Some(Params::new().with("prev_kv", true)))
                .await?
        }
        Command::Prefix { prefix } => client.get_keys_with_prefix(prefix).await?,
        Command::Grant { ttl } => Reply::Body(client.grant(ttl, 0).await?),
        Command::Revoke { id } => Reply::Body(client.revoke(id).await?),
        Command::KeepAlive { id } => Reply::Body(client.keep_alive(id).await?),
        Command::Roles => client.role_list().await?,
        Command::Users => client.user_list().await?,
    };

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
