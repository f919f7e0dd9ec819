//! wirey — publish and discover mesh peers through Vault.
//!
//! Startup: load config (defaults → YAML file → CLI flags) → connect to Vault
//! and make sure the `wirey/` mount exists → run the requested command.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};

use wirey::config::Config;
use wirey::peer::{decode_key, PeerRecord};
use wirey::store::VaultClient;
use wirey::{Backend, Peer, VaultBackend};

#[derive(Parser)]
#[command(name = "wirey", version, about = "Vault-backed peer directory for mesh interfaces")]
struct Cli {
    /// Path to YAML config file (default: ./wirey.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Vault address (default: $VAULT_ADDR)
    #[arg(long)]
    vault_addr: Option<String>,

    /// Interface scope to operate on
    #[arg(long, default_value = "wg0")]
    scope: String,

    /// Timeout in seconds for each Vault request
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file and exit
    InitConfig {
        /// Destination (default: ./wirey.yaml)
        path: Option<PathBuf>,
    },
    /// Ensure the directory mount exists
    Bootstrap,
    /// Publish this node's record in the scope
    Join {
        /// Base64 public key
        #[arg(long)]
        public_key: String,
        /// Mesh-internal address
        #[arg(long)]
        ip: IpAddr,
        /// Advertised host:port
        #[arg(long)]
        endpoint: String,
    },
    /// Print every peer in the scope as JSON
    Peers,
}

/// Build the final Config by merging: defaults -> YAML file -> CLI overrides.
fn build_config(cli: &Cli, matches: &clap::ArgMatches) -> anyhow::Result<Config> {
    use clap::parser::ValueSource;

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = match Config::load_from_file(&config_path)? {
        Some(file_config) => {
            tracing::info!(path = %config_path.display(), "loaded config file");
            file_config
        }
        None => {
            tracing::debug!(path = %config_path.display(), "no config file found, using defaults");
            Config::default()
        }
    };

    if let Some(ref addr) = cli.vault_addr {
        config.vault_addr = Some(addr.clone());
    }
    if matches.value_source("scope") == Some(ValueSource::CommandLine) {
        config.scope = cli.scope.clone();
    }
    if let Some(timeout) = cli.timeout_secs {
        config.timeout_secs = timeout;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wirey=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches_mut(&mut matches)?;

    if let Command::InitConfig { ref path } = cli.command {
        let path = path.clone().unwrap_or_else(Config::default_path);
        Config::write_default_config(&path)?;
        println!("Config written to {}", path.display());
        return Ok(());
    }

    let config = build_config(&cli, &matches)?;

    match cli.command {
        Command::InitConfig { .. } => {}
        Command::Bootstrap => {
            connect(&config).await?;
            println!("wirey/ mount ready");
        }
        Command::Join {
            public_key,
            ip,
            endpoint,
        } => {
            let key = decode_key(&public_key).context("public key is not valid base64")?;
            let peer = Peer::new(key, ip, endpoint);
            connect(&config).await?.join(&config.scope, &peer).await?;
            tracing::info!(scope = %config.scope, public_key = %public_key, "joined");
        }
        Command::Peers => {
            let peers = connect(&config).await?.get_peers(&config.scope).await?;
            let records: Vec<PeerRecord> = peers.iter().map(PeerRecord::from).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}

/// Open the Vault client and make sure the directory mount exists.
async fn connect(config: &Config) -> anyhow::Result<VaultBackend> {
    let client = VaultClient::new(config.vault_config())?;
    tracing::info!(
        address = %client.address(),
        scope = %config.scope,
        sources = %config.describe_sources(),
        "connecting"
    );
    VaultBackend::with_client(client)
        .await
        .context("failed to prepare the wirey mount")
}
