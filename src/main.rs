mod config;
mod connection;
mod direct_connection;
mod error;
mod registrar;
mod uri;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use connection::ClientRegistry;
use registrar::Registrar;

const PING_TIMEOUT_SECS: u64 = 30;

/// Builds MongoDB connection URIs from a host table and registers named connections.
#[derive(Parser)]
#[command(name = "mongo-registrar")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Register MongoDB connections from a host configuration table", long_about = None)]
struct Cli {
    /// Path to the configuration file (defaults to <config dir>/mongo-registrar/config.yaml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List configured hosts
    Hosts,
    /// Print the connection URI for a host and database
    Uri {
        host: String,
        db_name: String,
        /// Print the password instead of redacting it
        #[arg(long)]
        show_password: bool,
    },
    /// Register a single connection
    Connect {
        host: String,
        db_name: String,
        /// Alias to register under (defaults to the database name)
        #[arg(long)]
        alias: Option<String>,
        /// Ping the database after registering
        #[arg(long)]
        ping: bool,
    },
    /// Register the features and mapping connections for a host
    Init {
        host: String,
        /// Ping each database after registering
        #[arg(long)]
        ping: bool,
    },
}

async fn ping_all(registry: &ClientRegistry) -> Result<()> {
    for alias in registry.list_aliases() {
        let Some(conn) = registry.get(&alias) else {
            continue;
        };
        conn.ping(PING_TIMEOUT_SECS).await?;
        tracing::info!(
            "Connection '{}' is reachable at {}",
            conn.alias(),
            conn.uri()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mongo_registrar=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (config, config_file) = config::Config::load(cli.config.as_deref())?;
    tracing::info!("Configuration loaded from {:?}", config_file);
    tracing::info!("Configured hosts: {}", config.hosts.len());

    let mut registry = ClientRegistry::new();

    match cli.command {
        Command::Hosts => {
            for (key, host) in &config.hosts {
                println!(
                    "{key}\t{}{}@{}",
                    host.mongo_base,
                    host.user,
                    uri::network_location(host)
                );
            }
        }
        Command::Uri {
            host,
            db_name,
            show_password,
        } => {
            let uri = Registrar::new(&config, &mut registry).uri(&host, &db_name)?;
            if show_password {
                println!("{}", uri.as_str());
            } else {
                println!("{uri}");
            }
        }
        Command::Connect {
            host,
            db_name,
            alias,
            ping,
        } => {
            Registrar::new(&config, &mut registry).connect(&host, &db_name, alias.as_deref())?;
            if ping {
                ping_all(&registry).await?;
            }
        }
        Command::Init { host, ping } => {
            Registrar::new(&config, &mut registry).initialize(&host)?;
            if ping {
                ping_all(&registry).await?;
            }
        }
    }

    if !registry.is_empty() {
        tracing::info!(
            "Registered {} connections: [{}]",
            registry.len(),
            registry.list_aliases().join(", ")
        );
    }

    Ok(())
}
