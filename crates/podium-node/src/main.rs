use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use podium_node::{api, config::NodeConfig, demo, logging, node::PodiumNode};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "./podium.toml";

#[derive(Parser)]
#[command(name = "podium")]
#[command(about = "Podium - contest scoring and certification service", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the certification service
    Start {
        /// Data directory for snapshots
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Address to bind the HTTP API to
        #[arg(long)]
        host: Option<String>,

        /// Port for HTTP API
        #[arg(long)]
        api_port: Option<u16>,
    },

    /// Write a default configuration file
    Init {
        /// Output file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run a scripted category through the whole workflow in memory
    Demo,
}

fn load_config(path: Option<&Path>) -> Result<NodeConfig> {
    match path {
        Some(path) => NodeConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            NodeConfig::from_file(Path::new(DEFAULT_CONFIG))
        }
        None => Ok(NodeConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let logging_config = load_config(cli.config.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();

    if let Err(e) = logging::init_logging(&logging_config, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        let log_level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| format!("podium={}", log_level)),
            ))
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Commands::Start {
            data_dir,
            host,
            api_port,
        } => {
            // CLI args > env vars > config file > defaults
            let mut config = load_config(cli.config.as_deref())?;
            config.apply_env_overrides();
            if let Some(data_dir) = data_dir {
                config.node.data_dir = data_dir;
            }
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = api_port {
                config.api.port = port;
            }

            info!(
                version = env!("CARGO_PKG_VERSION"),
                data_dir = ?config.node.data_dir,
                api_port = config.api.port,
                "Starting podium node"
            );

            let node = PodiumNode::new(config.clone()).await?;

            let api_handle = if config.api.enabled {
                Some(api::start_api_server(node.clone(), &config.api.host, config.api.port).await?)
            } else {
                warn!("HTTP API disabled in configuration");
                None
            };

            info!("Node ready");
            tokio::signal::ctrl_c().await?;
            info!("Shutting down gracefully");

            if let Some(handle) = api_handle {
                handle.abort();
            }
            node.shutdown().await?;
            Ok(())
        }

        Commands::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists; pass --force to overwrite",
                    output.display()
                );
            }
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            NodeConfig::default().save_to_file(&output)?;
            info!(path = ?output, "Configuration written");
            Ok(())
        }

        Commands::Demo => {
            let winners = demo::run_demo().await?;
            println!("{}", serde_json::to_string_pretty(&winners)?);
            Ok(())
        }
    }
}
