//! Defensio wallet lifecycle CLI
//!
//! Registers generated mining wallets with the Defensio service and
//! consolidates their accumulated rights, one wallet at a time, with a
//! fixed pause between remote calls to respect the service's rate limit.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use defensio::cli::commands;
use defensio::config::Config;

/// Defensio DFO mining wallet lifecycle tool
#[derive(Parser)]
#[command(name = "defensio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "defensio.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the wallet directory layout
    Init,

    /// Register generated wallets with the mining service
    Register {
        /// Lowest wallet id to include (inclusive)
        #[arg(long)]
        from: Option<u32>,

        /// Highest wallet id to include (inclusive)
        #[arg(long)]
        to: Option<u32>,

        /// Re-register wallets that already hold a receipt
        #[arg(long)]
        force: bool,
    },

    /// Donate accumulated rights from registered wallets
    Donate {
        /// Lowest wallet id to include (inclusive)
        #[arg(long)]
        from: Option<u32>,

        /// Highest wallet id to include (inclusive)
        #[arg(long)]
        to: Option<u32>,

        /// Explicit recipient address (default: lowest wallet in range)
        #[arg(long)]
        address: Option<String>,
    },

    /// Show per-stage wallet counts and ledger size
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("defensio=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Init => commands::init(&config).await,
        Commands::Register { from, to, force } => {
            commands::register(&config, from, to, force).await
        }
        Commands::Donate { from, to, address } => {
            commands::donate(&config, from, to, address).await
        }
        Commands::Status => commands::status(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
