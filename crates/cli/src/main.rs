use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};
use tracing_subscriber::EnvFilter;
use watch_core::types::NetworkType;

mod commands;
use commands::{run_calendar, run_check, CalendarOptions, CheckOptions, OutputFormat, DEFAULT_API_URL};

#[derive(Parser)]
#[command(name = "upgrade-watch")]
#[command(about = "Upgrade Watch CLI - one-shot upgrade checks and calendar links for Cosmos networks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to UPGRADE_WATCH_CONFIG or config/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the upgrade detection once for a single network
    Check {
        /// Network name as it appears in the chain registry
        network: String,

        /// Look the network up under testnets/
        #[arg(long)]
        testnet: bool,

        /// Read a local chain-registry checkout instead of GitHub
        #[arg(long)]
        registry_dir: Option<PathBuf>,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print Google Calendar links for upgrades reported by a running server
    Calendar {
        #[arg(long, default_value = DEFAULT_API_URL)]
        api_url: String,

        /// Mainnets to include (comma separated, default all)
        #[arg(long, value_delimiter = ',')]
        mainnets: Vec<String>,

        /// Testnets to include (comma separated, default all)
        #[arg(long, value_delimiter = ',')]
        testnets: Vec<String>,

        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "warn,watch_core=debug,cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Check { network, testnet, registry_dir, json } => {
            let options = CheckOptions {
                network,
                network_type: if testnet { NetworkType::Testnet } else { NetworkType::Mainnet },
                config_path: cli.config,
                registry_dir,
                output: if json { OutputFormat::Json } else { OutputFormat::Table },
            };
            run_check(options).await?;
        }

        Commands::Calendar { api_url, mainnets, testnets, timeout } => {
            let options =
                CalendarOptions { api_url, mainnets, testnets, timeout: Duration::from_secs(timeout) };
            run_calendar(options).await?;
        }
    }

    Ok(())
}
