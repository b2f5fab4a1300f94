//! wallet-bdd - behavioural end-to-end tests for mobile identity wallets
//!
//! Runs YAML feature files against a wallet app driven through Appium, with
//! issuer and verifier agents reached over their test backchannels.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use wallet_bdd::common::logging;
use wallet_bdd::{cli, commands};

#[derive(Parser)]
#[command(name = "wallet-bdd", about = "BDD end-to-end tests for identity wallets")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so the run log is flushed
    let log_guard = match &cli.command {
        Commands::Run { log_file: true, .. } => logging::init_run(None).map(|(path, guard)| {
            eprintln!("Logging to {}", path.display());
            guard
        }),
        _ => {
            logging::init_cli();
            None
        }
    };

    if let Err(e) = cli::dispatch(cli.command, cli.config.as_deref()).await {
        eprintln!("Error: {e}");
        drop(log_guard);
        std::process::exit(1);
    }
}
