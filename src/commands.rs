//! CLI command definitions
//!
//! Defines the clap commands for the wallet-bdd CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run feature files against the wallet
    Run {
        /// Feature files, or directories searched for `*.yaml` features
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Tag filter. Repeat to accept any of several tags; prefix with `~` to exclude
        /// e.g. --tags @Proof --tags ~@PerformanceTest
        #[arg(long, short)]
        tags: Vec<String>,

        /// Run against the simulated wallet and agents instead of Appium
        #[arg(long)]
        mock: bool,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,

        /// Also write a debug-level log to the platform log directory
        #[arg(long)]
        log_file: bool,
    },

    /// List the registered step definitions
    Steps {
        /// Only show definitions whose pattern contains this text
        filter: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a proof request fixture as it would be sent
    ProofRequest {
        /// Fixture name, without the `.json` extension
        name: String,

        /// Non-revocation interval, e.g. "last 10 minutes" or "-600:now"
        #[arg(long, short)]
        interval: Option<String>,
    },

    /// Show which credential the wallet should present for each requested attribute
    Reconcile {
        /// Proof request fixture name
        proof: String,

        /// Credential fixture names, in the order they were accepted
        #[arg(required = true)]
        credentials: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
