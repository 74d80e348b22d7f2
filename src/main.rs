//! AutoML Orchestrator - command-line entry point

use clap::Parser;
use colored::*;
use automl_orchestrator::cli::{self, Cli};

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automl_orchestrator=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(err) = cli::run(&cli) {
        eprintln!("  {} {:#}", "error:".truecolor(235, 100, 100).bold(), err);
        std::process::exit(1);
    }
}
