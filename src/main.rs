//! Loyalty Engine CLI
//!
//! Replays a CSV command stream (client, mechanic and item rows) through the
//! loyalty engine and prints the final balances.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > balances.csv
//! cargo run -- --strategy sync commands.csv > balances.csv
//! cargo run -- --strategy async --max-concurrent 8 commands.csv > balances.csv
//! LOYALTY_LOG=debug cargo run -- --commit-retries 5 commands.csv
//! ```
//!
//! Balances go to stdout; logs go to stderr, filtered by `LOYALTY_LOG`
//! (default `info`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, output not writable, etc.)

use loyalty_engine::cli;
use loyalty_engine::strategy;
use std::process;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with the LOYALTY_LOG environment variable
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOYALTY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();

    let args = cli::parse_args();

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), config, args.to_commit_policy())
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!(error = %e, "Processing failed");
        process::exit(1);
    }
}
