use crate::core::CommitPolicy;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay a loyalty command stream and print client balances
#[derive(Parser, Debug)]
#[command(name = "loyalty-engine")]
#[command(about = "Replay a loyalty command stream and print client balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing client, mechanic and item rows
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Processing strategy to use
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for sequential or 'async' for concurrent order submission"
    )]
    pub strategy: StrategyType,

    /// Number of commands read per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands read per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of orders in flight (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of orders processed concurrently (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,

    /// Retries for each storage step of an order commit
    #[arg(
        long = "commit-retries",
        value_name = "COUNT",
        help = "Retries per commit step on transient storage failures (default: 3, 0 disables)"
    )]
    pub commit_retries: Option<usize>,
}

/// Available processing strategies
#[derive(Clone, Debug, PartialEq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent.unwrap_or(default.max_concurrent),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create a CommitPolicy from CLI arguments
    pub fn to_commit_policy(&self) -> CommitPolicy {
        match self.commit_retries {
            Some(retries) => CommitPolicy::new(retries),
            None => CommitPolicy::default(),
        }
    }
}
