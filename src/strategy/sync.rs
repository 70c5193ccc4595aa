//! Synchronous processing strategy
//!
//! Replays the command stream one command at a time in file order. It
//! delegates:
//! - CSV parsing and order assembly to `SyncReader` (iterator interface)
//! - Order processing to `LoyaltyService` (business logic)
//! - CSV output to `csv_format::write_balances_csv` (format handling)
//!
//! Memory usage is O(accounts + order ids + mechanics), not O(file size):
//! rows are streamed and only the order being assembled is buffered.

use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::core::{CommitPolicy, InMemoryLoyaltyService};
use crate::io::sync_reader::SyncReader;
use crate::strategy::{execute, write_output, ProcessingStrategy};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use loyalty_engine::core::CommitPolicy;
/// use loyalty_engine::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::io;
///
/// let strategy = SyncProcessingStrategy::new(CommitPolicy::default());
/// let mut output = io::stdout();
///
/// strategy.process(Path::new("commands.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    policy: CommitPolicy,
}

impl SyncProcessingStrategy {
    /// # Arguments
    ///
    /// * `policy` - Retry budget for the commit steps of each order
    pub fn new(policy: CommitPolicy) -> Self {
        Self { policy }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Replay the command stream in file order and write the final balances
    ///
    /// # Arguments
    ///
    /// * `input_path` - CSV command stream
    /// * `output` - Destination for the `client,balance` CSV
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every command was executed; rejected ones were logged
    /// * `Err(String)` - The input could not be opened or the output written
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let service = InMemoryLoyaltyService::in_memory(self.policy.clone());
        let reader = SyncReader::new(input_path)?;

        let mut commands = 0usize;
        for command in reader {
            execute(&service, command);
            commands += 1;
        }
        info!(commands, strategy = "sync", "Command stream processed");

        write_output(&service, output)
    }
}
