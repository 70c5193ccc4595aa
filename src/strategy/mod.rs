//! Processing strategy module for command stream replay
//!
//! This module defines the Strategy pattern for complete processing pipelines,
//! encompassing both CSV parsing and the loyalty service. This allows different
//! processing implementations (sequential, concurrent) to be selected at runtime.
//!
//! Both strategies produce identical output for the same input: registrations
//! are applied in file order, and every order observes exactly the mechanics
//! registered above it in the file.

use std::io::Write;
use std::path::Path;

use tracing::{error, warn};

use crate::cli::StrategyType;
use crate::core::{AccountStore, CommitPolicy, InMemoryLoyaltyService};
use crate::io::csv_format::{write_balances_csv, Command};
use crate::types::{ErrorKind, LoyaltyError};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete command stream pipelines
///
/// Each strategy reads commands from the specified CSV file, applies them to a
/// fresh in-memory loyalty service and writes the final balances to output.
pub trait ProcessingStrategy: Send + Sync {
    /// Process commands from input file and write balances to output
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened (file not found, permission denied)
    /// - The async runtime cannot be created
    /// - Output cannot be written
    ///
    /// Individual command failures are logged and do not cause this method to
    /// return an error. Processing continues with the next command.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a processing strategy based on the specified strategy type
///
/// `config` only applies to the async strategy; `policy` governs commit
/// retries for both.
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
    policy: CommitPolicy,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(policy)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config, policy))
        }
    }
}

/// Apply one command to the service, logging any failure
pub(crate) fn execute(service: &InMemoryLoyaltyService, command: Command) {
    match command {
        Command::RegisterClient { login } => {
            if let Err(e) = service.register_client(&login) {
                log_failure("client", &login, &e);
            }
        }
        Command::RegisterMechanic(request) => {
            let match_key = request.match_key.clone();
            if let Err(e) = service.register_mechanic(request) {
                log_failure("mechanic", &match_key, &e);
            }
        }
        Command::SubmitOrder(order) => {
            let order_id = order.order_id.clone();
            if let Err(e) = service.processor().submit(order) {
                log_failure("order", &order_id, &e);
            }
        }
    }
}

fn log_failure(entity: &str, key: &str, e: &LoyaltyError) {
    match e.kind() {
        ErrorKind::Internal => error!(entity, key, error = %e, "Command failed"),
        ErrorKind::InvalidInput | ErrorKind::Conflict => {
            warn!(entity, key, error = %e, "Command rejected")
        }
    }
}

/// Write the final balances of every account the service credited
pub(crate) fn write_output(
    service: &InMemoryLoyaltyService,
    output: &mut dyn Write,
) -> Result<(), String> {
    let accounts = service
        .processor()
        .accounts()
        .accounts()
        .map_err(|e| format!("Failed to read balances: {}", e))?;

    write_balances_csv(&accounts, output)
}
