//! Error types for the loyalty engine
//!
//! Every outcome of the core is one of three kinds:
//!
//! - **InvalidInput**: malformed or out-of-range fields, detected before any mutation
//! - **Conflict**: a uniqueness violation (login, mechanic match, order id)
//! - **Internal**: a storage failure after an order id was reserved
//!
//! File and CSV errors only occur in the CLI pipeline and never reach the core.

use thiserror::Error;

/// Classification used by callers (and by the HTTP adapter) to branch on results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// HTTP status the transport adapter maps this kind to
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }
}

/// Main error type for the loyalty engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoyaltyError {
    /// A field failed validation; no state was changed
    #[error("Invalid {field}: {reason}")]
    InvalidInput {
        /// Name of the offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A unique key is already taken
    #[error("{entity} '{key}' already exists")]
    Conflict {
        /// What kind of record collided (client, mechanic, order)
        entity: String,
        /// The colliding key
        key: String,
    },

    /// Storage failed after the order id was consumed
    ///
    /// The order id stays reserved; resubmitting it yields `Conflict`.
    #[error("Internal error while processing order {order_id}: {message}")]
    Internal {
        /// The order whose commit failed
        order_id: String,
        /// Description of the underlying failure
        message: String,
    },

    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error occurred
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

impl LoyaltyError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        LoyaltyError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a Conflict error
    pub fn conflict(entity: &str, key: &str) -> Self {
        LoyaltyError::Conflict {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    /// Create an Internal error
    pub fn internal(order_id: &str, message: impl Into<String>) -> Self {
        LoyaltyError::Internal {
            order_id: order_id.to_string(),
            message: message.into(),
        }
    }

    /// Classify this error for callers
    ///
    /// Pipeline errors (file, I/O, CSV) are input problems from the caller's side.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoyaltyError::Conflict { .. } => ErrorKind::Conflict,
            LoyaltyError::Internal { .. } | LoyaltyError::IoError { .. } => ErrorKind::Internal,
            LoyaltyError::InvalidInput { .. }
            | LoyaltyError::FileNotFound { .. }
            | LoyaltyError::ParseError { .. } => ErrorKind::InvalidInput,
        }
    }
}

impl From<std::io::Error> for LoyaltyError {
    fn from(error: std::io::Error) -> Self {
        LoyaltyError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LoyaltyError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LoyaltyError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

/// Failure reported by a storage backend (ledger or account store)
///
/// The in-memory backends only fail on arithmetic overflow or a missing
/// ledger entry; other backends may fail for any reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("ledger entry for order {0} not found")]
    MissingEntry(String),

    #[error("ledger entry for order {order_id} is {state}, expected {expected}")]
    InvalidState {
        order_id: String,
        state: String,
        expected: String,
    },

    #[error("balance overflow for client {0}")]
    BalanceOverflow(String),
}

impl StorageError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}
