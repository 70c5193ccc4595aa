//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account-related types
//! - `mechanic`: Reward mechanics and their validation
//! - `order`: Orders, items, identifiers and ledger records
//! - `error`: Error types for the loyalty engine

pub mod account;
pub mod error;
pub mod mechanic;
pub mod order;

pub use account::Account;
pub use error::{ErrorKind, LoyaltyError, StorageError};
pub use mechanic::{Mechanic, MechanicRequest, RewardType};
pub use order::{
    ClientId, Item, LedgerEntry, LedgerState, Order, OrderId, OrderItems, OrderReceipt, Points,
};
