//! Storage traits for the order ledger and account balances
//!
//! The order processor only talks to storage through these traits, so any
//! backend that honours the consistency contract can be plugged in. The
//! in-memory implementations use DashMap; tests wrap them to inject failures.

use crate::types::{Account, LedgerEntry, Points, StorageError};

/// Per-client balances with keyed atomic updates
///
/// Updates for one client are linearizable; updates for different clients
/// must not block each other.
pub trait AccountStore: Send + Sync {
    /// Atomically add `delta` to the client's balance and return the new balance
    ///
    /// Creates the account if it does not exist yet. `delta` may be negative.
    fn apply_delta(&self, client_id: &str, delta: Points) -> Result<Points, StorageError>;

    /// Credit an order's accrual to the client exactly once
    ///
    /// Crediting an order that was already credited leaves the balance
    /// unchanged and returns it.
    fn credit_order(
        &self,
        client_id: &str,
        order_id: &str,
        accrual: Points,
    ) -> Result<Points, StorageError>;

    /// Undo a previous `credit_order`; a no-op if the order was never credited
    ///
    /// An account that only existed for reversed credits is removed, since
    /// accounts are created by the first successful order.
    fn reverse_order(&self, client_id: &str, order_id: &str) -> Result<Points, StorageError>;

    /// Forget the per-order credit record of a committed order
    ///
    /// Called once the ledger entry is `Committed`. After this the ledger,
    /// not the store, guarantees the order is never credited again, so a
    /// later `credit_order` for the same id would apply twice.
    fn settle_order(&self, client_id: &str, order_id: &str) -> Result<(), StorageError>;

    /// Current balance, or `None` if the client has no account yet
    fn balance(&self, client_id: &str) -> Result<Option<Points>, StorageError>;

    /// All accounts, in no particular order
    fn accounts(&self) -> Result<Vec<Account>, StorageError>;
}

/// Write-once record of claimed order ids
///
/// `reserve` is the single serialization point for order processing: it must
/// be an atomic insert-if-absent.
pub trait OrderLedger: Send + Sync {
    /// Claim `order_id`; returns `false` if it was already claimed by anyone
    fn reserve(&self, order_id: &str, client_id: &str) -> Result<bool, StorageError>;

    /// Write-ahead record of the computed accrual (`Reserved` -> `Pending`)
    fn record_accrual(&self, order_id: &str, accrual: Points) -> Result<(), StorageError>;

    /// Mark the order as fully applied (`Pending` -> `Committed`)
    fn finalize(&self, order_id: &str) -> Result<LedgerEntry, StorageError>;

    /// Mark an in-flight order as failed; the order id stays consumed
    fn mark_failed(&self, order_id: &str, reason: &str) -> Result<(), StorageError>;

    fn get(&self, order_id: &str) -> Result<Option<LedgerEntry>, StorageError>;

    /// Entries still `Reserved` or `Pending`
    fn in_flight(&self) -> Result<Vec<LedgerEntry>, StorageError>;
}
