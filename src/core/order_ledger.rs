//! Thread-safe order ledger
//!
//! `InMemoryOrderLedger` stores one `LedgerEntry` per order id in a `DashMap`.
//! Reservation is an insert-if-absent on the entry API, which holds the shard
//! lock across the check and the insert, so two concurrent submissions of the
//! same order id can never both succeed.
//!
//! Entries are never removed: a reserved id stays consumed even when the
//! order later fails.

use dashmap::DashMap;

use super::traits::OrderLedger;
use crate::types::{LedgerEntry, LedgerState, OrderId, Points, StorageError};

/// DashMap-backed order ledger
#[derive(Debug, Default)]
pub struct InMemoryOrderLedger {
    entries: DashMap<OrderId, LedgerEntry>,
}

impl InMemoryOrderLedger {
    /// Empty ledger
    ///
    /// # Examples
    ///
    /// ```
    /// use loyalty_engine::core::{InMemoryOrderLedger, OrderLedger};
    ///
    /// let ledger = InMemoryOrderLedger::new();
    /// assert!(ledger.reserve("X", "alice").unwrap());
    /// assert!(!ledger.reserve("X", "bob").unwrap());
    /// ```
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a state transition to an existing entry
    ///
    /// The closure runs under the entry's lock and may reject the transition.
    fn transition<F>(&self, order_id: &str, f: F) -> Result<LedgerEntry, StorageError>
    where
        F: FnOnce(&mut LedgerEntry) -> Result<(), StorageError>,
    {
        match self.entries.get_mut(order_id) {
            Some(mut entry) => {
                f(entry.value_mut())?;
                Ok(entry.value().clone())
            }
            None => Err(StorageError::MissingEntry(order_id.to_string())),
        }
    }
}

fn invalid_state(entry: &LedgerEntry, expected: &str) -> StorageError {
    StorageError::InvalidState {
        order_id: entry.order_id.clone(),
        state: entry.state.name().to_string(),
        expected: expected.to_string(),
    }
}

impl OrderLedger for InMemoryOrderLedger {
    fn reserve(&self, order_id: &str, client_id: &str) -> Result<bool, StorageError> {
        let mut reserved = false;
        self.entries.entry(order_id.to_string()).or_insert_with(|| {
            reserved = true;
            LedgerEntry::reserved(order_id, client_id)
        });
        Ok(reserved)
    }

    fn record_accrual(&self, order_id: &str, accrual: Points) -> Result<(), StorageError> {
        self.transition(order_id, |entry| match entry.state {
            LedgerState::Reserved => {
                entry.state = LedgerState::Pending { accrual };
                Ok(())
            }
            _ => Err(invalid_state(entry, "reserved")),
        })
        .map(|_| ())
    }

    fn finalize(&self, order_id: &str) -> Result<LedgerEntry, StorageError> {
        self.transition(order_id, |entry| match entry.state {
            LedgerState::Pending { accrual } => {
                entry.state = LedgerState::Committed { accrual };
                Ok(())
            }
            _ => Err(invalid_state(entry, "pending")),
        })
    }

    fn mark_failed(&self, order_id: &str, reason: &str) -> Result<(), StorageError> {
        self.transition(order_id, |entry| match entry.state {
            LedgerState::Reserved | LedgerState::Pending { .. } => {
                entry.state = LedgerState::Failed {
                    accrual: entry.accrual(),
                    reason: reason.to_string(),
                };
                Ok(())
            }
            _ => Err(invalid_state(entry, "reserved or pending")),
        })
        .map(|_| ())
    }

    fn get(&self, order_id: &str) -> Result<Option<LedgerEntry>, StorageError> {
        Ok(self.entries.get(order_id).map(|entry| entry.value().clone()))
    }

    fn in_flight(&self) -> Result<Vec<LedgerEntry>, StorageError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| {
                matches!(
                    entry.value().state,
                    LedgerState::Reserved | LedgerState::Pending { .. }
                )
            })
            .map(|entry| entry.value().clone())
            .collect())
    }
}
