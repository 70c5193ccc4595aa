//! Thread-safe account balances
//!
//! `InMemoryAccountStore` keeps one `Account` per client in a `DashMap`.
//! Every mutation runs while holding the entry lock for that client, so
//! deltas for the same client are serialized and deltas for different
//! clients proceed in parallel (DashMap shards its locks).

use dashmap::DashMap;

use super::traits::AccountStore;
use crate::types::{Account, ClientId, Points, StorageError};

/// DashMap-backed account store
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    /// Account state by client id
    accounts: DashMap<ClientId, Account>,
}

impl InMemoryAccountStore {
    /// Empty store; accounts appear as orders are credited
    ///
    /// # Examples
    ///
    /// ```
    /// use loyalty_engine::core::{AccountStore, InMemoryAccountStore};
    ///
    /// let store = InMemoryAccountStore::new();
    /// assert_eq!(store.credit_order("alice", "X", 10).unwrap(), 10);
    /// assert_eq!(store.credit_order("alice", "X", 10).unwrap(), 10);
    ///
    /// // Reversing the only credit removes the account again
    /// store.reverse_order("alice", "X").unwrap();
    /// assert_eq!(store.balance("alice").unwrap(), None);
    /// ```
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Update an account using a closure
    ///
    /// The account is created if needed, and the closure runs while holding
    /// the lock on that client's entry.
    fn update<F>(&self, client_id: &str, f: F) -> Result<Points, StorageError>
    where
        F: FnOnce(&mut Account) -> Result<(), StorageError>,
    {
        let mut entry = self
            .accounts
            .entry(client_id.to_string())
            .or_insert_with(|| Account::new(client_id));
        f(entry.value_mut())?;
        Ok(entry.balance)
    }
}

fn add_checked(account: &Account, delta: Points) -> Result<Points, StorageError> {
    account
        .balance
        .checked_add(delta)
        .ok_or_else(|| StorageError::BalanceOverflow(account.client.clone()))
}

impl AccountStore for InMemoryAccountStore {
    fn apply_delta(&self, client_id: &str, delta: Points) -> Result<Points, StorageError> {
        self.update(client_id, |account| {
            account.balance = add_checked(account, delta)?;
            account.established = true;
            Ok(())
        })
    }

    fn credit_order(
        &self,
        client_id: &str,
        order_id: &str,
        accrual: Points,
    ) -> Result<Points, StorageError> {
        self.update(client_id, |account| {
            if account.has_credited(order_id) {
                return Ok(());
            }
            account.balance = add_checked(account, accrual)?;
            account.credited.insert(order_id.to_string(), accrual);
            Ok(())
        })
    }

    fn reverse_order(&self, client_id: &str, order_id: &str) -> Result<Points, StorageError> {
        let balance = {
            // Never create an account just to reverse nothing
            let Some(mut account) = self.accounts.get_mut(client_id) else {
                return Ok(0);
            };
            let Some(&accrual) = account.credited.get(order_id) else {
                return Ok(account.balance);
            };
            let negated = accrual
                .checked_neg()
                .ok_or_else(|| StorageError::BalanceOverflow(account.client.clone()))?;
            account.balance = add_checked(&account, negated)?;
            account.credited.remove(order_id);
            account.balance
        };

        // The entry lock is released above; the predicate re-checks under the
        // removal lock, so a credit that raced in keeps the account
        let removed = self.accounts.remove_if(client_id, |_, account| {
            !account.established && account.credited.is_empty()
        });
        Ok(if removed.is_some() { 0 } else { balance })
    }

    fn settle_order(&self, client_id: &str, order_id: &str) -> Result<(), StorageError> {
        if let Some(mut account) = self.accounts.get_mut(client_id) {
            account.credited.remove(order_id);
            account.established = true;
        }
        Ok(())
    }

    fn balance(&self, client_id: &str) -> Result<Option<Points>, StorageError> {
        Ok(self.accounts.get(client_id).map(|account| account.balance))
    }

    fn accounts(&self) -> Result<Vec<Account>, StorageError> {
        Ok(self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}
