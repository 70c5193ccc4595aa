//! Account-related types for the loyalty engine
//!
//! This module defines the Account structure holding a client's points balance.

use std::collections::HashMap;

use super::order::{ClientId, OrderId, Points};

/// Client loyalty account
///
/// Created lazily when an order is credited. Besides the balance it remembers
/// which in-flight orders were credited and by how much, so that crediting the
/// same order twice is a no-op and a credit can be reversed.
///
/// An order's entry in `credited` is dropped once the order is settled (its
/// ledger entry committed); from then on the ledger alone prevents a second
/// credit. Memory is therefore O(orders in flight) per account, not
/// O(orders ever credited).
///
/// An account that is not `established` exists only because of in-flight
/// credits; if they are all reversed the account is removed again.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// The client this account belongs to
    pub client: ClientId,

    /// Current points balance
    pub balance: Points,

    /// In-flight orders credited to this account and the delta each one applied
    pub credited: HashMap<OrderId, Points>,

    /// Whether an order was settled or a delta applied directly
    pub established: bool,
}

impl Account {
    /// Create a new account with a zero balance
    pub fn new(client: impl Into<ClientId>) -> Self {
        Account {
            client: client.into(),
            balance: 0,
            credited: HashMap::new(),
            established: false,
        }
    }

    /// Whether the given order has been credited to this account
    pub fn has_credited(&self, order_id: &str) -> bool {
        self.credited.contains_key(order_id)
    }
}
