//! Order and ledger types for the loyalty engine
//!
//! This module defines order submissions, their line items, and the ledger
//! records that track each order id from reservation to commit.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Client identifier (the login)
pub type ClientId = String;

/// Order identifier, unique across all clients
pub type OrderId = String;

/// Loyalty points balance or delta
pub type Points = i64;

/// One order line
///
/// `price` is in currency minor units. Both `price` and `count` must be
/// positive; that is checked by the order processor, not at parse time, so
/// that a bad line rejects the whole order with a typed error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Match key of the item; numeric ids are kept as their decimal text
    #[serde(deserialize_with = "item_id_from_number_or_string")]
    pub id: String,
    pub price: i64,
    pub count: i64,
}

impl Item {
    pub fn new(id: impl Into<String>, price: i64, count: i64) -> Self {
        Self {
            id: id.into(),
            price,
            count,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawItemId {
    Number(u64),
    Text(String),
}

fn item_id_from_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawItemId::deserialize(deserializer)? {
        RawItemId::Number(n) => n.to_string(),
        RawItemId::Text(s) => s,
    })
}

/// Order body as sent by clients: `{"items": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderItems {
    #[serde(default)]
    pub items: Vec<Item>,
}

/// An order submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub items: Vec<Item>,
}

impl Order {
    pub fn new(order_id: impl Into<OrderId>, client_id: impl Into<ClientId>, items: Vec<Item>) -> Self {
        Self {
            order_id: order_id.into(),
            client_id: client_id.into(),
            items,
        }
    }
}

/// Lifecycle of a ledger entry
///
/// `Reserved` and `Pending` are in-flight states. `Pending` is the
/// write-ahead record: the accrual is known but may not have reached the
/// account yet. `Committed` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerState {
    Reserved,
    Pending { accrual: Points },
    Committed { accrual: Points },
    Failed { accrual: Option<Points>, reason: String },
}

impl LedgerState {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerState::Reserved => "reserved",
            LedgerState::Pending { .. } => "pending",
            LedgerState::Committed { .. } => "committed",
            LedgerState::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for LedgerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Write-once record of an order id that has been claimed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub state: LedgerState,
}

impl LedgerEntry {
    pub fn reserved(order_id: &str, client_id: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            client_id: client_id.to_string(),
            state: LedgerState::Reserved,
        }
    }

    /// The accrual recorded for this order, once it is known
    pub fn accrual(&self) -> Option<Points> {
        match &self.state {
            LedgerState::Reserved => None,
            LedgerState::Pending { accrual } | LedgerState::Committed { accrual } => Some(*accrual),
            LedgerState::Failed { accrual, .. } => *accrual,
        }
    }
}

/// Outcome of a committed order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub accrual: Points,
    /// Client balance right after this order was credited
    pub balance: Points,
}
