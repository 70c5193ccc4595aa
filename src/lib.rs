//! Loyalty Engine Library
//! # Overview
//!
//! This library accrues loyalty points for customer orders. Reward mechanics
//! are matched against order lines, every order id is credited at most once,
//! and a CSV command stream can be replayed with a sync or an async strategy.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, Mechanic, Order, ledger entries, errors)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::processor`] - Order processing orchestration
//!   - [`core::accrual`] - Pure accrual computation
//!   - [`core::order_ledger`] - Write-once order id reservations
//!   - [`core::account_store`] - Per-client balances
//!   - [`core::mechanic_registry`] - Reward rules keyed by match key
//!   - [`core::service`] - The register client / register mechanic / submit order facade
//! - [`io`] - CSV command stream reading and balance output
//! - [`strategy`] - Runtime-selectable replay strategies
//!
//! # Reward Types
//!
//! - **Points** (`pt`): a fixed number of points for each matching order line
//! - **Percent** (`%`): a percentage of the whole order value, once per mechanic
//!
//! # Order Outcomes
//!
//! - Committed: the accrual was credited exactly once
//! - InvalidInput: rejected before any state was touched
//! - Conflict: the order id was already used
//! - Internal: storage failed after reservation; the order id stays consumed

pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{InMemoryLoyaltyService, LoyaltyService, OrderProcessor};
pub use io::write_balances_csv;
pub use types::{
    Account, ClientId, ErrorKind, Item, LoyaltyError, Mechanic, MechanicRequest, Order, OrderId,
    OrderReceipt, Points, RewardType,
};
