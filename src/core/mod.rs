//! Core business logic module
//!
//! This module contains the loyalty engine components:
//! - `traits` - Storage abstractions for the ledger and account balances
//! - `account_store` - Per-client balances with keyed atomic updates
//! - `order_ledger` - Write-once order id reservations and their outcome
//! - `mechanic_registry` - Reward rules keyed by match key
//! - `client_registry` - Registered client logins
//! - `accrual` - Pure accrual computation
//! - `processor` - Order processing orchestration
//! - `service` - Facade exposing the three public operations

pub mod account_store;
pub mod accrual;
pub mod client_registry;
pub mod mechanic_registry;
pub mod order_ledger;
pub mod processor;
pub mod service;
pub mod traits;

pub use account_store::InMemoryAccountStore;
pub use accrual::compute_accrual;
pub use client_registry::ClientRegistry;
pub use mechanic_registry::{MechanicRegistry, MechanicSnapshot};
pub use order_ledger::InMemoryOrderLedger;
pub use processor::{CommitPolicy, OrderProcessor, RecoveryReport};
pub use service::{InMemoryLoyaltyService, LoyaltyService};
pub use traits::{AccountStore, OrderLedger};
