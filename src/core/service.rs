//! Loyalty service facade
//!
//! Bundles the client registry, mechanic registry and order processor behind
//! the three operations a transport adapter exposes:
//!
//! | Operation          | Errors                                   |
//! |--------------------|------------------------------------------|
//! | `register_client`  | InvalidInput, Conflict                   |
//! | `register_mechanic`| InvalidInput, Conflict                   |
//! | `submit_order`     | InvalidInput, Conflict, Internal         |
//!
//! The adapter maps `ErrorKind` to status codes via `ErrorKind::status_code`.

use std::sync::Arc;

use super::account_store::InMemoryAccountStore;
use super::client_registry::ClientRegistry;
use super::mechanic_registry::MechanicRegistry;
use super::order_ledger::InMemoryOrderLedger;
use super::processor::{CommitPolicy, OrderProcessor};
use super::traits::{AccountStore, OrderLedger};
use crate::types::{Item, LoyaltyError, Mechanic, MechanicRequest, Order, OrderReceipt};

/// Service backed by the in-memory stores
pub type InMemoryLoyaltyService = LoyaltyService<InMemoryAccountStore, InMemoryOrderLedger>;

/// The loyalty service: client registration, mechanic registration and
/// order submission over shared stores
///
/// Cloning is cheap; clones share every store.
#[derive(Debug)]
pub struct LoyaltyService<A, L> {
    clients: Arc<ClientRegistry>,
    processor: OrderProcessor<A, L>,
}

impl<A, L> Clone for LoyaltyService<A, L> {
    fn clone(&self) -> Self {
        Self {
            clients: Arc::clone(&self.clients),
            processor: self.processor.clone(),
        }
    }
}

impl InMemoryLoyaltyService {
    /// Fresh service with empty in-memory stores
    ///
    /// # Examples
    ///
    /// ```
    /// use loyalty_engine::core::{CommitPolicy, InMemoryLoyaltyService};
    ///
    /// let service = InMemoryLoyaltyService::in_memory(CommitPolicy::default());
    /// assert!(service.clients().is_empty());
    /// ```
    pub fn in_memory(policy: CommitPolicy) -> Self {
        LoyaltyService::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryOrderLedger::new()),
            policy,
        )
    }
}

impl<A: AccountStore, L: OrderLedger> LoyaltyService<A, L> {
    /// Build a service over the given stores with empty registries
    ///
    /// # Arguments
    ///
    /// * `accounts` - Balance store
    /// * `ledger` - Order id ledger
    /// * `policy` - Retry budget for commit steps
    pub fn new(accounts: Arc<A>, ledger: Arc<L>, policy: CommitPolicy) -> Self {
        let mechanics = Arc::new(MechanicRegistry::new());
        Self {
            clients: Arc::new(ClientRegistry::new()),
            processor: OrderProcessor::new(accounts, ledger, mechanics, policy),
        }
    }

    /// Register a client login
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The login is now taken
    /// * `Err(LoyaltyError::InvalidInput)` - The login is empty
    /// * `Err(LoyaltyError::Conflict)` - The login was already registered
    ///
    /// # Examples
    ///
    /// ```
    /// use loyalty_engine::core::{CommitPolicy, InMemoryLoyaltyService};
    /// use loyalty_engine::types::ErrorKind;
    ///
    /// let service = InMemoryLoyaltyService::in_memory(CommitPolicy::default());
    /// service.register_client("alice").unwrap();
    ///
    /// let again = service.register_client("alice").unwrap_err();
    /// assert_eq!(again.kind(), ErrorKind::Conflict);
    /// assert_eq!(again.kind().status_code(), 409);
    /// ```
    pub fn register_client(&self, login: &str) -> Result<(), LoyaltyError> {
        self.clients.register(login)
    }

    /// Register a reward mechanic
    ///
    /// Every order reserved after this returns sees the mechanic.
    ///
    /// # Returns
    ///
    /// * `Ok(Mechanic)` - The validated mechanic
    /// * `Err(LoyaltyError::InvalidInput)` - Empty match, unknown reward type or reward not above zero
    /// * `Err(LoyaltyError::Conflict)` - A mechanic with this match already exists
    pub fn register_mechanic(&self, request: MechanicRequest) -> Result<Mechanic, LoyaltyError> {
        self.processor.mechanics().register(request)
    }

    /// Submit an order and credit its accrual to the client
    ///
    /// # Arguments
    ///
    /// * `order_id` - Id that can be used for one order only, ever
    /// * `client_id` - Client whose account is credited
    /// * `items` - Order lines, each with a positive price and count
    ///
    /// # Returns
    ///
    /// * `Ok(OrderReceipt)` - Accrual and resulting balance
    /// * `Err(LoyaltyError::InvalidInput)` - Nothing was recorded; the id is still free
    /// * `Err(LoyaltyError::Conflict)` - The order id was already used
    /// * `Err(LoyaltyError::Internal)` - Storage failed; the id stays consumed
    ///
    /// # Examples
    ///
    /// ```
    /// use loyalty_engine::core::{CommitPolicy, InMemoryLoyaltyService};
    /// use loyalty_engine::types::{Item, MechanicRequest};
    /// use rust_decimal::Decimal;
    ///
    /// let service = InMemoryLoyaltyService::in_memory(CommitPolicy::default());
    /// service
    ///     .register_mechanic(MechanicRequest::new("sku1", "%", Decimal::TEN))
    ///     .unwrap();
    ///
    /// let items = vec![Item::new("sku1", 200, 2), Item::new("sku2", 100, 1)];
    /// let receipt = service.submit_order("X", "alice", items).unwrap();
    /// assert_eq!(receipt.accrual, 50);
    /// assert_eq!(receipt.balance, 50);
    /// ```
    pub fn submit_order(
        &self,
        order_id: &str,
        client_id: &str,
        items: Vec<Item>,
    ) -> Result<OrderReceipt, LoyaltyError> {
        self.processor.submit(Order::new(order_id, client_id, items))
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn processor(&self) -> &OrderProcessor<A, L> {
        &self.processor
    }
}
