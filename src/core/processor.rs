//! Order processing orchestration
//!
//! `OrderProcessor` drives one order through
//! `RECEIVED -> VALIDATED -> RESERVED -> ACCRUED -> COMMITTED`, or to a
//! rejection:
//!
//! 1. **Validate**: non-empty ids and items, every line with `price > 0` and
//!    `count > 0`, order value within range. Nothing is touched on failure.
//! 2. **Reserve**: atomic insert-if-absent of the order id in the ledger. A
//!    taken id is a `Conflict`, whatever the payload.
//! 3. **Accrue**: snapshot the mechanic registry (after the reservation) and
//!    compute the accrual.
//! 4. **Commit**: write-ahead the accrual on the ledger entry, credit the
//!    account (idempotent per order id), finalize the entry, then drop the
//!    account's per-order credit record. Transient storage failures are
//!    retried with exponential backoff; if finalizing is exhausted the credit
//!    is reversed and the entry marked failed.
//!
//! Any failure after step 2 returns `Internal` and leaves the order id
//! consumed: resubmitting it yields `Conflict`, never a second credit.
//!
//! # Architecture
//!
//! ```text
//! OrderProcessor
//!     ├── Arc<A: AccountStore>     (per-client balances)
//!     ├── Arc<L: OrderLedger>      (per-order-id reservations)
//!     ├── Arc<MechanicRegistry>    (per-match mechanics, snapshotted)
//!     └── CommitPolicy             (retry budget for commit steps)
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use tracing::{debug, error, info, warn};

use super::accrual::{compute_accrual, order_value};
use super::mechanic_registry::MechanicRegistry;
use super::traits::{AccountStore, OrderLedger};
use crate::types::{
    LedgerEntry, LedgerState, LoyaltyError, Order, OrderId, OrderReceipt, Points, StorageError,
};

/// Retry budget for the storage calls of the commit step
#[derive(Debug, Clone, PartialEq)]
pub struct CommitPolicy {
    /// Retries after the first attempt of each commit step
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl CommitPolicy {
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Exponential backoff with jitter bounded by this policy
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Outcome of a recovery pass over in-flight ledger entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryReport {
    /// Pending orders whose credit and finalization were completed
    pub completed: Vec<OrderId>,
    /// Reserved orders that never reached the write-ahead record
    pub discarded: Vec<OrderId>,
    /// Orders that could not be settled and are still in flight
    pub unresolved: Vec<OrderId>,
}

enum Settled {
    Completed,
    Discarded,
}

/// Orchestrates validation, reservation, accrual and commit of orders
#[derive(Debug)]
pub struct OrderProcessor<A, L> {
    accounts: Arc<A>,
    ledger: Arc<L>,
    mechanics: Arc<MechanicRegistry>,
    policy: CommitPolicy,
}

impl<A, L> Clone for OrderProcessor<A, L> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            ledger: Arc::clone(&self.ledger),
            mechanics: Arc::clone(&self.mechanics),
            policy: self.policy.clone(),
        }
    }
}

impl<A: AccountStore, L: OrderLedger> OrderProcessor<A, L> {
    /// Create a processor over shared stores
    ///
    /// # Arguments
    ///
    /// * `accounts` - Balance store, shared with anything reading balances
    /// * `ledger` - Order id ledger; its `reserve` is the serialization point
    /// * `mechanics` - Registry snapshotted once per order
    /// * `policy` - Retry budget for each commit step
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use loyalty_engine::core::{
    ///     CommitPolicy, InMemoryAccountStore, InMemoryOrderLedger, MechanicRegistry, OrderProcessor,
    /// };
    /// use loyalty_engine::types::{Item, MechanicRequest, Order};
    /// use rust_decimal::Decimal;
    ///
    /// let mechanics = Arc::new(MechanicRegistry::new());
    /// mechanics
    ///     .register(MechanicRequest::new("sku1", "pt", Decimal::TEN))
    ///     .unwrap();
    ///
    /// let processor = OrderProcessor::new(
    ///     Arc::new(InMemoryAccountStore::new()),
    ///     Arc::new(InMemoryOrderLedger::new()),
    ///     mechanics,
    ///     CommitPolicy::default(),
    /// );
    ///
    /// let receipt = processor
    ///     .submit(Order::new("X", "alice", vec![Item::new("sku1", 100, 1)]))
    ///     .unwrap();
    /// assert_eq!(receipt.accrual, 10);
    /// ```
    pub fn new(
        accounts: Arc<A>,
        ledger: Arc<L>,
        mechanics: Arc<MechanicRegistry>,
        policy: CommitPolicy,
    ) -> Self {
        Self {
            accounts,
            ledger,
            mechanics,
            policy,
        }
    }

    /// Process an order submission
    ///
    /// # Returns
    ///
    /// * `Ok(OrderReceipt)` - The order was credited exactly once
    /// * `Err(LoyaltyError::InvalidInput)` - Validation failed; nothing was recorded
    /// * `Err(LoyaltyError::Conflict)` - The order id was already used
    /// * `Err(LoyaltyError::Internal)` - Storage failed after reservation; the id stays consumed
    pub fn submit(&self, order: Order) -> Result<OrderReceipt, LoyaltyError> {
        if let Err(e) = validate(&order) {
            debug!(order_id = %order.order_id, error = %e, "Order rejected");
            return Err(e);
        }

        let reserved = self
            .ledger
            .reserve(&order.order_id, &order.client_id)
            .map_err(|e| LoyaltyError::internal(&order.order_id, e.to_string()))?;
        if !reserved {
            warn!(order_id = %order.order_id, client_id = %order.client_id, "Duplicate order id");
            return Err(LoyaltyError::conflict("order", &order.order_id));
        }

        // The snapshot must be taken after the reservation succeeded
        let snapshot = self.mechanics.snapshot();
        let Some(accrual) = compute_accrual(&order.items, &snapshot) else {
            let reason = "accrual arithmetic overflow";
            self.abandon(&order.order_id, reason);
            return Err(LoyaltyError::internal(&order.order_id, reason));
        };

        self.commit(&order, accrual)
    }

    fn commit(&self, order: &Order, accrual: Points) -> Result<OrderReceipt, LoyaltyError> {
        let order_id = order.order_id.as_str();
        let client_id = order.client_id.as_str();

        if let Err(e) = self.with_retry("record accrual", order_id, || {
            self.ledger.record_accrual(order_id, accrual)
        }) {
            self.abandon(order_id, &e.to_string());
            return Err(LoyaltyError::internal(order_id, e.to_string()));
        }

        let balance = match self.with_retry("credit account", order_id, || {
            self.accounts.credit_order(client_id, order_id, accrual)
        }) {
            Ok(balance) => balance,
            Err(e) => return Err(self.roll_back(order, e)),
        };

        if let Err(e) = self.with_retry("finalize ledger entry", order_id, || {
            self.ledger.finalize(order_id)
        }) {
            return Err(self.roll_back(order, e));
        }
        self.settle(client_id, order_id);

        info!(order_id, client_id, accrual, balance, "Order committed");
        Ok(OrderReceipt {
            order_id: order.order_id.clone(),
            client_id: order.client_id.clone(),
            accrual,
            balance,
        })
    }

    /// Undo a possibly applied credit and mark the order failed
    ///
    /// If the reversal itself cannot be stored the entry is left `Pending`,
    /// so that `recover_pending` completes the order instead.
    fn roll_back(&self, order: &Order, cause: StorageError) -> LoyaltyError {
        let order_id = order.order_id.as_str();

        match self.with_retry("reverse credit", order_id, || {
            self.accounts.reverse_order(&order.client_id, order_id)
        }) {
            Ok(_) => self.abandon(order_id, &cause.to_string()),
            Err(e) => error!(
                order_id,
                error = %e,
                "Could not reverse credit, entry left pending for recovery"
            ),
        }

        LoyaltyError::internal(order_id, cause.to_string())
    }

    /// Drop the account's credit record for a committed order
    ///
    /// The order is already committed; a failure here leaves a stale record behind.
    fn settle(&self, client_id: &str, order_id: &str) {
        if let Err(e) = self.accounts.settle_order(client_id, order_id) {
            warn!(order_id, client_id, error = %e, "Could not prune credit record");
        }
    }

    fn abandon(&self, order_id: &str, reason: &str) {
        error!(order_id, reason, "Order failed after reservation");
        if let Err(e) = self.ledger.mark_failed(order_id, reason) {
            error!(order_id, error = %e, "Could not mark order as failed");
        }
    }

    fn with_retry<T, F>(&self, step: &str, order_id: &str, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Result<T, StorageError>,
    {
        let mut delays = self.policy.backoff().build();
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => match delays.next() {
                    Some(delay) => {
                        warn!(order_id, step, error = %e, ?delay, "Commit step failed, retrying");
                        thread::sleep(delay);
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Settle ledger entries left in flight by an interrupted run
    ///
    /// `Pending` entries are credited (idempotently) and finalized;
    /// `Reserved` entries are marked failed since nothing was credited for
    /// them. Run this before accepting new submissions: an order that is
    /// being processed concurrently would be seen as interrupted.
    pub fn recover_pending(&self) -> Result<RecoveryReport, StorageError> {
        let mut report = RecoveryReport::default();

        for entry in self.ledger.in_flight()? {
            let settled = match entry.state {
                LedgerState::Reserved => self
                    .ledger
                    .mark_failed(&entry.order_id, "interrupted before accrual")
                    .map(|_| Settled::Discarded),
                LedgerState::Pending { accrual } => self
                    .accounts
                    .credit_order(&entry.client_id, &entry.order_id, accrual)
                    .and_then(|_| self.ledger.finalize(&entry.order_id))
                    .map(|_| {
                        self.settle(&entry.client_id, &entry.order_id);
                        Settled::Completed
                    }),
                _ => continue,
            };

            match settled {
                Ok(Settled::Completed) => report.completed.push(entry.order_id),
                Ok(Settled::Discarded) => report.discarded.push(entry.order_id),
                Err(e) => {
                    error!(order_id = %entry.order_id, error = %e, "Recovery failed");
                    report.unresolved.push(entry.order_id);
                }
            }
        }

        info!(
            completed = report.completed.len(),
            discarded = report.discarded.len(),
            unresolved = report.unresolved.len(),
            "Recovery pass finished"
        );
        Ok(report)
    }

    /// Ledger entry for `order_id`, in whatever state it reached
    pub fn ledger_entry(&self, order_id: &str) -> Result<Option<LedgerEntry>, StorageError> {
        self.ledger.get(order_id)
    }

    pub fn balance(&self, client_id: &str) -> Result<Option<Points>, StorageError> {
        self.accounts.balance(client_id)
    }

    pub fn accounts(&self) -> &Arc<A> {
        &self.accounts
    }

    pub fn mechanics(&self) -> &Arc<MechanicRegistry> {
        &self.mechanics
    }
}

/// Check an order before anything is recorded
pub fn validate(order: &Order) -> Result<(), LoyaltyError> {
    if order.order_id.trim().is_empty() {
        return Err(LoyaltyError::invalid_input("order_id", "must not be empty"));
    }
    if order.client_id.trim().is_empty() {
        return Err(LoyaltyError::invalid_input("client_id", "must not be empty"));
    }
    if order.items.is_empty() {
        return Err(LoyaltyError::invalid_input("items", "order has no items"));
    }

    for (index, item) in order.items.iter().enumerate() {
        if item.price <= 0 {
            return Err(LoyaltyError::invalid_input(
                "price",
                format!("item {} ('{}') has price {}", index, item.id, item.price),
            ));
        }
        if item.count <= 0 {
            return Err(LoyaltyError::invalid_input(
                "count",
                format!("item {} ('{}') has count {}", index, item.id, item.count),
            ));
        }
    }

    if order_value(&order.items).is_none() {
        return Err(LoyaltyError::invalid_input("items", "order value overflows"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InMemoryAccountStore, InMemoryOrderLedger};
    use crate::types::{Item, MechanicRequest};
    use rstest::rstest;
    use rust_decimal::Decimal;

    type Processor = OrderProcessor<InMemoryAccountStore, InMemoryOrderLedger>;

    fn processor() -> Processor {
        OrderProcessor::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryOrderLedger::new()),
            Arc::new(MechanicRegistry::new()),
            CommitPolicy::default(),
        )
    }

    fn register(processor: &Processor, match_key: &str, reward_type: &str, reward: i64) {
        processor
            .mechanics()
            .register(MechanicRequest::new(match_key, reward_type, Decimal::from(reward)))
            .unwrap();
    }

    #[test]
    fn test_points_order_commits() {
        let processor = processor();
        register(&processor, "sku1", "pt", 10);

        let receipt = processor
            .submit(Order::new("X", "alice", vec![Item::new("sku1", 100, 3)]))
            .unwrap();

        assert_eq!(receipt.accrual, 10);
        assert_eq!(receipt.balance, 10);
        assert_eq!(processor.balance("alice").unwrap(), Some(10));
        assert_eq!(
            processor.ledger_entry("X").unwrap().unwrap().state,
            LedgerState::Committed { accrual: 10 }
        );
    }

    #[test]
    fn test_percent_order_commits() {
        let processor = processor();
        register(&processor, "sku1", "%", 5);

        let items = vec![Item::new("sku1", 250, 2), Item::new("sku2", 500, 1)];
        let receipt = processor.submit(Order::new("X", "alice", items)).unwrap();

        assert_eq!(receipt.accrual, 50);
    }

    #[test]
    fn test_balance_accumulates_across_orders() {
        let processor = processor();
        register(&processor, "sku1", "pt", 10);

        processor
            .submit(Order::new("1", "alice", vec![Item::new("sku1", 1, 1)]))
            .unwrap();
        let receipt = processor
            .submit(Order::new("2", "alice", vec![Item::new("sku1", 1, 1)]))
            .unwrap();

        assert_eq!(receipt.balance, 20);
    }

    #[test]
    fn test_unmatched_order_commits_zero() {
        let processor = processor();

        let receipt = processor
            .submit(Order::new("X", "alice", vec![Item::new("sku1", 100, 1)]))
            .unwrap();

        assert_eq!(receipt.accrual, 0);
        assert_eq!(processor.balance("alice").unwrap(), Some(0));
    }

    #[test]
    fn test_duplicate_order_id_conflicts_regardless_of_payload() {
        let processor = processor();
        register(&processor, "sku1", "pt", 10);

        processor
            .submit(Order::new("X", "alice", vec![Item::new("sku1", 100, 1)]))
            .unwrap();
        let result = processor.submit(Order::new("X", "bob", vec![Item::new("sku1", 5, 5)]));

        assert_eq!(result, Err(LoyaltyError::conflict("order", "X")));
        assert_eq!(processor.balance("alice").unwrap(), Some(10));
        assert_eq!(processor.balance("bob").unwrap(), None);
    }

    #[rstest]
    #[case::empty_items(Order::new("X", "alice", vec![]), "items")]
    #[case::zero_price(Order::new("X", "alice", vec![Item::new("a", 0, 1)]), "price")]
    #[case::negative_price(Order::new("X", "alice", vec![Item::new("a", -5, 1)]), "price")]
    #[case::zero_count(Order::new("X", "alice", vec![Item::new("a", 10, 0)]), "count")]
    #[case::negative_count(
        Order::new("X", "alice", vec![Item::new("a", 10, 1), Item::new("b", 10, -1)]),
        "count"
    )]
    #[case::empty_order_id(Order::new("", "alice", vec![Item::new("a", 10, 1)]), "order_id")]
    #[case::empty_client(Order::new("X", "", vec![Item::new("a", 10, 1)]), "client_id")]
    #[case::value_overflow(
        Order::new("X", "alice", vec![Item::new("a", i64::MAX, i64::MAX)]),
        "items"
    )]
    fn test_invalid_orders_leave_no_trace(#[case] order: Order, #[case] expected_field: &str) {
        let processor = processor();
        register(&processor, "a", "pt", 10);
        let order_id = order.order_id.clone();

        match processor.submit(order) {
            Err(LoyaltyError::InvalidInput { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("Expected InvalidInput on {}, got {:?}", expected_field, other),
        }

        assert_eq!(processor.ledger_entry(&order_id).unwrap(), None);
        assert_eq!(processor.balance("alice").unwrap(), None);
    }

    #[test]
    fn test_rejected_order_id_can_be_reused() {
        let processor = processor();

        assert!(processor
            .submit(Order::new("X", "alice", vec![Item::new("a", 0, 1)]))
            .is_err());
        assert!(processor
            .submit(Order::new("X", "alice", vec![Item::new("a", 1, 1)]))
            .is_ok());
    }

    #[test]
    fn test_concurrent_duplicates_credit_once() {
        let processor = processor();
        register(&processor, "sku1", "pt", 10);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let processor = processor.clone();
                thread::spawn(move || {
                    processor.submit(Order::new("X", "alice", vec![Item::new("sku1", 100, 1)]))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(LoyaltyError::Conflict { .. })))
                .count(),
            15
        );
        assert_eq!(processor.balance("alice").unwrap(), Some(10));
    }

    #[test]
    fn test_recover_pending_completes_write_ahead_records() {
        let processor = processor();
        let ledger = Arc::clone(&processor.ledger);

        // Simulate a run interrupted after the write-ahead record
        ledger.reserve("pending", "alice").unwrap();
        ledger.record_accrual("pending", 12).unwrap();
        // ...and one interrupted right after reservation
        ledger.reserve("reserved", "bob").unwrap();

        let report = processor.recover_pending().unwrap();

        assert_eq!(report.completed, vec!["pending".to_string()]);
        assert_eq!(report.discarded, vec!["reserved".to_string()]);
        assert!(report.unresolved.is_empty());
        assert_eq!(processor.balance("alice").unwrap(), Some(12));
        assert_eq!(processor.balance("bob").unwrap(), None);

        // A second pass finds nothing left to do
        assert_eq!(processor.recover_pending().unwrap(), RecoveryReport::default());
    }

    #[test]
    fn test_recover_does_not_double_credit() {
        let processor = processor();
        let ledger = Arc::clone(&processor.ledger);

        // Interrupted after the credit but before finalization
        ledger.reserve("X", "alice").unwrap();
        ledger.record_accrual("X", 7).unwrap();
        processor.accounts().credit_order("alice", "X", 7).unwrap();

        processor.recover_pending().unwrap();

        assert_eq!(processor.balance("alice").unwrap(), Some(7));
        assert_eq!(
            processor.ledger_entry("X").unwrap().unwrap().state,
            LedgerState::Committed { accrual: 7 }
        );
    }

    #[test]
    fn test_commit_settles_credit_record() {
        let processor = processor();
        register(&processor, "sku1", "pt", 10);

        processor
            .submit(Order::new("X", "alice", vec![Item::new("sku1", 100, 1)]))
            .unwrap();

        let account = processor.accounts().accounts().unwrap().pop().unwrap();
        assert!(!account.has_credited("X"));
        assert!(account.established);
        assert_eq!(account.balance, 10);

        // The ledger still refuses the id
        let again = processor.submit(Order::new("X", "alice", vec![Item::new("sku1", 100, 1)]));
        assert_eq!(again, Err(LoyaltyError::conflict("order", "X")));
        assert_eq!(processor.balance("alice").unwrap(), Some(10));
    }

    #[test]
    fn test_balance_overflow_fails_order_and_consumes_id() {
        let processor = processor();
        register(&processor, "sku1", "pt", 10);
        processor.accounts().apply_delta("rich", Points::MAX).unwrap();

        let order = Order::new("X", "rich", vec![Item::new("sku1", 100, 1)]);
        let error = processor.submit(order.clone()).unwrap_err();

        assert_eq!(
            error,
            LoyaltyError::internal("X", "balance overflow for client rich")
        );
        assert_eq!(processor.balance("rich").unwrap(), Some(Points::MAX));
        assert!(matches!(
            processor.ledger_entry("X").unwrap().unwrap().state,
            LedgerState::Failed { accrual: Some(10), .. }
        ));

        let retry = processor.submit(order).unwrap_err();
        assert_eq!(retry, LoyaltyError::conflict("order", "X"));
    }

    #[test]
    fn test_accrual_overflow_fails_order_and_consumes_id() {
        let processor = processor();
        processor
            .mechanics()
            .register(MechanicRequest::new("sku1", "%", Decimal::from(i64::MAX)))
            .unwrap();

        let order = Order::new("X", "alice", vec![Item::new("sku1", 1_000_000, 1)]);
        let error = processor.submit(order.clone()).unwrap_err();

        assert_eq!(error, LoyaltyError::internal("X", "accrual arithmetic overflow"));
        assert_eq!(processor.balance("alice").unwrap(), None);
        assert!(matches!(
            processor.ledger_entry("X").unwrap().unwrap().state,
            LedgerState::Failed { accrual: None, .. }
        ));

        let retry = processor.submit(order).unwrap_err();
        assert_eq!(retry, LoyaltyError::conflict("order", "X"));
    }

    #[test]
    fn test_commit_policy_backoff_respects_retry_budget() {
        let delays: Vec<_> = CommitPolicy::new(2).backoff().build().collect();
        assert_eq!(delays.len(), 2);

        assert_eq!(CommitPolicy::new(0).backoff().build().count(), 0);
    }
}
