//! Concurrency properties of the loyalty service
//!
//! Many threads hammer one service; the assertions are about what every
//! interleaving must agree on: an order id is credited at most once, balances
//! are the sum of committed accruals, and each order sees a mechanic either
//! completely or not at all.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use loyalty_engine::core::{CommitPolicy, InMemoryLoyaltyService};
use loyalty_engine::types::{ErrorKind, Item, LedgerState, MechanicRequest};
use rust_decimal::Decimal;

fn service() -> InMemoryLoyaltyService {
    InMemoryLoyaltyService::in_memory(CommitPolicy::default())
}

#[test]
fn test_distinct_orders_for_one_client_all_credit() {
    let service = service();
    service
        .register_mechanic(MechanicRequest::new("sku1", "pt", Decimal::new(3, 0)))
        .unwrap();

    thread::scope(|scope| {
        for worker in 0..8 {
            let service = &service;
            scope.spawn(move || {
                for n in 0..50 {
                    let order_id = format!("{}-{}", worker, n);
                    service
                        .submit_order(&order_id, "alice", vec![Item::new("sku1", 1, 1)])
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(service.processor().balance("alice").unwrap(), Some(8 * 50 * 3));
}

#[test]
fn test_same_order_id_from_many_threads_credits_once() {
    let service = service();
    service
        .register_mechanic(MechanicRequest::new("sku1", "%", Decimal::TEN))
        .unwrap();

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (1..=16)
            .map(|n| {
                let service = &service;
                // Each attempt carries a different payload
                scope.spawn(move || {
                    service.submit_order("X", "alice", vec![Item::new("sku1", n * 100, 1)])
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let committed: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(committed.len(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.kind() == ErrorKind::Conflict));

    let winner = committed[0];
    assert_eq!(
        service.processor().balance("alice").unwrap(),
        Some(winner.accrual)
    );
    assert_eq!(
        service.processor().ledger_entry("X").unwrap().unwrap().state,
        LedgerState::Committed {
            accrual: winner.accrual
        }
    );
}

#[test]
fn test_balance_never_decreases_under_concurrent_credits() {
    let service = service();
    service
        .register_mechanic(MechanicRequest::new("sku1", "pt", Decimal::ONE))
        .unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let observer = scope.spawn(|| {
            let mut last = 0;
            let mut observations = 0usize;
            while !done.load(Ordering::SeqCst) {
                let current = service.processor().balance("alice").unwrap().unwrap_or(0);
                assert!(current >= last, "balance went from {} to {}", last, current);
                last = current;
                observations += 1;
            }
            observations
        });

        let writers: Vec<_> = (0..4)
            .map(|worker| {
                let service = &service;
                scope.spawn(move || {
                    for n in 0..100 {
                        let order_id = format!("{}-{}", worker, n);
                        service
                            .submit_order(&order_id, "alice", vec![Item::new("sku1", 5, 1)])
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);

        assert!(observer.join().unwrap() > 0);
    });

    assert_eq!(service.processor().balance("alice").unwrap(), Some(400));
}

#[test]
fn test_orders_see_concurrently_registered_mechanic_atomically() {
    let service = service();

    let receipts: Vec<_> = thread::scope(|scope| {
        let submitters: Vec<_> = (0..4)
            .map(|worker| {
                let service = &service;
                scope.spawn(move || {
                    (0..100)
                        .map(|n| {
                            let order_id = format!("{}-{}", worker, n);
                            service
                                .submit_order(&order_id, "alice", vec![Item::new("sku1", 30, 2)])
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        service
            .register_mechanic(MechanicRequest::new("sku1", "%", Decimal::new(50, 0)))
            .unwrap();

        submitters
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let accruals: HashSet<_> = receipts.iter().map(|r| r.accrual).collect();
    assert!(accruals.is_subset(&HashSet::from([0, 30])), "{:?}", accruals);

    let total: i64 = receipts.iter().map(|r| r.accrual).sum();
    assert_eq!(service.processor().balance("alice").unwrap(), Some(total));

    // Every order submitted after the registration returned sees it
    let late = service
        .submit_order("late", "alice", vec![Item::new("sku1", 30, 2)])
        .unwrap();
    assert_eq!(late.accrual, 30);
}

#[test]
fn test_concurrent_client_registration_single_winner() {
    let service = service();

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| scope.spawn(|| service.register_client("alice")))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(service.clients().len(), 1);
}
