//! End-to-end tests for the atomic allocation path: oversell protection, duplicate fulfilment and partial-claim
//! rollback.
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use log::*;
use vpg_common::Cedi;
use voucher_payment_engine::{
    db_types::{NewOrder, OrderReference, OrderStatusType, VoucherType},
    events::{EventHandlers, EventHooks, EventProducers},
    traits::{AllocationDatabase, AllocationError, AllocationOutcome},
    AllocationApi,
};

mod support;
use support::{new_test_db, seed_vouchers, wassce_order};

#[tokio::test]
async fn fulfils_order_when_stock_is_available() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 5).await;
    let api = AllocationApi::new(db.clone(), EventProducers::default());

    let outcome = api.allocate(wassce_order("web_0001", 2)).await.unwrap();
    let AllocationOutcome::Fulfilled { order, vouchers } = outcome else {
        panic!("Expected a fulfilment, got {outcome:?}");
    };
    assert_eq!(order.status, OrderStatusType::Success);
    assert_eq!(vouchers.len(), 2);
    let serials = vouchers.iter().map(|v| v.serial.clone()).collect::<HashSet<_>>();
    assert_eq!(serials.len(), 2, "Vouchers must be distinct");
    assert_eq!(db.count_available(VoucherType::Wassce).await.unwrap(), 3);
}

#[tokio::test]
async fn repeated_allocation_is_idempotent() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 5).await;
    let api = AllocationApi::new(db.clone(), EventProducers::default());

    let first = api.allocate(wassce_order("web_0002", 2)).await.unwrap();
    let second = api.allocate(wassce_order("web_0002", 2)).await.unwrap();
    let AllocationOutcome::AlreadyFulfilled { vouchers, .. } = second else {
        panic!("The second attempt must not claim again");
    };
    assert_eq!(first.vouchers(), &vouchers[..], "Retries must return the originally bound vouchers");
    assert_eq!(db.count_available(VoucherType::Wassce).await.unwrap(), 3);
}

#[tokio::test]
async fn concurrent_allocations_never_oversell() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 10).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let api = AllocationApi::new(db, EventProducers::default());
            api.allocate(wassce_order(&format!("burst_{i:02}"), 1)).await
        }));
    }
    let mut fulfilled = 0;
    let mut backlogged = 0;
    let mut serials = HashSet::new();
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            AllocationOutcome::Fulfilled { vouchers, .. } => {
                fulfilled += 1;
                for v in vouchers {
                    assert!(serials.insert(v.serial), "A serial was sold twice");
                }
            },
            AllocationOutcome::Backlogged { .. } => backlogged += 1,
            AllocationOutcome::AlreadyFulfilled { .. } => panic!("References are distinct, nothing can be a retry"),
        }
    }
    info!("🚀️ Burst complete: {fulfilled} fulfilled, {backlogged} backlogged");
    assert_eq!(fulfilled, 10);
    assert_eq!(backlogged, 10);
    assert_eq!(db.count_available(VoucherType::Wassce).await.unwrap(), 0);
}

#[tokio::test]
async fn racing_channels_fulfil_the_same_order_once() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 10).await;

    // The verify endpoint, the webhook and a USSD poll all report the same payment at once.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let api = AllocationApi::new(db, EventProducers::default());
            api.allocate(wassce_order("race_0001", 3)).await
        }));
    }
    let mut wins = 0;
    let mut bound: Option<Vec<String>> = None;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            AllocationOutcome::Fulfilled { vouchers, .. } => {
                wins += 1;
                bound = Some(vouchers.into_iter().map(|v| v.serial).collect());
            },
            AllocationOutcome::AlreadyFulfilled { vouchers, .. } => {
                assert_eq!(vouchers.len(), 3);
            },
            AllocationOutcome::Backlogged { .. } => panic!("Stock is ample, nothing may be backlogged"),
        }
    }
    assert_eq!(wins, 1, "Exactly one channel may win the claim");
    assert_eq!(bound.unwrap().len(), 3);
    assert_eq!(db.count_available(VoucherType::Wassce).await.unwrap(), 7, "Stock must be debited exactly once");
}

#[tokio::test]
async fn insufficient_stock_rolls_back_the_partial_claim() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 2).await;
    let api = AllocationApi::new(db.clone(), EventProducers::default());

    let outcome = api.allocate(wassce_order("big_0001", 5)).await.unwrap();
    let AllocationOutcome::Backlogged { order, newly_backlogged } = outcome else {
        panic!("Expected a backlogged outcome");
    };
    assert!(newly_backlogged);
    assert_eq!(order.status, OrderStatusType::Backlogged);
    // No partial handout: both vouchers are still available to other buyers.
    assert_eq!(db.count_available(VoucherType::Wassce).await.unwrap(), 2);
    assert!(db.fetch_vouchers_for_order(&order.reference).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_orders_are_never_fulfilled() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 5).await;
    let api = AllocationApi::new(db.clone(), EventProducers::default());

    let (order, _) = db.insert_order(wassce_order("fail_0001", 1)).await.unwrap();
    db.mark_order_failed(&order.reference).await.unwrap();

    let err = api.allocate(wassce_order("fail_0001", 1)).await.unwrap_err();
    assert!(matches!(err, AllocationError::OrderNotFulfillable(_)));
    assert_eq!(db.count_available(VoucherType::Wassce).await.unwrap(), 5);
}

#[tokio::test]
async fn ledger_details_override_caller_hints() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 10).await;
    let api = AllocationApi::new(db.clone(), EventProducers::default());

    let (ledger, _) = db.insert_order(wassce_order("init_0001", 1)).await.unwrap();
    // A late webhook arrives with mangled details for the same reference.
    let hints = NewOrder::new(
        OrderReference::from("init_0001".to_string()),
        "233500000000",
        VoucherType::Wassce,
        5,
        Cedi::from_cedis(999),
    );
    let outcome = api.allocate(hints).await.unwrap();
    let AllocationOutcome::Fulfilled { order, vouchers } = outcome else {
        panic!("Expected a fulfilment");
    };
    assert_eq!(order.quantity, 1, "The ledger row is authoritative");
    assert_eq!(order.amount, ledger.amount);
    assert_eq!(order.phone, ledger.phone);
    assert_eq!(vouchers.len(), 1);
}

#[tokio::test]
async fn rejects_nonsense_quantities() {
    let db = new_test_db().await;
    let api = AllocationApi::new(db, EventProducers::default());
    let err = api.allocate(wassce_order("bad_0001", 0)).await.unwrap_err();
    assert!(matches!(err, AllocationError::Validation(_)));
}

#[tokio::test]
async fn rejects_blank_references() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 5).await;
    let api = AllocationApi::new(db.clone(), EventProducers::default());

    let err = api.allocate(wassce_order("", 1)).await.unwrap_err();
    assert!(matches!(err, AllocationError::Validation(_)));
    let err = api.allocate(wassce_order("   ", 1)).await.unwrap_err();
    assert!(matches!(err, AllocationError::Validation(_)));
    // The check must fire before the ledger is touched.
    assert!(db.fetch_order(&"".to_string().into()).await.unwrap().is_none());
    assert_eq!(db.count_available(VoucherType::Wassce).await.unwrap(), 5);
}

#[tokio::test]
async fn fulfilment_hook_fires_exactly_once_per_order() {
    let db = new_test_db().await;
    seed_vouchers(&db, VoucherType::Wassce, 5).await;

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let mut hooks = EventHooks::default();
    hooks.on_order_fulfilled(move |ev| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            debug!("Fulfilment event for {}", ev.order.reference);
            counter.fetch_add(1, Ordering::SeqCst);
        })
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = AllocationApi::new(db, producers);
    api.allocate(wassce_order("hook_0001", 1)).await.unwrap();
    api.allocate(wassce_order("hook_0001", 1)).await.unwrap();
    drop(api);

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1, "A retry must not renotify the buyer");
}
