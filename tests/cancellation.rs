//! Cancellation Tests
//!
//! A cancelled or expired context stops a query at the next fetch and
//! surfaces as `Cancelled`. The store stays usable afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use recordql::errors::QueryError;
use recordql::record::{Record, RecordCheck, RecordFilter, RecordValue};
use recordql::schema::{Field, Module};
use recordql::store::{QueryContext, Store};

fn seeded(n: usize) -> (Store, Module) {
    let store = Store::open_in_memory().unwrap();
    let m = Module::new(40, 1, vec![Field::number("n", 0)]);

    let mut records: Vec<Record> = (0..n)
        .map(|i| Record::new(m.id, m.namespace_id).with_value(RecordValue::new("n", i.to_string())))
        .collect();
    store
        .create(&QueryContext::background(), &m, &mut records)
        .unwrap();
    (store, m)
}

/// Test: a context cancelled up front fails every operation.
#[test]
fn test_cancelled_context() {
    let (store, m) = seeded(3);
    let ctx = QueryContext::background();
    ctx.cancel();

    assert!(matches!(
        store.search(&ctx, &m, RecordFilter::new()),
        Err(QueryError::Cancelled)
    ));
    assert!(matches!(
        store.count(&ctx, &m, &RecordFilter::new()),
        Err(QueryError::Cancelled)
    ));
    assert!(matches!(
        store.create(&ctx, &m, &mut [Record::new(m.id, m.namespace_id)]),
        Err(QueryError::Cancelled)
    ));
}

/// Test: a deadline in the past behaves like cancellation.
#[test]
fn test_expired_deadline() {
    let (store, m) = seeded(3);
    let ctx = QueryContext::with_deadline(Instant::now());

    let err = store.search(&ctx, &m, RecordFilter::new()).unwrap_err();
    assert!(matches!(err, QueryError::Cancelled));
    assert!(!err.is_client_error());
}

/// Test: cancelling while a page is being filled stops the refetch.
#[test]
fn test_cancel_during_refetch() {
    let (store, m) = seeded(20);
    let ctx = QueryContext::background();
    let calls = Arc::new(AtomicUsize::new(0));

    let check = {
        let ctx = ctx.clone();
        let calls = Arc::clone(&calls);
        RecordCheck::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            ctx.cancel();
            Ok(false)
        })
    };

    let filter = RecordFilter::new().with_limit(2).with_check(check);
    let err = store.search(&ctx, &m, filter).unwrap_err();

    assert!(matches!(err, QueryError::Cancelled));
    // only the first fetch of 3 rows reached the check
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// Test: a cancelled query leaves the store usable.
#[test]
fn test_store_usable_after_cancel() {
    let (store, m) = seeded(5);

    let ctx = QueryContext::background();
    ctx.cancel();
    assert!(store.search(&ctx, &m, RecordFilter::new()).is_err());

    let (records, _) = store
        .search(&QueryContext::background(), &m, RecordFilter::new())
        .unwrap();
    assert_eq!(records.len(), 5);

    let generous = QueryContext::with_timeout(Duration::from_secs(60));
    assert_eq!(store.count(&generous, &m, &RecordFilter::new()).unwrap(), 5);
}
