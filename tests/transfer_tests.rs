use std::sync::Arc;
use std::thread;
use std::time::Duration;

use memberdb::{
    ConnectionConfig, ConnectionPool, ConnectionProvider, Member, MemberStore, MemoryDriver,
    StoreError, TransactionCoordinator, TransferService,
};

const MEMBER_A: &str = "memberA";
const MEMBER_B: &str = "memberB";
const MEMBER_EX: &str = "ex";

fn pooled_fixture(max_connections: usize) -> (Arc<ConnectionPool>, TransferService, MemberStore) {
    let config = ConnectionConfig::new("admin", "adminpass")
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_millis(100));
    let pool = Arc::new(ConnectionPool::new(config, Arc::new(MemoryDriver::new())).unwrap());

    let provider: Arc<dyn ConnectionProvider> = Arc::clone(&pool) as Arc<dyn ConnectionProvider>;
    let service = TransferService::new(
        TransactionCoordinator::new(Arc::clone(&provider)),
        MemberStore::new(Arc::clone(&provider)),
    );
    let store = MemberStore::new(provider);

    (pool, service, store)
}

#[test]
fn test_account_transfer() {
    let (_pool, service, store) = pooled_fixture(5);
    store.save(&Member::new(MEMBER_A, 10000)).unwrap();
    store.save(&Member::new(MEMBER_B, 10000)).unwrap();

    service.account_transfer(MEMBER_A, MEMBER_B, 2000).unwrap();

    let member_a = store.find_by_id(MEMBER_A).unwrap();
    let member_b = store.find_by_id(MEMBER_B).unwrap();
    assert_eq!(member_a.balance, 8000);
    assert_eq!(member_b.balance, 12000);
    assert_eq!(member_a.balance + member_b.balance, 20000);
}

#[test]
fn test_account_transfer_validation_failure() {
    let (_pool, service, store) = pooled_fixture(5);
    store.save(&Member::new(MEMBER_A, 10000)).unwrap();
    store.save(&Member::new(MEMBER_EX, 10000)).unwrap();

    let err = service
        .account_transfer(MEMBER_A, MEMBER_EX, 2000)
        .unwrap_err();
    assert!(matches!(err, StoreError::ValidationFailed(_)));

    // The debit had already been issued when validation rejected the
    // transfer; rollback must restore both balances exactly.
    assert_eq!(store.find_by_id(MEMBER_A).unwrap().balance, 10000);
    assert_eq!(store.find_by_id(MEMBER_EX).unwrap().balance, 10000);
}

#[test]
fn test_find_by_id_unknown_member() {
    let (_pool, _service, store) = pooled_fixture(5);

    let err = store.find_by_id("never-saved").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == "never-saved"));
}

#[test]
fn test_transfer_fails_fast_when_pool_exhausted() {
    let (pool, service, store) = pooled_fixture(1);
    store.save(&Member::new(MEMBER_A, 10000)).unwrap();
    store.save(&Member::new(MEMBER_B, 10000)).unwrap();

    let held = pool.acquire().unwrap();
    let err = service.account_transfer(MEMBER_A, MEMBER_B, 2000).unwrap_err();
    assert!(err.is_connection_failure());
    drop(held);

    // The transfer failed before any statement ran.
    assert_eq!(store.find_by_id(MEMBER_A).unwrap().balance, 10000);
    assert_eq!(store.find_by_id(MEMBER_B).unwrap().balance, 10000);
}

#[test]
fn test_transfer_from_unknown_member() {
    let (_pool, service, store) = pooled_fixture(5);
    store.save(&Member::new(MEMBER_B, 10000)).unwrap();

    let err = service.account_transfer("ghost", MEMBER_B, 2000).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert_eq!(store.find_by_id(MEMBER_B).unwrap().balance, 10000);
}

#[test]
fn test_transfer_to_unknown_member() {
    let (_pool, service, store) = pooled_fixture(5);
    store.save(&Member::new(MEMBER_A, 10000)).unwrap();

    let err = service.account_transfer(MEMBER_A, "ghost", 2000).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert_eq!(store.find_by_id(MEMBER_A).unwrap().balance, 10000);
}

#[test]
fn test_connections_released_after_success_and_failure() {
    let (pool, service, store) = pooled_fixture(2);
    store.save(&Member::new(MEMBER_A, 10000)).unwrap();
    store.save(&Member::new(MEMBER_B, 10000)).unwrap();
    store.save(&Member::new(MEMBER_EX, 10000)).unwrap();

    service.account_transfer(MEMBER_A, MEMBER_B, 2000).unwrap();
    service
        .account_transfer(MEMBER_A, MEMBER_EX, 2000)
        .unwrap_err();
    service.account_transfer(MEMBER_A, "ghost", 2000).unwrap_err();

    // Every unit of work gave its connection back, whatever the outcome.
    assert_eq!(pool.stats().active_connections, 0);
}

#[test]
fn test_concurrent_transfers_conserve_total() {
    let (_pool, service, store) = pooled_fixture(4);
    let service = Arc::new(service);
    for id in ["a1", "a2", "b1", "b2"] {
        store.save(&Member::new(id, 10000)).unwrap();
    }

    let handles: Vec<_> = [("a1", "a2"), ("b1", "b2")]
        .into_iter()
        .map(|(from, to)| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..20 {
                    service.account_transfer(from, to, 100).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.find_by_id("a1").unwrap().balance, 8000);
    assert_eq!(store.find_by_id("a2").unwrap().balance, 12000);
    assert_eq!(store.find_by_id("b1").unwrap().balance, 8000);
    assert_eq!(store.find_by_id("b2").unwrap().balance, 12000);
}
