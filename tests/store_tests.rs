use std::sync::Arc;
use std::time::Duration;

use memberdb::{
    ConnectionConfig, ConnectionPool, ConnectionProvider, DriverProvider, Member, MemberStore,
    MemoryDriver, StoreError,
};

fn unpooled_store() -> MemberStore {
    MemberStore::new(Arc::new(DriverProvider::new(Arc::new(MemoryDriver::new()))))
}

fn pooled_store() -> (Arc<ConnectionPool>, MemberStore) {
    let config = ConnectionConfig::new("admin", "adminpass")
        .min_connections(1)
        .max_connections(3)
        .acquire_timeout(Duration::from_millis(100));
    let pool = Arc::new(ConnectionPool::new(config, Arc::new(MemoryDriver::new())).unwrap());
    let store = MemberStore::new(Arc::clone(&pool) as Arc<dyn ConnectionProvider>);
    (pool, store)
}

#[test]
fn test_crud_over_dedicated_connections() {
    let store = unpooled_store();

    store.save(&Member::new("memberA", 10000)).unwrap();
    assert_eq!(store.find_by_id("memberA").unwrap().balance, 10000);

    assert_eq!(store.update("memberA", 20000).unwrap(), 1);
    assert_eq!(store.find_by_id("memberA").unwrap().balance, 20000);

    store.delete("memberA").unwrap();
    assert!(matches!(
        store.find_by_id("memberA"),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn test_crud_over_pool() {
    let (pool, store) = pooled_store();

    store.save(&Member::new("memberA", 10000)).unwrap();
    let found = store.find_by_id("memberA").unwrap();
    assert_eq!(found, Member::new("memberA", 10000));

    // Each call borrowed a pooled connection and gave it back.
    assert_eq!(pool.stats().active_connections, 0);
    assert!(pool.stats().total_connections >= 1);
}

#[test]
fn test_duplicate_save_leaves_original_row() {
    let store = unpooled_store();
    store.save(&Member::new("memberA", 10000)).unwrap();

    let err = store.save(&Member::new("memberA", 1)).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
    assert_eq!(store.find_by_id("memberA").unwrap().balance, 10000);
}

#[test]
fn test_store_calls_use_independent_connections() {
    let (pool, store) = pooled_store();
    store.save(&Member::new("memberA", 10000)).unwrap();

    // A held connection does not block plain CRUD while the pool has
    // capacity left.
    let held = pool.acquire().unwrap();
    assert_eq!(store.find_by_id("memberA").unwrap().balance, 10000);
    drop(held);
}
