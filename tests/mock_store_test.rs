#![cfg(feature = "mock")]

use std::time::Duration;

use k1s0_redislock::{
    limit_retry, linear_backoff, LockClient, LockError, MockLockStore, ObtainOptions,
};

#[tokio::test]
async fn test_retries_until_strategy_stops() {
    let mut store = MockLockStore::new();
    store
        .expect_acquire()
        .times(4)
        .returning(|_, _, _| Ok(false));

    let client = LockClient::new(store);
    let result = client
        .obtain(
            "key1",
            Duration::from_secs(10),
            ObtainOptions::new()
                .with_retry_strategy(limit_retry(linear_backoff(Duration::from_millis(1)), 3)),
        )
        .await;
    assert!(matches!(result, Err(LockError::NotObtained(_))));
}

#[tokio::test]
async fn test_acquire_receives_key_token_and_ttl() {
    let mut store = MockLockStore::new();
    store
        .expect_acquire()
        .withf(|key, token, ttl| {
            key.to_string() == "orders:42" && token.len() == 22 && *ttl == Duration::from_secs(30)
        })
        .times(1)
        .returning(|_, _, _| Ok(true));

    let client = LockClient::new(store);
    let lock = client
        .obtain("orders:42", Duration::from_secs(30), ObtainOptions::default())
        .await
        .unwrap();
    assert_eq!(lock.key(), "orders:42");
}

#[tokio::test]
async fn test_release_uses_obtained_token() {
    let mut store = MockLockStore::new();
    store.expect_acquire().returning(|_, _, _| Ok(true));
    store
        .expect_release()
        .withf(|key, token| key.to_string() == "key1" && token.len() == 22)
        .times(1)
        .returning(|_, _| Ok(true));

    let client = LockClient::new(store);
    let lock = client
        .obtain("key1", Duration::from_secs(10), ObtainOptions::default())
        .await
        .unwrap();
    lock.release().await.unwrap();
}

#[tokio::test]
async fn test_store_error_on_release_is_propagated() {
    let mut store = MockLockStore::new();
    store.expect_acquire().returning(|_, _, _| Ok(true));
    store.expect_release().returning(|_, _| {
        Err(LockError::store(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        )))
    });

    let client = LockClient::new(store);
    let lock = client
        .obtain("key1", Duration::from_secs(10), ObtainOptions::default())
        .await
        .unwrap();
    let result = lock.release().await;
    assert!(matches!(result, Err(LockError::Store(_))));
}

#[tokio::test]
async fn test_refresh_passes_new_ttl() {
    let mut store = MockLockStore::new();
    store.expect_acquire().returning(|_, _, _| Ok(true));
    store
        .expect_refresh()
        .withf(|_, _, ttl| *ttl == Duration::from_secs(3600))
        .times(1)
        .returning(|_, _, _| Ok(false));

    let client = LockClient::new(store);
    let lock = client
        .obtain("key1", Duration::from_secs(60), ObtainOptions::default())
        .await
        .unwrap();
    let result = lock.refresh(Duration::from_secs(3600)).await;
    assert!(matches!(result, Err(LockError::NotObtained(_))));
}
