mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use cmdseek::Error;
use common::{manager, root, CountingOpener, FixedEmbedder, FixedLoader};

#[tokio::test]
async fn test_concurrent_init_store_opens_once() {
    let opener = CountingOpener::new(Duration::from_millis(50));
    let lm = manager(opener.clone(), FixedLoader::unavailable());

    let (a, b) = tokio::join!(lm.init_store(root()), lm.init_store(root()));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&a, &b));

    // cached afterwards
    let c = lm.init_store(root()).await.unwrap();
    assert!(Arc::ptr_eq(&a, &c));
    assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_callers_share_a_failure() {
    let opener = CountingOpener::failing_first(1, Duration::from_millis(50));
    let lm = manager(opener.clone(), FixedLoader::unavailable());

    let (a, b) = tokio::join!(lm.init_store(root()), lm.init_store(root()));
    assert_eq!(a.err(), Some(Error::Storage("disk unavailable".into())));
    assert_eq!(b.err(), Some(Error::Storage("disk unavailable".into())));
    assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_init_can_be_retried() {
    let opener = CountingOpener::failing_first(1, Duration::ZERO);
    let lm = manager(opener.clone(), FixedLoader::unavailable());

    assert!(lm.init_store(root()).await.is_err());
    assert_eq!(lm.get_store().err(), Some(Error::NotInitialized("store")));

    assert!(lm.init_store(root()).await.is_ok());
    assert_eq!(opener.opens.load(Ordering::SeqCst), 2);
    assert!(lm.get_store().is_ok());
}

#[tokio::test]
async fn test_get_store_never_initializes() {
    let opener = CountingOpener::new(Duration::ZERO);
    let lm = manager(opener.clone(), FixedLoader::unavailable());

    assert_eq!(lm.get_store().err(), Some(Error::NotInitialized("store")));
    assert_eq!(opener.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_embedder_cache_is_independent() {
    let opener = CountingOpener::new(Duration::ZERO);
    let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
    let loader = FixedLoader::with(embedder.clone());
    let lm = manager(opener.clone(), loader.clone());

    let (a, b) = tokio::join!(
        lm.get_or_create_embedder(root()),
        lm.get_or_create_embedder(root())
    );
    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(opener.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_embedder_load_failure_is_typed() {
    let lm = manager(CountingOpener::new(Duration::ZERO), FixedLoader::unavailable());

    match lm.get_or_create_embedder(root()).await {
        Err(Error::Unavailable(msg)) => assert!(msg.contains("not available")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("loader should fail"),
    }
}

#[tokio::test]
async fn test_dispose_all_releases_and_is_idempotent() {
    let opener = CountingOpener::new(Duration::ZERO);
    let embedder = FixedEmbedder::new(vec![1.0]);
    let lm = manager(opener.clone(), FixedLoader::with(embedder.clone()));

    // nothing created yet
    lm.dispose_all().await;

    let store = lm.init_store(root()).await.unwrap();
    lm.get_or_create_embedder(root()).await.unwrap();

    lm.dispose_all().await;
    lm.dispose_all().await;

    assert!(!store.is_open());
    assert!(embedder.disposed.load(Ordering::SeqCst));
    assert_eq!(store.get_all_rows().err(), Some(Error::NotInitialized("store")));
    assert_eq!(lm.get_store().err(), Some(Error::NotInitialized("store")));

    // a fresh store is opened on next use
    let reopened = lm.init_store(root()).await.unwrap();
    assert!(reopened.is_open());
    assert_eq!(opener.opens.load(Ordering::SeqCst), 2);
}
