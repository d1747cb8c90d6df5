mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use cmdseek::search::{self, SearchOptions};
use cmdseek::Error;
use common::{manager, root, CountingOpener, FixedEmbedder, FixedLoader};

#[tokio::test]
async fn test_empty_store_returns_no_results_without_embedder() {
    let loader = FixedLoader::unavailable();
    let lm = manager(CountingOpener::new(Duration::ZERO), loader.clone());

    let results = search::search(&lm, root(), "deploy", SearchOptions::default())
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_embedder_is_an_error_not_a_text_match() {
    let lm = manager(CountingOpener::new(Duration::ZERO), FixedLoader::unavailable());
    let store = lm.init_store(root()).await.unwrap();
    // a summary that would match "deploy" as a substring
    store
        .upsert_summary("shell:/w/deploy.sh:deploy", "h", "Deploys to staging.", None)
        .unwrap();

    let result = search::search(&lm, root(), "deploy", SearchOptions::default()).await;

    assert!(matches!(result, Err(Error::Unavailable(_))));
}

#[tokio::test]
async fn test_store_failure_is_surfaced() {
    let lm = manager(
        CountingOpener::failing_first(1, Duration::ZERO),
        FixedLoader::unavailable(),
    );

    let result = search::search(&lm, root(), "anything", SearchOptions::default()).await;

    assert_eq!(result, Err(Error::Storage("disk unavailable".into())));
}

#[tokio::test]
async fn test_query_embedding_failure_is_surfaced() {
    let lm = manager(
        CountingOpener::new(Duration::ZERO),
        FixedLoader::with(FixedEmbedder::failing()),
    );
    let store = lm.init_store(root()).await.unwrap();
    store.upsert_summary("a", "h", "Runs tests.", None).unwrap();

    let result = search::search(&lm, root(), "tests", SearchOptions::default()).await;

    assert!(matches!(result, Err(Error::Unavailable(_))));
}

#[tokio::test]
async fn test_threshold_and_unembedded_rows() {
    let lm = manager(
        CountingOpener::new(Duration::ZERO),
        FixedLoader::with(FixedEmbedder::new(vec![1.0, 0.0])),
    );
    let store = lm.init_store(root()).await.unwrap();
    store.upsert_summary("close", "h", "Builds.", None).unwrap();
    store.upsert_embedding("close", &[0.9, 0.1]).unwrap();
    store.upsert_summary("far", "h", "Cleans.", None).unwrap();
    store.upsert_embedding("far", &[0.0, 1.0]).unwrap();
    store.upsert_summary("pending", "h", "Lints.", None).unwrap();
    store.register_command("unsummarised", "h").unwrap();

    let results = search::search(&lm, root(), "build", SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "close");

    let hits = search::describe_hits(&store, &results).unwrap();
    assert_eq!(hits[0].summary.as_deref(), Some("Builds."));
}

#[tokio::test]
async fn test_top_k_limits_results() {
    let lm = manager(
        CountingOpener::new(Duration::ZERO),
        FixedLoader::with(FixedEmbedder::new(vec![1.0, 0.0])),
    );
    let store = lm.init_store(root()).await.unwrap();
    for (id, v) in [("a", [0.5f32, 0.5]), ("b", [1.0, 0.0]), ("c", [0.7, 0.3]), ("d", [0.9, 0.05])] {
        store.upsert_summary(id, "h", "Does things.", None).unwrap();
        store.upsert_embedding(id, &v).unwrap();
    }

    let options = SearchOptions {
        top_k: 2,
        threshold: 0.3,
    };
    let results = search::search(&lm, root(), "q", options).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "d"]);
}
