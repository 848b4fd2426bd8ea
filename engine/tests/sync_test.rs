mod support;

use rust_decimal::Decimal;
use store::{load_wallet_volume, DbStore, SyncStore};
use support::{
    memory_store, request, test_config, EmptySource, EndlessSource, FlakyStore, PagedSource,
};

fn three_pages() -> PagedSource {
    PagedSource::new(vec![
        vec![
            request("0xA", "success", "10", 1_000),
            request("0xB", "success", "5", 1_100),
            request("0xC", "failure", "100", 1_200),
        ],
        vec![
            request("0xa", "success", "2.5", 1_300),
            request("0xB", "pending", "7", 1_400),
        ],
        vec![request("0xC", "success", "1", 1_500)],
    ])
}

async fn totals(store: &DbStore, wallet: &str) -> Option<(Decimal, i64)> {
    load_wallet_volume(store.connection(), wallet)
        .await
        .unwrap()
        .map(|row| (row.total_volume_usd, row.total_tx))
}

async fn assert_three_page_totals(store: &DbStore) {
    assert_eq!(totals(store, "0xa").await, Some((Decimal::new(125, 1), 2)));
    assert_eq!(totals(store, "0xb").await, Some((Decimal::new(5, 0), 1)));
    assert_eq!(totals(store, "0xc").await, Some((Decimal::new(1, 0), 1)));
}

#[tokio::test]
async fn test_full_run_applies_every_page_and_advances_watermark() {
    let store = memory_store().await;
    let source = three_pages();

    let result = engine::run_sync(&source, &store, &test_config(100))
        .await
        .unwrap();

    assert_eq!(result.pages_processed, 3);
    assert_eq!(result.requests_processed, 6);
    assert_eq!(result.wallets_upserted, 4);
    assert_eq!(result.last_timestamp, 1_500);
    assert!(!result.stopped_early);
    assert_three_page_totals(&store).await;

    let cursor = store.load_cursor().await.unwrap();
    assert_eq!(cursor.last_processed_timestamp, 1_500);
    assert!(cursor.last_continuation.is_none());
    assert_eq!(cursor.pending_timestamp, 0);
    let first = source.first_cursor().unwrap();
    assert!(first.continuation.is_none());
    assert!(first.start_timestamp.is_none(), "zero watermark starts from the beginning");
}

#[tokio::test]
async fn test_consecutive_empty_pages_with_tokens_terminate() {
    let store = memory_store().await;
    let source = EmptySource::new(true);

    let result = engine::run_sync(&source, &store, &test_config(100))
        .await
        .unwrap();

    assert_eq!(source.calls(), 3);
    assert_eq!(result.pages_processed, 3);
    assert!(!result.stopped_early);
    assert_eq!(result.requests_processed, 0);
    assert!(store.load_cursor().await.unwrap().last_continuation.is_none());
}

#[tokio::test]
async fn test_empty_page_without_token_ends_run() {
    let store = memory_store().await;
    let source = EmptySource::new(false);

    let result = engine::run_sync(&source, &store, &test_config(100))
        .await
        .unwrap();

    assert_eq!(source.calls(), 1);
    assert!(!result.stopped_early);
    assert_eq!(result.last_timestamp, 0);
}

#[tokio::test]
async fn test_page_cap_stops_early_and_keeps_last_token() {
    let store = memory_store().await;
    let source = EndlessSource::default();

    let result = engine::run_sync(&source, &store, &test_config(4))
        .await
        .unwrap();

    assert_eq!(source.calls(), 4);
    assert_eq!(result.pages_processed, 4);
    assert!(result.stopped_early);
    assert_eq!(result.last_timestamp, 0);

    let cursor = store.load_cursor().await.unwrap();
    assert_eq!(cursor.last_continuation.as_deref(), Some("t4"));
    assert_eq!(cursor.last_processed_timestamp, 0, "early stop leaves the watermark alone");
    assert_eq!(totals(&store, "0xendless").await, Some((Decimal::new(4, 0), 4)));
}

#[tokio::test]
async fn test_next_run_resumes_where_early_stop_left_off() {
    let store = memory_store().await;
    let source = PagedSource::new(vec![
        vec![request("0xA", "success", "1", 5_000)],
        vec![request("0xA", "success", "1", 6_000)],
        vec![request("0xA", "success", "1", 3_000)],
    ]);

    let first = engine::run_sync(&source, &store, &test_config(2))
        .await
        .unwrap();
    assert!(first.stopped_early);
    assert_eq!(
        store.load_cursor().await.unwrap().last_continuation.as_deref(),
        Some("p2")
    );

    let resumed = PagedSource::new(vec![
        vec![request("0xA", "success", "1", 5_000)],
        vec![request("0xA", "success", "1", 6_000)],
        vec![request("0xA", "success", "1", 3_000)],
    ]);
    let second = engine::run_sync(&resumed, &store, &test_config(10))
        .await
        .unwrap();

    assert_eq!(resumed.calls(), 1);
    assert_eq!(
        resumed.first_cursor().unwrap().continuation.as_deref(),
        Some("p2")
    );
    assert!(!second.stopped_early);
    assert_eq!(second.last_timestamp, 6_000, "chain maximum survives the early stop");
    assert_eq!(totals(&store, "0xa").await, Some((Decimal::new(3, 0), 3)));
}

#[tokio::test]
async fn test_failed_commit_is_reapplied_exactly_once_on_next_run() {
    let store = FlakyStore::new(memory_store().await);
    store.fail_commits([2, 3, 4]);
    let source = three_pages();

    let err = engine::run_sync(&source, &store, &test_config(100))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("connection dropped"));
    assert_eq!(store.commit_calls(), 4);
    assert_eq!(totals(store.inner(), "0xa").await, Some((Decimal::new(10, 0), 1)));
    let cursor = store.load_cursor().await.unwrap();
    assert_eq!(cursor.last_continuation.as_deref(), Some("p1"));
    assert_eq!(cursor.last_processed_timestamp, 0);

    let retry_source = three_pages();
    let result = engine::run_sync(&retry_source, &store, &test_config(100))
        .await
        .unwrap();
    assert_eq!(
        retry_source.first_cursor().unwrap().continuation.as_deref(),
        Some("p1")
    );
    assert_eq!(result.pages_processed, 2);
    assert_eq!(result.last_timestamp, 1_500);
    assert_three_page_totals(store.inner()).await;
}

#[tokio::test]
async fn test_transient_commit_failure_is_retried_in_place() {
    let store = FlakyStore::new(memory_store().await);
    store.fail_commits([1]);
    let source = three_pages();

    let result = engine::run_sync(&source, &store, &test_config(100))
        .await
        .unwrap();

    assert_eq!(source.calls(), 3, "retrying a commit does not refetch");
    assert_eq!(store.commit_calls(), 4);
    assert_eq!(result.wallets_upserted, 4);
    assert_three_page_totals(store.inner()).await;
}

#[tokio::test]
async fn test_watermark_never_moves_backwards() {
    let store = memory_store().await;
    store.complete_run(10_000).await.unwrap();
    let source = three_pages();

    let result = engine::run_sync(&source, &store, &test_config(100))
        .await
        .unwrap();

    assert_eq!(source.first_cursor().unwrap().start_timestamp, Some(10_000));
    assert_eq!(result.last_timestamp, 10_000);
    assert_eq!(
        store.load_cursor().await.unwrap().last_processed_timestamp,
        10_000
    );
}

#[tokio::test]
async fn test_upstream_client_error_aborts_without_retry() {
    let store = memory_store().await;
    let source = three_pages();
    source.reject_page(0);

    let err = engine::run_sync(&source, &store, &test_config(100))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("400"));
    assert_eq!(source.calls(), 1);
    assert_eq!(store.load_cursor().await.unwrap(), Default::default());
}

#[tokio::test]
async fn test_checkpoint_persists_token_reached_through_empty_pages() {
    let store = memory_store().await;
    let source = PagedSource::new(vec![
        Vec::new(),
        Vec::new(),
        vec![request("0xA", "success", "1", 1)],
    ]);
    source.reject_page(2);
    let mut cfg = test_config(100);
    cfg.max_consecutive_empty_pages = 5;
    cfg.checkpoint_every_pages = 2;

    assert!(engine::run_sync(&source, &store, &cfg).await.is_err());

    let cursor = store.load_cursor().await.unwrap();
    assert_eq!(cursor.last_continuation.as_deref(), Some("p2"));
}

#[tokio::test]
async fn test_rejected_saved_continuation_is_kept_for_manual_reset() {
    let store = memory_store().await;
    store.save_continuation("p1").await.unwrap();
    let source = three_pages();
    source.reject_page(1);

    let err = engine::run_sync(&source, &store, &test_config(100))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("saved continuation rejected"));
    assert_eq!(source.calls(), 1);
    assert_eq!(
        store.load_cursor().await.unwrap().last_continuation.as_deref(),
        Some("p1")
    );

    // Manual reset: abandon the chain and restart from the watermark.
    store.complete_run(0).await.unwrap();
    let fresh = three_pages();
    let result = engine::run_sync(&fresh, &store, &test_config(100))
        .await
        .unwrap();
    assert!(fresh.first_cursor().unwrap().continuation.is_none());
    assert_eq!(result.last_timestamp, 1_500);
}
