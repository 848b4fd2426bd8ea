#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::WalletDelta;
use connector::{
    max_created_at_ms, PageCursor, RelayRequest, RequestSource, RequestsPage, RestError,
};
use engine::{RetryPolicy, SyncConfig};
use serde_json::json;
use store::{
    connect_db, CursorAdvance, DbStore, PageCommit, StoreConfig, SyncCursor, SyncStore,
};

pub async fn memory_store() -> DbStore {
    let db = connect_db(&StoreConfig {
        database_url: Some("sqlite::memory:".to_string()),
    })
    .await
    .unwrap();
    DbStore::new(db)
}

pub fn test_config(max_pages: usize) -> SyncConfig {
    SyncConfig {
        max_pages_per_run: max_pages,
        max_consecutive_empty_pages: 3,
        checkpoint_every_pages: 0,
        page_delay: Duration::ZERO,
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
    }
}

pub fn request(user: &str, status: &str, amount_usd: &str, created_at_ms: i64) -> RelayRequest {
    serde_json::from_value(json!({
        "id": format!("{user}-{created_at_ms}"),
        "status": status,
        "user": user,
        "createdAt": created_at_ms.to_string(),
        "data": { "metadata": { "currencyIn": { "amountUsd": amount_usd } } }
    }))
    .unwrap()
}

pub fn page(requests: Vec<RelayRequest>, continuation: Option<&str>) -> RequestsPage {
    RequestsPage {
        max_created_at_ms: max_created_at_ms(&requests),
        continuation: continuation.map(str::to_string),
        requests,
    }
}

/// Fixed chain of pages. Page `i` links to page `i + 1` with token `p{i+1}`.
pub struct PagedSource {
    pages: Vec<Vec<RelayRequest>>,
    failing_pages: Mutex<HashSet<usize>>,
    pub seen: Mutex<Vec<PageCursor>>,
}

impl PagedSource {
    pub fn new(pages: Vec<Vec<RelayRequest>>) -> Self {
        Self {
            pages,
            failing_pages: Mutex::new(HashSet::new()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Makes fetching page `index` fail with a non-retryable upstream error.
    pub fn reject_page(&self, index: usize) {
        self.failing_pages.lock().unwrap().insert(index);
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn first_cursor(&self) -> Option<PageCursor> {
        self.seen.lock().unwrap().first().cloned()
    }
}

#[async_trait]
impl RequestSource for PagedSource {
    async fn fetch_page(&self, cursor: &PageCursor) -> Result<RequestsPage, RestError> {
        self.seen.lock().unwrap().push(cursor.clone());
        let index = match cursor.continuation.as_deref() {
            Some(token) => token
                .trim_start_matches('p')
                .parse::<usize>()
                .map_err(|_| RestError::InvalidPayload("unknown token"))?,
            None => 0,
        };
        if self.failing_pages.lock().unwrap().contains(&index) {
            return Err(RestError::HttpStatus {
                code: 400,
                body: "rejected".into(),
            });
        }
        let requests = self.pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < self.pages.len()).then(|| format!("p{}", index + 1));
        Ok(page(requests, next.as_deref()))
    }
}

/// Never runs dry: every page holds one success and a fresh token.
#[derive(Default)]
pub struct EndlessSource {
    calls: AtomicUsize,
}

impl EndlessSource {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestSource for EndlessSource {
    async fn fetch_page(&self, _cursor: &PageCursor) -> Result<RequestsPage, RestError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let requests = vec![request("0xEndless", "success", "1", 1_000 + n as i64)];
        Ok(page(requests, Some(&format!("t{n}"))))
    }
}

/// Returns empty pages, with or without a token.
pub struct EmptySource {
    with_token: bool,
    calls: AtomicUsize,
}

impl EmptySource {
    pub fn new(with_token: bool) -> Self {
        Self {
            with_token,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestSource for EmptySource {
    async fn fetch_page(&self, _cursor: &PageCursor) -> Result<RequestsPage, RestError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("empty-{n}");
        Ok(page(Vec::new(), self.with_token.then_some(token.as_str())))
    }
}

/// `DbStore` that fails selected `commit_page` calls before touching the database.
pub struct FlakyStore {
    inner: DbStore,
    commit_calls: AtomicUsize,
    failing_calls: Mutex<HashSet<usize>>,
}

impl FlakyStore {
    pub fn new(inner: DbStore) -> Self {
        Self {
            inner,
            commit_calls: AtomicUsize::new(0),
            failing_calls: Mutex::new(HashSet::new()),
        }
    }

    /// Fails the given 1-based commit attempts.
    pub fn fail_commits(&self, calls: impl IntoIterator<Item = usize>) {
        self.failing_calls.lock().unwrap().extend(calls);
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &DbStore {
        &self.inner
    }
}

#[async_trait]
impl SyncStore for FlakyStore {
    async fn load_cursor(&self) -> Result<SyncCursor> {
        self.inner.load_cursor().await
    }

    async fn commit_page(
        &self,
        deltas: &[WalletDelta],
        advance: &CursorAdvance,
    ) -> Result<PageCommit> {
        let call = self.commit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_calls.lock().unwrap().contains(&call) {
            return Err(anyhow!("connection dropped during commit {call}"));
        }
        self.inner.commit_page(deltas, advance).await
    }

    async fn save_continuation(&self, continuation: &str) -> Result<()> {
        self.inner.save_continuation(continuation).await
    }

    async fn complete_run(&self, observed_max_ms: i64) -> Result<i64> {
        self.inner.complete_run(observed_max_ms).await
    }
}
