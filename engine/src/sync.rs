use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use common::constant::{
    DEFAULT_CHECKPOINT_EVERY_PAGES, DEFAULT_MAX_CONSECUTIVE_EMPTY_PAGES,
    DEFAULT_MAX_PAGES_PER_RUN, DEFAULT_PAGE_DELAY_MS,
};
use common::{env_override, SyncResult};
use connector::{PageCursor, RequestSource, RequestsPage};
use store::{CursorAdvance, SyncStore};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::aggregate::aggregate_page;
use crate::retry::{is_transient, RetryPolicy};

#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Pages fetched per invocation, empty ones included.
    pub max_pages_per_run: usize,
    /// Consecutive empty pages read as end-of-data even when a token keeps coming.
    pub max_consecutive_empty_pages: usize,
    /// Standalone continuation checkpoint cadence in pages; 0 disables it.
    pub checkpoint_every_pages: usize,
    pub page_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_pages_per_run: DEFAULT_MAX_PAGES_PER_RUN,
            max_consecutive_empty_pages: DEFAULT_MAX_CONSECUTIVE_EMPTY_PAGES,
            checkpoint_every_pages: DEFAULT_CHECKPOINT_EVERY_PAGES,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(pages) = env_override::<usize>("LEADERBOARD_MAX_PAGES_PER_RUN") {
            cfg.max_pages_per_run = pages.max(1);
        }
        if let Some(empty) = env_override::<usize>("LEADERBOARD_MAX_EMPTY_PAGES") {
            cfg.max_consecutive_empty_pages = empty.max(1);
        }
        if let Some(every) = env_override::<usize>("LEADERBOARD_CHECKPOINT_EVERY") {
            cfg.checkpoint_every_pages = every;
        }
        if let Some(delay_ms) = env_override::<u64>("LEADERBOARD_PAGE_DELAY_MS") {
            cfg.page_delay = Duration::from_millis(delay_ms);
        }
        cfg
    }
}

/// One sync invocation: resume the upstream pagination, fold every page into
/// the ledger, and move the cursor.
///
/// Each non-empty page is committed together with the cursor change it implies,
/// so an aborted run leaves the store exactly as of its last committed page.
/// Overlapping invocations must be prevented by the caller (see `JobLock`).
pub async fn run_sync<S, St>(source: &S, store: &St, cfg: &SyncConfig) -> Result<SyncResult>
where
    S: RequestSource + ?Sized,
    St: SyncStore + ?Sized,
{
    let started = Instant::now();
    let retry = &cfg.retry;
    let max_pages = cfg.max_pages_per_run.max(1);
    let max_empty = cfg.max_consecutive_empty_pages.max(1);

    let cursor = retry
        .run("load cursor", move || store.load_cursor())
        .await?;
    info!(
        watermark = cursor.last_processed_timestamp,
        resuming = cursor.last_continuation.is_some(),
        "sync run starting"
    );

    let mut result = SyncResult {
        last_timestamp: cursor.last_processed_timestamp,
        ..SyncResult::default()
    };
    let mut page_cursor = match cursor.last_continuation.clone() {
        Some(token) => PageCursor::from_continuation(token),
        None => PageCursor::from_watermark(cursor.last_processed_timestamp),
    };
    let mut run_max_ms = 0i64;
    let mut empty_streak = 0usize;

    loop {
        if result.pages_processed >= max_pages {
            if let Some(token) = page_cursor.continuation.as_deref() {
                retry
                    .run("save continuation", move || store.save_continuation(token))
                    .await?;
            }
            result.stopped_early = true;
            info!(
                pages = result.pages_processed,
                max_pages,
                "page budget exhausted, resuming next run"
            );
            break;
        }
        if result.pages_processed > 0 && !cfg.page_delay.is_zero() {
            sleep(cfg.page_delay).await;
        }

        let page = match fetch_page(source, retry, &page_cursor).await {
            Ok(page) => page,
            Err(err)
                if result.pages_processed == 0
                    && page_cursor.continuation.is_some()
                    && !is_transient(&err) =>
            {
                // Restarting from the watermark could re-apply committed pages, so
                // the cursor is left for an operator (`leaderboard reset-cursor`).
                error!(
                    error = %format!("{err:#}"),
                    "upstream rejected the saved continuation, cursor needs a manual reset"
                );
                return Err(err.context("saved continuation rejected"));
            }
            Err(err) => return Err(err),
        };
        result.pages_processed += 1;
        run_max_ms = run_max_ms.max(page.max_created_at_ms);
        debug!(
            page = result.pages_processed,
            requests = page.requests.len(),
            has_next = page.continuation.is_some(),
            "fetched page"
        );

        if page.is_empty() {
            empty_streak += 1;
            let next = match page.continuation {
                Some(token) if empty_streak < max_empty => token,
                token => {
                    info!(
                        empty_streak,
                        exhausted = token.is_none(),
                        "no more data upstream"
                    );
                    result.last_timestamp = retry
                        .run("complete run", move || store.complete_run(run_max_ms))
                        .await?;
                    break;
                }
            };
            page_cursor = PageCursor::from_continuation(next);
        } else {
            empty_streak = 0;
            let deltas = aggregate_page(&page.requests);
            let advance = match page.continuation.clone() {
                Some(continuation) => CursorAdvance::Resume {
                    continuation,
                    page_max_ms: page.max_created_at_ms,
                },
                None => CursorAdvance::Complete { run_max_ms },
            };
            let (deltas, advance) = (&deltas, &advance);
            let commit = retry
                .run("commit page", move || store.commit_page(deltas, advance))
                .await?;
            result.requests_processed += page.requests.len();
            result.wallets_upserted += commit.wallets_upserted;

            match page.continuation {
                Some(token) => page_cursor = PageCursor::from_continuation(token),
                None => {
                    result.last_timestamp = commit.watermark;
                    info!("pagination exhausted");
                    break;
                }
            }
        }

        if cfg.checkpoint_every_pages > 0
            && result.pages_processed % cfg.checkpoint_every_pages == 0
        {
            if let Some(token) = page_cursor.continuation.as_deref() {
                retry
                    .run("checkpoint continuation", move || store.save_continuation(token))
                    .await?;
                info!(
                    pages = result.pages_processed,
                    requests = result.requests_processed,
                    "continuation checkpoint saved"
                );
            }
        }
    }

    info!(
        pages = result.pages_processed,
        requests = result.requests_processed,
        wallets = result.wallets_upserted,
        last_timestamp = result.last_timestamp,
        stopped_early = result.stopped_early,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "sync run finished"
    );
    Ok(result)
}

async fn fetch_page<S>(
    source: &S,
    retry: &RetryPolicy,
    cursor: &PageCursor,
) -> Result<RequestsPage>
where
    S: RequestSource + ?Sized,
{
    retry
        .run("fetch page", move || async move {
            source
                .fetch_page(cursor)
                .await
                .map_err(anyhow::Error::from)
        })
        .await
        .context("fetch upstream requests page")
}
