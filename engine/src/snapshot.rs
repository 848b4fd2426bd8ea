use std::time::Instant;

use anyhow::Result;
use common::constant::LEADERBOARD_TOP_N;
use common::env_override;
use sea_orm::DatabaseConnection;
use store::rebuild_leaderboard;
use tracing::info;

use crate::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    pub top_n: u64,
    pub retry: RetryPolicy,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            top_n: LEADERBOARD_TOP_N,
            retry: RetryPolicy::default(),
        }
    }
}

impl SnapshotConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(top_n) = env_override::<u64>("LEADERBOARD_TOP_N") {
            cfg.top_n = top_n;
        }
        cfg
    }
}

/// Rebuilds and publishes the ranked snapshot. Returns the new row count.
///
/// A rebuild is all-or-nothing, so retrying a failed one is safe.
pub async fn run_snapshot(db: &DatabaseConnection, cfg: &SnapshotConfig) -> Result<u64> {
    let started = Instant::now();
    let top_n = cfg.top_n;
    let rows = cfg
        .retry
        .run("rebuild snapshot", move || rebuild_leaderboard(db, top_n))
        .await?;
    info!(
        rows,
        top_n,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "snapshot job finished"
    );
    Ok(rows)
}
