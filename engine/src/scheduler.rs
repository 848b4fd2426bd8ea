use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use common::constant::{DEFAULT_SNAPSHOT_MINUTE, DEFAULT_SYNC_INTERVAL_SECS};
use common::{env_override, SyncResult};
use connector::RequestSource;
use store::DbStore;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::guard::JobLock;
use crate::snapshot::{run_snapshot, SnapshotConfig};
use crate::sync::{run_sync, SyncConfig};

const HOUR_MS: u64 = 60 * 60 * 1000;

/// Result of a guarded job invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome<T> {
    Completed(T),
    /// Another invocation of the same job was still running.
    Skipped,
}

/// The two leaderboard jobs behind their single-flight locks.
///
/// Clones share locks, so the scheduler and manual triggers never overlap.
#[derive(Clone)]
pub struct LeaderboardJobs {
    source: Arc<dyn RequestSource>,
    store: DbStore,
    sync_cfg: SyncConfig,
    snapshot_cfg: SnapshotConfig,
    sync_lock: JobLock,
    snapshot_lock: JobLock,
}

impl LeaderboardJobs {
    pub fn new(
        source: Arc<dyn RequestSource>,
        store: DbStore,
        sync_cfg: SyncConfig,
        snapshot_cfg: SnapshotConfig,
    ) -> Self {
        Self {
            source,
            store,
            sync_cfg,
            snapshot_cfg,
            sync_lock: JobLock::new("sync"),
            snapshot_lock: JobLock::new("snapshot"),
        }
    }

    pub fn store(&self) -> &DbStore {
        &self.store
    }

    pub fn sync_running(&self) -> bool {
        self.sync_lock.is_running()
    }

    pub fn snapshot_running(&self) -> bool {
        self.snapshot_lock.is_running()
    }

    pub async fn trigger_sync(&self) -> Result<JobOutcome<SyncResult>> {
        let Some(_guard) = self.sync_lock.try_acquire() else {
            info!(job = self.sync_lock.name(), "previous run still in progress, skipping");
            return Ok(JobOutcome::Skipped);
        };
        let result = run_sync(self.source.as_ref(), &self.store, &self.sync_cfg).await?;
        Ok(JobOutcome::Completed(result))
    }

    pub async fn trigger_snapshot(&self) -> Result<JobOutcome<u64>> {
        let Some(_guard) = self.snapshot_lock.try_acquire() else {
            info!(job = self.snapshot_lock.name(), "previous run still in progress, skipping");
            return Ok(JobOutcome::Skipped);
        };
        let rows = run_snapshot(self.store.connection(), &self.snapshot_cfg).await?;
        Ok(JobOutcome::Completed(rows))
    }
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub sync_interval: Duration,
    /// Minute past the hour for the snapshot rebuild.
    pub snapshot_minute: u32,
    /// Run a sync, then a snapshot, right away.
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            snapshot_minute: DEFAULT_SNAPSHOT_MINUTE,
            run_on_start: true,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(secs) = env_override::<u64>("LEADERBOARD_SYNC_INTERVAL_SECS") {
            cfg.sync_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(minute) = env_override::<u32>("LEADERBOARD_SNAPSHOT_MINUTE") {
            cfg.snapshot_minute = minute % 60;
        }
        cfg
    }
}

/// Drives both jobs on their cadence until `shutdown` resolves.
///
/// Ticks are spawned so a long sync never delays the snapshot; the job locks
/// turn overlapping ticks into logged skips.
pub async fn run_scheduler<F>(jobs: LeaderboardJobs, cfg: SchedulerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!(
        sync_interval_secs = cfg.sync_interval.as_secs(),
        snapshot_minute = cfg.snapshot_minute,
        "scheduler started"
    );

    if cfg.run_on_start {
        let initial = jobs.clone();
        tokio::spawn(async move {
            sync_tick(&initial).await;
            snapshot_tick(&initial).await;
        });
    }

    let period = cfg.sync_interval.max(Duration::from_secs(1));
    let mut sync_ticker = interval_at(Instant::now() + period, period);
    sync_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let snapshot_timer = sleep_until(next_snapshot_instant(cfg.snapshot_minute));
    tokio::pin!(snapshot_timer);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("scheduler stopping");
                break;
            }
            _ = sync_ticker.tick() => {
                let jobs = jobs.clone();
                tokio::spawn(async move { sync_tick(&jobs).await });
            }
            _ = &mut snapshot_timer => {
                let jobs = jobs.clone();
                tokio::spawn(async move { snapshot_tick(&jobs).await });
                snapshot_timer
                    .as_mut()
                    .reset(next_snapshot_instant(cfg.snapshot_minute));
            }
        }
    }
    Ok(())
}

async fn sync_tick(jobs: &LeaderboardJobs) {
    match jobs.trigger_sync().await {
        Ok(JobOutcome::Completed(result)) => info!(?result, "scheduled sync done"),
        Ok(JobOutcome::Skipped) => {}
        Err(err) => error!(error = %format!("{err:#}"), "scheduled sync failed"),
    }
}

async fn snapshot_tick(jobs: &LeaderboardJobs) {
    match jobs.trigger_snapshot().await {
        Ok(JobOutcome::Completed(rows)) => info!(rows, "scheduled snapshot done"),
        Ok(JobOutcome::Skipped) => {}
        Err(err) => error!(error = %format!("{err:#}"), "scheduled snapshot failed"),
    }
}

fn next_snapshot_instant(minute: u32) -> Instant {
    Instant::now() + delay_until_minute(Utc::now(), minute)
}

/// Time from `now` to the next `hh:minute:00`, strictly in the future.
pub fn delay_until_minute(now: DateTime<Utc>, minute: u32) -> Duration {
    let target_ms = u64::from(minute % 60) * 60_000;
    let elapsed_ms = u64::from(now.minute()) * 60_000
        + u64::from(now.second()) * 1_000
        + u64::from(now.nanosecond().min(999_999_999) / 1_000_000);
    let delay_ms = if target_ms > elapsed_ms {
        target_ms - elapsed_ms
    } else {
        HOUR_MS - elapsed_ms + target_ms
    };
    Duration::from_millis(delay_ms)
}
