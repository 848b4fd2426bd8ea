use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use common::{env_override, WalletDelta};
use sea_orm::sea_query::{Alias, Expr, OnConflict};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, TransactionTrait,
};
use tracing::{debug, info};

pub mod entities;
pub mod leaderboard;
pub mod migration;
pub mod snapshot;

use entities::{sync_state, wallet_volume, SYNC_STATE_ID};

pub use leaderboard::{count_leaderboard, find_wallet_rank, load_leaderboard_page};
pub use snapshot::rebuild_leaderboard;

const UPSERT_BATCH_SIZE: usize = 500;

#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    pub database_url: Option<String>,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env_override::<String>("DATABASE_URL").filter(|url| !url.is_empty()),
        }
    }
}

/// Opens the database and brings the schema up to date.
pub async fn connect_db(cfg: &StoreConfig) -> Result<DatabaseConnection> {
    let url = cfg
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow!("DATABASE_URL not set"))?;
    let db = Database::connect(url)
        .await
        .context("connect to database")?;
    migration::run_migrations(&db)
        .await
        .context("run migrations")?;
    info!(backend = ?db.get_database_backend(), "store connected");
    Ok(db)
}

/// Resume state of the upstream pagination.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncCursor {
    pub last_processed_timestamp: i64,
    pub last_continuation: Option<String>,
    pub pending_timestamp: i64,
}

impl From<sync_state::Model> for SyncCursor {
    fn from(row: sync_state::Model) -> Self {
        Self {
            last_processed_timestamp: row.last_processed_timestamp,
            last_continuation: row.last_continuation,
            pending_timestamp: row.pending_timestamp,
        }
    }
}

/// Cursor change committed together with a page's wallet deltas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CursorAdvance {
    /// More pages follow: remember where, and the page's newest `createdAt`.
    Resume { continuation: String, page_max_ms: i64 },
    /// Pagination is exhausted: fold everything seen into the watermark.
    Complete { run_max_ms: i64 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageCommit {
    pub wallets_upserted: usize,
    /// Watermark after the commit.
    pub watermark: i64,
}

/// Persistence used by the sync orchestrator.
///
/// `commit_page` is all-or-nothing: wallet deltas and the cursor change land together.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn load_cursor(&self) -> Result<SyncCursor>;
    async fn commit_page(&self, deltas: &[WalletDelta], advance: &CursorAdvance)
        -> Result<PageCommit>;
    async fn save_continuation(&self, continuation: &str) -> Result<()>;
    /// Ends a pagination chain without a page to commit. Returns the new watermark.
    async fn complete_run(&self, observed_max_ms: i64) -> Result<i64>;
}

#[derive(Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl SyncStore for DbStore {
    async fn load_cursor(&self) -> Result<SyncCursor> {
        Ok(load_state_row(&self.db).await?.into())
    }

    async fn commit_page(
        &self,
        deltas: &[WalletDelta],
        advance: &CursorAdvance,
    ) -> Result<PageCommit> {
        let txn = self.db.begin().await?;
        let wallets_upserted = upsert_wallet_deltas(&txn, deltas).await?;
        let watermark = apply_cursor_advance(&txn, advance).await?;
        txn.commit().await?;
        debug!(wallets_upserted, watermark, "page committed");
        Ok(PageCommit {
            wallets_upserted,
            watermark,
        })
    }

    async fn save_continuation(&self, continuation: &str) -> Result<()> {
        let result = sync_state::Entity::update_many()
            .col_expr(
                sync_state::Column::LastContinuation,
                Expr::value(continuation.to_string()),
            )
            .col_expr(sync_state::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sync_state_key())
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(missing_state_row());
        }
        Ok(())
    }

    async fn complete_run(&self, observed_max_ms: i64) -> Result<i64> {
        let txn = self.db.begin().await?;
        let watermark = apply_cursor_advance(
            &txn,
            &CursorAdvance::Complete {
                run_max_ms: observed_max_ms,
            },
        )
        .await?;
        txn.commit().await?;
        Ok(watermark)
    }
}

fn sync_state_key() -> sea_orm::sea_query::SimpleExpr {
    sync_state::Column::Id.eq(SYNC_STATE_ID)
}

fn missing_state_row() -> anyhow::Error {
    anyhow!("relay_sync_state row id={SYNC_STATE_ID} missing; run migrations")
}

async fn load_state_row<C: ConnectionTrait>(db: &C) -> Result<sync_state::Model> {
    sync_state::Entity::find_by_id(SYNC_STATE_ID)
        .one(db)
        .await?
        .ok_or_else(missing_state_row)
}

async fn apply_cursor_advance<C: ConnectionTrait>(
    db: &C,
    advance: &CursorAdvance,
) -> Result<i64> {
    let row = load_state_row(db).await?;
    let current = row.last_processed_timestamp;
    let pending = row.pending_timestamp;
    let mut model = row.into_active_model();
    let watermark = match advance {
        CursorAdvance::Resume {
            continuation,
            page_max_ms,
        } => {
            model.last_continuation = Set(Some(continuation.clone()));
            model.pending_timestamp = Set(pending.max(*page_max_ms));
            current
        }
        CursorAdvance::Complete { run_max_ms } => {
            let next = current.max(pending).max(*run_max_ms);
            model.last_processed_timestamp = Set(next);
            model.last_continuation = Set(None);
            model.pending_timestamp = Set(0);
            next
        }
    };
    model.updated_at = Set(Utc::now());
    model.update(db).await?;
    Ok(watermark)
}

/// Additively merges deltas into the ledger. Returns the number of rows touched.
pub async fn upsert_wallet_deltas<C: ConnectionTrait>(
    db: &C,
    deltas: &[WalletDelta],
) -> Result<usize> {
    if deltas.is_empty() {
        return Ok(0);
    }
    let now = Utc::now();
    let mut batch = Vec::with_capacity(UPSERT_BATCH_SIZE.min(deltas.len()));
    for delta in deltas {
        batch.push(wallet_volume::ActiveModel {
            wallet_address: Set(delta.wallet.clone()),
            total_volume_usd: Set(delta.volume_delta),
            total_tx: Set(delta.tx_delta),
            last_updated: Set(now),
        });
        if batch.len() >= UPSERT_BATCH_SIZE {
            flush_wallet_batch(db, &mut batch).await?;
        }
    }
    if !batch.is_empty() {
        flush_wallet_batch(db, &mut batch).await?;
    }
    Ok(deltas.len())
}

async fn flush_wallet_batch<C: ConnectionTrait>(
    db: &C,
    batch: &mut Vec<wallet_volume::ActiveModel>,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let models = std::mem::take(batch);
    let excluded = || Alias::new("excluded");
    wallet_volume::Entity::insert_many(models)
        .on_conflict(
            OnConflict::column(wallet_volume::Column::WalletAddress)
                .value(
                    wallet_volume::Column::TotalVolumeUsd,
                    Expr::col((wallet_volume::Entity, wallet_volume::Column::TotalVolumeUsd))
                        .add(Expr::col((excluded(), wallet_volume::Column::TotalVolumeUsd))),
                )
                .value(
                    wallet_volume::Column::TotalTx,
                    Expr::col((wallet_volume::Entity, wallet_volume::Column::TotalTx))
                        .add(Expr::col((excluded(), wallet_volume::Column::TotalTx))),
                )
                .update_column(wallet_volume::Column::LastUpdated)
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

pub async fn load_wallet_volume<C: ConnectionTrait>(
    db: &C,
    wallet: &str,
) -> Result<Option<wallet_volume::Model>> {
    let Some(normalized) = common::normalize_wallet(wallet) else {
        return Ok(None);
    };
    Ok(wallet_volume::Entity::find_by_id(normalized).one(db).await?)
}
