use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::sea_query::{Alias, ColumnDef, Expr, Index, Order, Query, Table};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::info;

use crate::entities::{leaderboard_top, wallet_volume};

pub const LEADERBOARD_TABLE: &str = "leaderboard_top_100k";
const STAGING_TABLE: &str = "leaderboard_top_100k_staging";
const RETIRED_TABLE: &str = "leaderboard_top_100k_old";

static BUILD_SEQ: AtomicU32 = AtomicU32::new(0);

/// Rebuilds the ranked snapshot from the ledger and swaps it in. Returns the row count.
///
/// Runs in one transaction: on any error the published snapshot is left untouched.
/// Ranks follow `total_volume_usd DESC, wallet_address ASC` with no gaps.
pub async fn rebuild_leaderboard(db: &DatabaseConnection, top_n: u64) -> Result<u64> {
    let backend = db.get_database_backend();
    let built_at = Utc::now();
    // Index names are schema-global and survive the rename, so every build gets its own.
    let suffix = format!(
        "{}_{}",
        built_at.timestamp_millis(),
        BUILD_SEQ.fetch_add(1, AtomicOrdering::Relaxed)
    );

    let txn = db.begin().await?;

    let drop_staging = Table::drop()
        .table(Alias::new(STAGING_TABLE))
        .if_exists()
        .to_owned();
    txn.execute(backend.build(&drop_staging)).await?;

    let create_staging = Table::create()
        .table(Alias::new(STAGING_TABLE))
        .col(
            ColumnDef::new(leaderboard_top::Column::Rank)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(leaderboard_top::Column::WalletAddress)
                .string()
                .not_null(),
        )
        .col(
            ColumnDef::new(leaderboard_top::Column::TotalVolumeUsd)
                .decimal()
                .not_null(),
        )
        .col(
            ColumnDef::new(leaderboard_top::Column::TotalTx)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(leaderboard_top::Column::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .to_owned();
    txn.execute(backend.build(&create_staging))
        .await
        .context("create staging snapshot")?;

    let ranked = Query::select()
        .expr_as(
            Expr::cust("ROW_NUMBER() OVER (ORDER BY total_volume_usd DESC, wallet_address ASC)"),
            leaderboard_top::Column::Rank,
        )
        .column(wallet_volume::Column::WalletAddress)
        .column(wallet_volume::Column::TotalVolumeUsd)
        .column(wallet_volume::Column::TotalTx)
        .expr(Expr::val(built_at))
        .from(wallet_volume::Entity)
        .order_by(wallet_volume::Column::TotalVolumeUsd, Order::Desc)
        .order_by(wallet_volume::Column::WalletAddress, Order::Asc)
        .limit(top_n)
        .to_owned();
    let fill_staging = Query::insert()
        .into_table(Alias::new(STAGING_TABLE))
        .columns([
            leaderboard_top::Column::Rank,
            leaderboard_top::Column::WalletAddress,
            leaderboard_top::Column::TotalVolumeUsd,
            leaderboard_top::Column::TotalTx,
            leaderboard_top::Column::UpdatedAt,
        ])
        .select_from(ranked)?
        .to_owned();
    let rows = txn
        .execute(backend.build(&fill_staging))
        .await
        .context("fill staging snapshot")?
        .rows_affected();

    let rank_idx = Index::create()
        .name(format!("idx_leaderboard_rank_{suffix}"))
        .table(Alias::new(STAGING_TABLE))
        .col(leaderboard_top::Column::Rank)
        .to_owned();
    txn.execute(backend.build(&rank_idx)).await?;
    let wallet_idx = Index::create()
        .name(format!("uq_leaderboard_wallet_{suffix}"))
        .table(Alias::new(STAGING_TABLE))
        .col(leaderboard_top::Column::WalletAddress)
        .unique()
        .to_owned();
    txn.execute(backend.build(&wallet_idx)).await?;

    let drop_retired = Table::drop()
        .table(Alias::new(RETIRED_TABLE))
        .if_exists()
        .to_owned();
    txn.execute(backend.build(&drop_retired)).await?;
    let retire_live = Table::rename()
        .table(Alias::new(LEADERBOARD_TABLE), Alias::new(RETIRED_TABLE))
        .to_owned();
    txn.execute(backend.build(&retire_live))
        .await
        .context("retire live snapshot")?;
    txn.execute(backend.build(&drop_retired)).await?;
    let publish = Table::rename()
        .table(Alias::new(STAGING_TABLE), Alias::new(LEADERBOARD_TABLE))
        .to_owned();
    txn.execute(backend.build(&publish)).await?;

    txn.commit().await?;
    info!(rows, top_n, "leaderboard snapshot swapped in");
    Ok(rows)
}
