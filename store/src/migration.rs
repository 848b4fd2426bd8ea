use chrono::Utc;
use sea_orm::sea_query::{Index, OnConflict};
use sea_orm::ActiveValue::Set;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema};

use crate::entities::{leaderboard_top, sync_state, wallet_volume, SYNC_STATE_ID};

/// Creates missing tables and seeds the cursor row. Safe to run on every start.
pub async fn run_migrations<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut sync_state_stmt = schema.create_table_from_entity(sync_state::Entity);
    sync_state_stmt.if_not_exists();
    db.execute(backend.build(&sync_state_stmt)).await?;

    let mut wallet_volume_stmt = schema.create_table_from_entity(wallet_volume::Entity);
    wallet_volume_stmt.if_not_exists();
    db.execute(backend.build(&wallet_volume_stmt)).await?;

    let mut leaderboard_stmt = schema.create_table_from_entity(leaderboard_top::Entity);
    leaderboard_stmt.if_not_exists();
    db.execute(backend.build(&leaderboard_stmt)).await?;

    create_indexes(db).await?;
    seed_sync_state(db).await?;
    Ok(())
}

async fn create_indexes<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let volume_idx = Index::create()
        .if_not_exists()
        .name("idx_wallet_volume_total_volume")
        .table(wallet_volume::Entity)
        .col(wallet_volume::Column::TotalVolumeUsd)
        .to_owned();
    db.execute(backend.build(&volume_idx)).await?;
    Ok(())
}

async fn seed_sync_state<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let seed = sync_state::ActiveModel {
        id: Set(SYNC_STATE_ID),
        last_processed_timestamp: Set(0),
        last_continuation: Set(None),
        pending_timestamp: Set(0),
        updated_at: Set(Utc::now()),
    };
    sync_state::Entity::insert(seed)
        .on_conflict(
            OnConflict::column(sync_state::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}
