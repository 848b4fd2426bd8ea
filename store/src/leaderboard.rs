use anyhow::Result;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

use common::normalize_wallet;

use crate::entities::leaderboard_top;

pub async fn load_leaderboard_page<C: ConnectionTrait>(
    db: &C,
    limit: u64,
    offset: u64,
) -> Result<Vec<leaderboard_top::Model>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let rows = leaderboard_top::Entity::find()
        .order_by_asc(leaderboard_top::Column::Rank)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?;
    Ok(rows)
}

pub async fn count_leaderboard<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(leaderboard_top::Entity::find().count(db).await?)
}

/// Looks a wallet up in the published snapshot; the address is normalized first.
pub async fn find_wallet_rank<C: ConnectionTrait>(
    db: &C,
    wallet: &str,
) -> Result<Option<leaderboard_top::Model>> {
    let Some(normalized) = normalize_wallet(wallet) else {
        return Ok(None);
    };
    let row = leaderboard_top::Entity::find()
        .filter(leaderboard_top::Column::WalletAddress.eq(normalized))
        .one(db)
        .await?;
    Ok(row)
}
