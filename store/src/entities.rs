use sea_orm::entity::prelude::*;

/// Primary key of the singleton cursor row.
pub const SYNC_STATE_ID: i32 = 1;

pub mod sync_state {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "relay_sync_state")]
    pub struct Model {
        /// Always `SYNC_STATE_ID`; the table holds exactly one row.
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        /// Watermark in ms. Only moves forward when a pagination chain completes.
        pub last_processed_timestamp: i64,
        /// Token for the next upstream page while a chain is in flight.
        pub last_continuation: Option<String>,
        /// Highest `createdAt` committed by the chain in flight, folded in on completion.
        pub pending_timestamp: i64,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod wallet_volume {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "wallet_volume")]
    pub struct Model {
        /// Lower-cased, trimmed wallet address.
        #[sea_orm(primary_key, auto_increment = false)]
        pub wallet_address: String,
        /// Lifetime USD volume of successful requests. Only grows.
        #[sea_orm(column_type = "Decimal(None)")]
        pub total_volume_usd: Decimal,
        /// Lifetime count of successful requests.
        pub total_tx: i64,
        pub last_updated: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod leaderboard_top {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "leaderboard_top_100k")]
    pub struct Model {
        /// 1-based position, gap free.
        pub rank: i64,
        #[sea_orm(primary_key, auto_increment = false)]
        pub wallet_address: String,
        #[sea_orm(column_type = "Decimal(None)")]
        pub total_volume_usd: Decimal,
        pub total_tx: i64,
        /// When the snapshot containing this row was built.
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
