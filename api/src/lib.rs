use std::future::Future;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use common::constant::{LEADERBOARD_PAGE_SIZE, LEADERBOARD_TOP_N};
use common::normalize_wallet;
use engine::{JobOutcome, LeaderboardJobs};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use store::entities::leaderboard_top;
use store::{count_leaderboard, find_wallet_rank, load_leaderboard_page};
use tokio::net::TcpListener;
use tracing::{error, info};

const MAX_PAGE: u64 = LEADERBOARD_TOP_N / LEADERBOARD_PAGE_SIZE;
const MAX_WALLET_LEN: usize = 128;

/// Shared handler state. `jobs` is only set when this process may run the jobs.
#[derive(Clone)]
pub struct ApiState {
    pub db: DatabaseConnection,
    pub jobs: Option<LeaderboardJobs>,
}

impl ApiState {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, jobs: None }
    }

    pub fn with_jobs(mut self, jobs: LeaderboardJobs) -> Self {
        self.jobs = Some(jobs);
        self
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/leaderboard", get(leaderboard_page))
        .route("/leaderboard/{wallet}", get(wallet_rank))
        .route("/jobs/sync", post(trigger_sync))
        .route("/jobs/snapshot", post(trigger_snapshot))
        .with_state(state)
}

/// Serves the API on `0.0.0.0:port` until `shutdown` resolves.
pub async fn serve<F>(state: ApiState, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind api server on {bind}"))?;
    info!(bind = %bind, "leaderboard api listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("axum api server failed")?;
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    fn bad_request(message: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    fn service_unavailable(message: &'static str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message,
        }
    }

    /// Logs the cause and hides it from the client.
    fn internal(message: &'static str, err: anyhow::Error) -> Self {
        error!(error = %format!("{err:#}"), "{message}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<String>,
}

/// Page number from the raw query value: unparsable means 1, range is `[1, MAX_PAGE]`.
fn clamp_page(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_PAGE as i64) as u64
}

#[derive(Debug, Serialize)]
struct LeaderboardEntry {
    rank: i64,
    wallet_address: String,
    #[serde(with = "rust_decimal::serde::float")]
    total_volume_usd: Decimal,
    total_tx: i64,
}

impl From<leaderboard_top::Model> for LeaderboardEntry {
    fn from(row: leaderboard_top::Model) -> Self {
        Self {
            rank: row.rank,
            wallet_address: row.wallet_address,
            total_volume_usd: row.total_volume_usd,
            total_tx: row.total_tx,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardResponse {
    data: Vec<LeaderboardEntry>,
    page: u64,
    total_pages: u64,
    total_wallets: u64,
    page_size: u64,
}

async fn leaderboard_page(
    State(state): State<ApiState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let page = clamp_page(query.page.as_deref());
    let offset = (page - 1) * LEADERBOARD_PAGE_SIZE;
    let (rows, total) = tokio::try_join!(
        load_leaderboard_page(&state.db, LEADERBOARD_PAGE_SIZE, offset),
        count_leaderboard(&state.db),
    )
    .map_err(|err| ApiError::internal("Failed to fetch leaderboard", err))?;

    Ok(Json(LeaderboardResponse {
        data: rows.into_iter().map(LeaderboardEntry::from).collect(),
        page,
        total_pages: total.div_ceil(LEADERBOARD_PAGE_SIZE),
        total_wallets: total,
        page_size: LEADERBOARD_PAGE_SIZE,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WalletRankResponse {
    in_top100k: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    rank: Option<i64>,
    #[serde(rename = "wallet_address")]
    wallet_address: String,
    #[serde(
        rename = "total_volume_usd",
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    total_volume_usd: Option<Decimal>,
    #[serde(rename = "total_tx", skip_serializing_if = "Option::is_none")]
    total_tx: Option<i64>,
}

fn is_valid_wallet(wallet: &str) -> bool {
    wallet.len() <= MAX_WALLET_LEN && wallet.chars().all(|c| c.is_ascii_alphanumeric())
}

async fn wallet_rank(
    State(state): State<ApiState>,
    Path(wallet): Path<String>,
) -> Result<Json<WalletRankResponse>, ApiError> {
    let Some(wallet) = normalize_wallet(&wallet) else {
        return Err(ApiError::bad_request("Wallet address required"));
    };
    if !is_valid_wallet(&wallet) {
        return Err(ApiError::bad_request("Invalid wallet address"));
    }
    let row = find_wallet_rank(&state.db, &wallet)
        .await
        .map_err(|err| ApiError::internal("Failed to fetch wallet rank", err))?;

    let response = match row {
        Some(row) => WalletRankResponse {
            in_top100k: true,
            rank: Some(row.rank),
            wallet_address: row.wallet_address,
            total_volume_usd: Some(row.total_volume_usd),
            total_tx: Some(row.total_tx),
        },
        None => WalletRankResponse {
            in_top100k: false,
            rank: None,
            wallet_address: wallet,
            total_volume_usd: None,
            total_tx: None,
        },
    };
    Ok(Json(response))
}

fn jobs(state: &ApiState) -> Result<&LeaderboardJobs, ApiError> {
    state
        .jobs
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Jobs are not enabled on this server"))
}

async fn trigger_sync(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let outcome = jobs(&state)?
        .trigger_sync()
        .await
        .map_err(|err| ApiError::internal("Sync job failed", err))?;
    Ok(Json(match outcome {
        JobOutcome::Completed(result) => json!({ "status": "completed", "result": result }),
        JobOutcome::Skipped => json!({ "status": "skipped" }),
    }))
}

async fn trigger_snapshot(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let outcome = jobs(&state)?
        .trigger_snapshot()
        .await
        .map_err(|err| ApiError::internal("Snapshot job failed", err))?;
    Ok(Json(match outcome {
        JobOutcome::Completed(rows) => json!({ "status": "completed", "rows": rows }),
        JobOutcome::Skipped => json!({ "status": "skipped" }),
    }))
}
