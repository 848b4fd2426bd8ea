/// Base URL for the Relay settlement API.
pub const RELAY_API_BASE: &str = "https://api.relay.link";
/// Path of the paginated transaction-request listing.
pub const RELAY_REQUESTS_PATH: &str = "/requests/v2";
/// Records requested per upstream page. Protocol constant, not caller-controlled.
pub const RELAY_PAGE_LIMIT: usize = 50;
/// HTTP timeout for a single upstream page request.
pub const RELAY_HTTP_TIMEOUT_SECS: u64 = 60;
/// Header carrying the optional Relay API key.
pub const RELAY_API_KEY_HEADER: &str = "x-relay-api-key";

/// Throttle between successive upstream page fetches.
pub const DEFAULT_PAGE_DELAY_MS: u64 = 150;
/// Upper bound on pages fetched by one sync invocation.
pub const DEFAULT_MAX_PAGES_PER_RUN: usize = 5_000;
/// Consecutive empty pages treated as end-of-data.
pub const DEFAULT_MAX_CONSECUTIVE_EMPTY_PAGES: usize = 3;
/// Pages between standalone continuation checkpoints.
pub const DEFAULT_CHECKPOINT_EVERY_PAGES: usize = 50;

/// Attempts per fallible sync step before the run fails.
pub const DEFAULT_RETRY_ATTEMPTS: usize = 3;
/// Base delay of the exponential retry backoff.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 2_000;

/// Number of wallets materialized in the ranked snapshot.
pub const LEADERBOARD_TOP_N: u64 = 100_000;
/// Rows per leaderboard page served by the read API.
pub const LEADERBOARD_PAGE_SIZE: u64 = 50;

/// Sync cadence used by the scheduler.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 10 * 60;
/// Minute past each hour at which the scheduler rebuilds the snapshot.
pub const DEFAULT_SNAPSHOT_MINUTE: u32 = 5;

/// Default listen port of the read API.
pub const DEFAULT_API_PORT: u16 = 3001;
