use serde::{Deserialize, Serialize};

pub mod constant;
pub mod logger;
pub mod wallet;

pub use constant::*;
pub use wallet::*;

/// Outcome of one sync invocation, reported to the caller for logging only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Upstream pages fetched, empty pages included.
    pub pages_processed: usize,
    pub requests_processed: usize,
    /// Wallet rows upserted, summed over pages.
    pub wallets_upserted: usize,
    /// Watermark after the run (unchanged when the run stopped early).
    pub last_timestamp: i64,
    /// True when the page budget ran out and pagination must resume next run.
    pub stopped_early: bool,
}

/// Reads an environment override, ignoring unset or unparsable values.
pub fn env_override<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}
