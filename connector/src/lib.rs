mod rest;
mod source;
mod types;
mod utils;

use common::constant::{RELAY_API_BASE, RELAY_HTTP_TIMEOUT_SECS};
use common::env_override;

pub use rest::{RelayClient, RestError};
pub use source::RequestSource;
pub use types::{
    CurrencyIn, PageCursor, RelayRequest, RelayRequestData, RequestMetadata, RequestStatus,
    RequestsPage,
};
pub use utils::{max_created_at_ms, parse_created_at_ms, parse_decimal, volume_usd};

#[derive(Clone, Debug)]
pub struct ConnectorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_url: RELAY_API_BASE.to_string(),
            api_key: None,
            timeout_secs: RELAY_HTTP_TIMEOUT_SECS,
        }
    }
}

impl ConnectorConfig {
    /// Defaults overlaid with `RELAY_API_BASE` and `RELAY_API_KEY`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(base) = env_override::<String>("RELAY_API_BASE").filter(|v| !v.is_empty()) {
            cfg.base_url = base;
        }
        cfg.api_key = env_override::<String>("RELAY_API_KEY").filter(|v| !v.is_empty());
        cfg
    }
}
