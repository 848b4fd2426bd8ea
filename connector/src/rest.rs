use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::{debug, warn};

use common::constant::{RELAY_API_KEY_HEADER, RELAY_PAGE_LIMIT, RELAY_REQUESTS_PATH};

use crate::source::RequestSource;
use crate::types::{PageCursor, RelayRequestsResponse, RequestsPage};
use crate::utils::into_page;
use crate::ConnectorConfig;

const USER_AGENT: &str = "relay-leaderboard-sync";
const LOGGED_BODY_LIMIT: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error {code}: {body}")]
    HttpStatus { code: u16, body: String },
    #[error("unexpected response: {0}")]
    InvalidPayload(&'static str),
}

impl RestError {
    /// Network trouble, rate limiting and upstream 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            RestError::Http(err) => {
                err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
            }
            RestError::HttpStatus { code, .. } => *code == 429 || *code >= 500,
            RestError::InvalidPayload(_) => false,
        }
    }
}

/// Thin client over the upstream `GET /requests/v2` listing.
#[derive(Clone)]
pub struct RelayClient {
    http: Client,
    endpoint: String,
    page_limit: usize,
}

impl RelayClient {
    pub fn from_config(cfg: &ConnectorConfig) -> Result<Self, RestError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = cfg.api_key.as_deref().filter(|key| !key.is_empty()) {
            headers.insert(
                RELAY_API_KEY_HEADER,
                HeaderValue::from_str(key).map_err(|_| RestError::InvalidPayload("api key"))?,
            );
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}{}",
                cfg.base_url.trim_end_matches('/'),
                RELAY_REQUESTS_PATH
            ),
            page_limit: RELAY_PAGE_LIMIT,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn query_params(&self, cursor: &PageCursor) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.page_limit.to_string())];
        match (&cursor.continuation, cursor.start_timestamp) {
            (Some(token), _) if !token.is_empty() => {
                params.push(("continuation", token.clone()));
            }
            (_, Some(start)) if start > 0 => {
                params.push(("startTimestamp", start.to_string()));
            }
            _ => {}
        }
        params
    }

    /// Fetches one page. Errors surface unmodified; the caller owns retries.
    pub async fn fetch_requests(&self, cursor: &PageCursor) -> Result<RequestsPage, RestError> {
        let params = self.query_params(cursor);
        debug!(endpoint = %self.endpoint, ?params, "fetching relay requests page");
        let resp = self.http.get(&self.endpoint).query(&params).send().await?;
        let status = resp.status();
        let payload = resp.text().await?;
        if !status.is_success() {
            return Err(RestError::HttpStatus {
                code: status.as_u16(),
                body: truncate_payload(&payload, LOGGED_BODY_LIMIT),
            });
        }
        match serde_json::from_str::<RelayRequestsResponse>(&payload) {
            Ok(body) => Ok(into_page(body)),
            Err(err) => {
                warn!(
                    ?err,
                    endpoint = %self.endpoint,
                    payload = %truncate_payload(&payload, LOGGED_BODY_LIMIT),
                    "failed to decode relay response"
                );
                Err(RestError::InvalidPayload("decode requests page"))
            }
        }
    }
}

#[async_trait]
impl RequestSource for RelayClient {
    async fn fetch_page(&self, cursor: &PageCursor) -> Result<RequestsPage, RestError> {
        self.fetch_requests(cursor).await
    }
}

fn truncate_payload(payload: &str, max_len: usize) -> String {
    if payload.len() <= max_len {
        return payload.to_string();
    }
    let mut out = payload.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RelayClient {
        RelayClient::from_config(&ConnectorConfig {
            base_url: "http://localhost:9/".to_string(),
            ..ConnectorConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(client().endpoint(), "http://localhost:9/requests/v2");
    }

    #[test]
    fn continuation_takes_precedence_over_start_timestamp() {
        let cursor = PageCursor {
            continuation: Some("abc".into()),
            start_timestamp: Some(42),
        };
        let params = client().query_params(&cursor);
        assert!(params.contains(&("continuation", "abc".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "startTimestamp"));
    }

    #[test]
    fn zero_watermark_sends_no_start_timestamp() {
        let params = client().query_params(&PageCursor::from_watermark(0));
        assert_eq!(params, vec![("limit", "50".to_string())]);
        let params = client().query_params(&PageCursor::from_watermark(1_000));
        assert!(params.contains(&("startTimestamp", "1000".to_string())));
    }

    #[test]
    fn transient_classification() {
        let server = RestError::HttpStatus { code: 503, body: String::new() };
        let throttled = RestError::HttpStatus { code: 429, body: String::new() };
        let bad_request = RestError::HttpStatus { code: 400, body: String::new() };
        assert!(server.is_transient());
        assert!(throttled.is_transient());
        assert!(!bad_request.is_transient());
        assert!(!RestError::InvalidPayload("x").is_transient());
    }

    #[test]
    fn truncation_marks_cut_payloads() {
        assert_eq!(truncate_payload("short", 10), "short");
        assert_eq!(truncate_payload("abcdef", 3), "abc...");
    }
}
