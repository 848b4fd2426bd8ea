use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Lifecycle state of an upstream transaction request.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Success,
    Pending,
    Failure,
    Refund,
    Waiting,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RequestStatus {
    /// Only terminal successful requests count toward volume and tx totals.
    pub fn is_success(self) -> bool {
        matches!(self, RequestStatus::Success)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyIn {
    #[serde(default)]
    pub amount_usd: Option<Value>,
    #[serde(default)]
    pub amount_usd_current: Option<Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub currency_in: Option<CurrencyIn>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequestData {
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Option<RequestMetadata>,
}

/// One raw transaction request as returned by the upstream listing.
///
/// Every field decodes leniently: a null or mistyped value becomes its empty
/// form, so one odd record never fails the page it came in.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: RequestStatus,
    #[serde(default, deserialize_with = "string_only")]
    pub user: Option<String>,
    /// RFC 3339 text or epoch milliseconds; numbers are kept as their digits.
    #[serde(default, deserialize_with = "string_or_number")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub data: Option<RelayRequestData>,
}

impl RelayRequest {
    pub fn currency_in(&self) -> Option<&CurrencyIn> {
        self.data
            .as_ref()
            .and_then(|data| data.metadata.as_ref())
            .and_then(|meta| meta.currency_in.as_ref())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RelayRequestsResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub requests: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "string_only")]
    pub continuation: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn string_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Ok(None),
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<RequestStatus, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => {
            Ok(serde_json::from_value(Value::String(s.to_ascii_lowercase())).unwrap_or_default())
        }
        _ => Ok(RequestStatus::Unknown),
    }
}

/// Where the next upstream page starts.
///
/// A continuation, once issued, wins over the start timestamp.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub continuation: Option<String>,
    pub start_timestamp: Option<i64>,
}

impl PageCursor {
    pub fn from_continuation(token: impl Into<String>) -> Self {
        Self {
            continuation: Some(token.into()),
            start_timestamp: None,
        }
    }

    /// Seeds a fresh pagination chain; a zero watermark means "from the beginning".
    pub fn from_watermark(watermark_ms: i64) -> Self {
        Self {
            continuation: None,
            start_timestamp: (watermark_ms > 0).then_some(watermark_ms),
        }
    }
}

/// One fetched page plus the values the orchestrator needs from it.
#[derive(Clone, Debug, Default)]
pub struct RequestsPage {
    pub requests: Vec<RelayRequest>,
    /// Token for the following page; `None` when pagination is exhausted.
    pub continuation: Option<String>,
    /// Largest parsable `createdAt` in the page, 0 when there is none.
    pub max_created_at_ms: i64,
}

impl RequestsPage {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
