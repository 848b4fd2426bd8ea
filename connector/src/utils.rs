use std::str::FromStr;

use chrono::DateTime;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::warn;

use crate::types::{RelayRequest, RelayRequestsResponse, RequestsPage};

/// Parses a string- or number-encoded decimal without going through `f64`.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal_str(s),
        Value::Number(num) => parse_decimal_str(&num.to_string()),
        _ => None,
    }
}

fn parse_decimal_str(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// USD volume of a request: `amountUsd`, then `amountUsdCurrent`, then zero.
///
/// Negative amounts are skipped like unparsable ones; ledger totals only grow.
pub fn volume_usd(request: &RelayRequest) -> Decimal {
    let Some(currency_in) = request.currency_in() else {
        return Decimal::ZERO;
    };
    [&currency_in.amount_usd, &currency_in.amount_usd_current]
        .into_iter()
        .filter_map(|candidate| candidate.as_ref().and_then(parse_decimal))
        .find(|amount| !amount.is_sign_negative())
        .unwrap_or(Decimal::ZERO)
}

/// Milliseconds since epoch for an RFC 3339 or integer-millisecond `createdAt`.
pub fn parse_created_at_ms(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.timestamp_millis());
    }
    trimmed.parse::<i64>().ok().filter(|ms| *ms > 0)
}

pub fn max_created_at_ms(requests: &[RelayRequest]) -> i64 {
    requests
        .iter()
        .filter_map(|req| req.created_at.as_deref().and_then(parse_created_at_ms))
        .fold(0, i64::max)
}

/// Decodes records one by one. A record that is not even an object is kept as
/// an unknown-status placeholder so the page size stays truthful.
pub(crate) fn into_page(resp: RelayRequestsResponse) -> RequestsPage {
    let continuation = resp.continuation.filter(|token| !token.trim().is_empty());
    let requests: Vec<RelayRequest> = resp
        .requests
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            serde_json::from_value(raw).unwrap_or_else(|err| {
                warn!(index, %err, "skipping undecodable relay request");
                RelayRequest::default()
            })
        })
        .collect();
    let max_created_at_ms = max_created_at_ms(&requests);
    RequestsPage {
        requests,
        continuation,
        max_created_at_ms,
    }
}
