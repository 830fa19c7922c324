//! Query-string and body parsing with per-field error codes.

use axum::body::Bytes;
use chrono::NaiveDate;
use refdata_data::{HistoryQuery, PageLimit, PriceVendor};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::error::ApiError;

/// Parses an optional `YYYY-MM-DD` value, answering `code` on failure.
pub fn date(raw: Option<&str>, code: &'static str, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) if v.len() == 10 => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::bad_request(code, format!("{field} must be YYYY-MM-DD"))),
        Some(_) => Err(ApiError::bad_request(code, format!("{field} must be YYYY-MM-DD"))),
    }
}

/// Splits a comma-separated filter; absent or blank means "no filter".
pub fn list(raw: Option<&str>) -> Vec<String> {
    raw.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

pub fn include_meta(raw: Option<&str>) -> bool {
    raw == Some("true")
}

pub fn vendor(raw: Option<&str>) -> Result<PriceVendor, ApiError> {
    raw.and_then(PriceVendor::parse).ok_or_else(|| {
        ApiError::bad_request("invalid_vendor", "vendor must be one of spdj, polygon, iex")
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<String>,
    pub cursor: Option<String>,
    pub include_constituent_meta: Option<String>,
}

impl HistoryParams {
    pub fn to_query(&self) -> Result<HistoryQuery, ApiError> {
        let start_date = date(self.start_date.as_deref(), "invalid_start_date", "startDate")?;
        let end_date = date(self.end_date.as_deref(), "invalid_end_date", "endDate")?;

        let limit = match self.limit.as_deref() {
            None => PageLimit::default(),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|n| PageLimit::new(n).ok())
                .ok_or_else(|| {
                    ApiError::bad_request("invalid_limit", "limit must be between 1 and 100")
                })?,
        };

        let cursor = match self.cursor.as_deref().filter(|c| !c.is_empty()) {
            None => None,
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
                ApiError::bad_request("invalid_cursor", "cursor must be a snapshot id")
            })?),
        };

        Ok(HistoryQuery {
            start_date,
            end_date,
            cursor,
            limit,
        })
    }
}

/// Decodes a JSON body. Unparseable JSON is `invalid_json`; JSON that does
/// not fit `T` is `invalid_request` with the decoder's complaint as detail.
/// An empty body is read as `{}`.
pub fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let value: JsonValue = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        serde_json::from_slice(body).map_err(|_| {
            ApiError::bad_request("invalid_json", "Request body must be valid JSON")
        })?
    };
    let value = if value.is_null() { json!({}) } else { value };

    serde_json::from_value(value).map_err(|e| ApiError::BadRequest {
        code: "invalid_request",
        message: "Invalid request payload".to_string(),
        details: Some(json!({ "issues": [e.to_string()] })),
    })
}
