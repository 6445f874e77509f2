//! Token expiry normalization
//!
//! Identity providers report expiry as timestamps, epoch numbers or ISO-8601
//! strings. The connection context only ever stores finite epoch
//! milliseconds, so every shape is funnelled through [`normalize_expiry`].

use chrono::{DateTime, Utc};

/// Expiry as reported by an identity provider or a token cache.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpiryValue {
    Timestamp(DateTime<Utc>),
    /// Epoch milliseconds; may be non-finite when it came from untrusted JSON.
    EpochMillis(f64),
    /// ISO-8601 / RFC 3339 text.
    Text(String),
}

impl ExpiryValue {
    /// Read an expiry from a JSON value (number or string). Other shapes are
    /// treated as absent.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(Self::EpochMillis),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<DateTime<Utc>> for ExpiryValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<i64> for ExpiryValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::EpochMillis(value as f64)
    }
}

impl From<&str> for ExpiryValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Normalize any expiry shape to epoch milliseconds.
///
/// Total: never panics. Missing values, zero, empty or unparsable strings and
/// non-finite numbers all map to `None`.
#[must_use]
pub fn normalize_expiry(value: Option<&ExpiryValue>) -> Option<i64> {
    match value? {
        ExpiryValue::Timestamp(ts) => Some(ts.timestamp_millis()),
        ExpiryValue::EpochMillis(ms) => finite_millis(*ms),
        ExpiryValue::Text(text) => parse_text(text),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn finite_millis(ms: f64) -> Option<i64> {
    if !ms.is_finite() || ms == 0.0 {
        return None;
    }
    let rounded = ms.round();
    if rounded > i64::MAX as f64 || rounded < i64::MIN as f64 {
        return None;
    }
    Some(rounded as i64)
}

fn parse_text(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc).timestamp_millis());
    }
    // Date-only and naive forms are read as UTC
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
    }
    None
}
