//! Raw reading parsing
//!
//! Water records carry `sd` / `vol`, heating records `SD` / `En`. Timestamps
//! arrive either as ISO-8601 strings or as epoch seconds. Every record is
//! parsed on its own; a bad one is reported and skipped by the caller, never
//! allowed to take the rest of the history down with it.

use crate::error::{Result, WattsonError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Keys that may hold the reading timestamp, in lookup order
pub const TIMESTAMP_KEYS: [&str; 2] = ["sd", "SD"];

/// Keys that may hold the reading value, in lookup order
pub const VALUE_KEYS: [&str; 2] = ["vol", "En"];

/// One upstream record as received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawReading(pub Value);

/// A reading that passed normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Why a record was skipped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReadingError {
    #[error("record is not an object")]
    NotAnObject,

    #[error("record has no timestamp")]
    MissingTimestamp,

    #[error("record has no value")]
    MissingValue,

    #[error("unparseable timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unparseable value: {0}")]
    InvalidValue(String),

    #[error("negative value {0}")]
    Negative(f64),
}

impl RawReading {
    fn field(&self, keys: &[&str]) -> Option<&Value> {
        let object = self.0.as_object()?;
        keys.iter()
            .filter_map(|k| object.get(*k))
            .find(|v| !v.is_null() && v.as_str().is_none_or(|s| !s.trim().is_empty()))
    }

    /// Parse timestamp and value; negative values are rejected
    pub fn normalize(&self) -> std::result::Result<Reading, ReadingError> {
        if !self.0.is_object() {
            return Err(ReadingError::NotAnObject);
        }
        let ts = self
            .field(&TIMESTAMP_KEYS)
            .ok_or(ReadingError::MissingTimestamp)?;
        let value = self.field(&VALUE_KEYS).ok_or(ReadingError::MissingValue)?;

        let timestamp = parse_timestamp(ts)?;
        let value = parse_value(value)?;
        if value < 0.0 {
            return Err(ReadingError::Negative(value));
        }
        Ok(Reading { timestamp, value })
    }
}

/// Normalize every record, dropping the ones that fail
pub fn normalize_all(records: &[RawReading]) -> Vec<Reading> {
    records.iter().filter_map(|r| r.normalize().ok()).collect()
}

/// ISO-8601 string or numeric epoch seconds, interpreted as UTC
pub fn parse_timestamp(value: &Value) -> std::result::Result<DateTime<Utc>, ReadingError> {
    match value {
        Value::String(s) => parse_timestamp_str(s)
            .ok_or_else(|| ReadingError::InvalidTimestamp(s.clone())),
        Value::Number(n) => n
            .as_f64()
            .and_then(from_epoch_seconds)
            .ok_or_else(|| ReadingError::InvalidTimestamp(n.to_string())),
        other => Err(ReadingError::InvalidTimestamp(other.to_string())),
    }
}

fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let mut s = raw.trim().to_string();
    // "2024-01-01 10:00:00" is as common upstream as the `T` form
    if s.len() > 10 && s.as_bytes()[10] == b' ' {
        s.replace_range(10..11, "T");
    }
    if let Some(stripped) = s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        s = format!("{stripped}+00:00");
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = s.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M") {
        return Some(naive.and_utc());
    }
    s.parse::<NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_value(value: &Value) -> std::result::Result<f64, ReadingError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| ReadingError::InvalidValue(value.to_string()))
}

/// Body of a data endpoint: a bare list or an object with a `data` list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReadingsPayload {
    List(Vec<RawReading>),
    Envelope {
        #[serde(default)]
        data: Vec<RawReading>,
    },
}

impl ReadingsPayload {
    /// Decode a response body; any other shape is a `FetchFailed`
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| WattsonError::fetch(format!("unexpected response shape: {e}")))
    }

    pub fn into_records(self) -> Vec<RawReading> {
        match self {
            ReadingsPayload::List(records) => records,
            ReadingsPayload::Envelope { data } => data,
        }
    }
}
