//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`. `SqliteStore` wraps them
//! behind the `Store` trait for the service layer.

mod alert;
mod doctor;
mod dose;
mod medication;
mod message;
mod patient;

use chrono::{DateTime, SecondsFormat, Utc};

use super::DatabaseError;

pub use alert::*;
pub use doctor::*;
pub use dose::*;
pub use medication::*;
pub use message::*;
pub use patient::*;

/// Fixed-width RFC 3339 so stored timestamps order lexically.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw:?}: {e}")))
}

pub(crate) fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    raw.as_deref().map(parse_ts).transpose()
}

pub(crate) fn to_json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

pub(crate) fn from_json_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}
