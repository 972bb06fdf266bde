//! Timestamps in the backend's sortable UTC format
//!
//! The backend stores datetimes as `YYYY-MM-DD HH:MM:SS.mmmZ` and compares them
//! as strings inside filter expressions, so every bound we send must use the
//! same layout.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

const BACKEND_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";
const BACKEND_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.fZ";

/// Format a timestamp the way the backend stores it
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format(BACKEND_FORMAT).to_string()
}

/// Parse a backend timestamp, also accepting RFC 3339
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, BACKEND_PARSE_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapter for backend timestamps
pub mod backend_format {
    use super::{format_timestamp, parse_timestamp, Timestamp};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}
