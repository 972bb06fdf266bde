//! Symbolic time ranges resolved to query bounds

use chrono::{DateTime, Duration, Utc};
use resendforward_common::time::format_timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time-range filter token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "24h")]
    Last24h,
    #[serde(rename = "7d")]
    Last7d,
    #[serde(rename = "30d")]
    Last30d,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [
        TimeRange::All,
        TimeRange::Last24h,
        TimeRange::Last7d,
        TimeRange::Last30d,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::All => "all",
            TimeRange::Last24h => "24h",
            TimeRange::Last7d => "7d",
            TimeRange::Last30d => "30d",
        }
    }

    /// Unknown or malformed tokens fall back to `All`
    pub fn parse_lenient(token: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == token)
            .unwrap_or_default()
    }

    pub fn days(&self) -> Option<i64> {
        match self {
            TimeRange::All => None,
            TimeRange::Last24h => Some(1),
            TimeRange::Last7d => Some(7),
            TimeRange::Last30d => Some(30),
        }
    }

    pub fn lower_bound(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days().map(|days| now - Duration::days(days))
    }

    /// Resolve against `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> DateRange {
        DateRange {
            start: self.lower_bound(now),
        }
    }

    /// Resolve against the current wall clock
    pub fn resolve_now(&self) -> DateRange {
        self.resolve(Utc::now())
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved range; empty for `All`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Lower bound in the backend's sortable format
    pub fn start_date(&self) -> Option<String> {
        self.start.as_ref().map(format_timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none()
    }
}
