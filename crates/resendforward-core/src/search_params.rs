//! URL search parameters <-> typed filter state

use crate::date_range::TimeRange;
use resendforward_common::types::{EventStatus, LogType, RecordId};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

pub const RULE_ID: &str = "ruleId";
pub const EVENT_ID: &str = "eventId";
pub const STATUS: &str = "status";
pub const TYPE: &str = "type";
pub const TIME_RANGE: &str = "timeRange";

/// Select-box value meaning "no filter"
pub const ALL: &str = "all";

/// Filter state shared by the forwarding, logs and rules views
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub rule_id: Option<RecordId>,
    pub event_id: Option<RecordId>,
    pub status: Option<EventStatus>,
    pub log_type: Option<LogType>,
    pub time_range: TimeRange,
}

impl FilterState {
    /// Decode a query string (with or without the leading `?`).
    ///
    /// Never fails: unknown parameters are ignored and malformed values fall
    /// back to their defaults.
    pub fn decode(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut state = Self::default();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            match name.as_ref() {
                RULE_ID => state.rule_id = selected(&value).map(str::to_string),
                EVENT_ID => state.event_id = present(&value).map(str::to_string),
                STATUS => state.status = selected(&value).and_then(|v| v.parse().ok()),
                TYPE => state.log_type = selected(&value).and_then(|v| v.parse().ok()),
                TIME_RANGE => state.time_range = TimeRange::parse_lenient(&value),
                _ => {}
            }
        }
        state
    }

    /// Encode as a query string, omitting defaults
    pub fn encode(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if let Some(rule_id) = &self.rule_id {
            out.append_pair(RULE_ID, rule_id);
        }
        if let Some(event_id) = &self.event_id {
            out.append_pair(EVENT_ID, event_id);
        }
        if let Some(status) = self.status {
            out.append_pair(STATUS, status.as_str());
        }
        if let Some(log_type) = self.log_type {
            out.append_pair(TYPE, log_type.as_str());
        }
        if self.time_range != TimeRange::All {
            out.append_pair(TIME_RANGE, self.time_range.as_str());
        }
        out.finish()
    }

    /// Apply a user-driven change; returns the URL patch to merge
    pub fn apply(&mut self, change: FilterChange) -> SearchPatch {
        match change {
            FilterChange::Rule(rule_id) => {
                self.rule_id = rule_id.filter(|r| !r.is_empty() && r != ALL);
                SearchPatch::single(RULE_ID, self.rule_id.clone())
            }
            FilterChange::Event(event_id) => {
                self.event_id = event_id
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty());
                SearchPatch::single(EVENT_ID, self.event_id.clone())
            }
            FilterChange::Status(status) => {
                self.status = status;
                SearchPatch::single(STATUS, status.map(|s| s.as_str().to_string()))
            }
            FilterChange::LogType(log_type) => {
                self.log_type = log_type;
                SearchPatch::single(TYPE, log_type.map(|t| t.as_str().to_string()))
            }
            FilterChange::TimeRange(range) => {
                self.time_range = range;
                SearchPatch::single(TIME_RANGE, Some(range.as_str().to_string()))
            }
        }
    }
}

fn present(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

fn selected(value: &str) -> Option<&str> {
    present(value).filter(|v| *v != ALL)
}

/// One user-driven filter change; `None` clears the filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    Rule(Option<RecordId>),
    Event(Option<RecordId>),
    Status(Option<EventStatus>),
    LogType(Option<LogType>),
    TimeRange(TimeRange),
}

impl FilterChange {
    /// Change for a select box, where `"all"` clears the filter
    pub fn status(value: &str) -> Self {
        FilterChange::Status(selected(value).and_then(|v| v.parse().ok()))
    }

    pub fn log_type(value: &str) -> Self {
        FilterChange::LogType(selected(value).and_then(|v| v.parse().ok()))
    }

    pub fn rule(value: &str) -> Self {
        FilterChange::Rule(selected(value).map(str::to_string))
    }

    pub fn time_range(value: &str) -> Self {
        FilterChange::TimeRange(TimeRange::parse_lenient(value))
    }
}

/// Merge patch for the URL search parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPatch {
    pub set: Vec<(&'static str, String)>,
    pub remove: Vec<&'static str>,
}

impl SearchPatch {
    fn single(name: &'static str, value: Option<String>) -> Self {
        match value {
            Some(value) => Self {
                set: vec![(name, value)],
                remove: Vec::new(),
            },
            None => Self {
                set: Vec::new(),
                remove: vec![name],
            },
        }
    }

    /// Merge into an existing query string, keeping every other parameter
    pub fn apply_to(&self, query: &str) -> String {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .filter(|(name, _)| !self.remove.contains(&name.as_str()))
            .collect();

        for (name, value) in &self.set {
            match pairs.iter_mut().find(|(n, _)| n == name) {
                Some(pair) => pair.1 = value.clone(),
                None => pairs.push((name.to_string(), value.clone())),
            }
        }

        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
    }
}
