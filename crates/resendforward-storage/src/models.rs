//! Record models decoded from backend collections

use chrono::{DateTime, Utc};
use resendforward_common::time::backend_format;
use resendforward_common::types::{empty_string_as_none, EventStatus, LogType, RecordId};
use serde::{Deserialize, Serialize};

/// Anything with a backend record id
pub trait Identified {
    fn id(&self) -> &str;
}

/// Forwarding rule: catch mail at `rule_email`, forward it to `forward_to_email`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardingRule {
    pub id: RecordId,
    pub user: RecordId,
    #[serde(default)]
    pub rule_name: String,
    pub rule_email: String,
    pub forward_to_email: String,
    pub send_from_email: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(with = "backend_format")]
    pub created: DateTime<Utc>,
    #[serde(with = "backend_format")]
    pub updated: DateTime<Utc>,
}

/// Fields for a new forwarding rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    pub rule_email: String,
    pub to_email: String,
    pub from_email: String,
}

impl NewRule {
    /// All four fields are required
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.rule_email, &self.to_email, &self.from_email]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

/// Partial update of a forwarding rule; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_to_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_from_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl RuleUpdate {
    /// Full-field edit, as submitted from the edit form
    pub fn fields(rule: NewRule) -> Self {
        Self {
            rule_name: Some(rule.name),
            rule_email: Some(rule.rule_email),
            forward_to_email: Some(rule.to_email),
            send_from_email: Some(rule.from_email),
            enabled: None,
        }
    }

    /// Enable or disable a rule
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Text fields that are present must not be blank
    pub fn has_blank_field(&self) -> bool {
        [
            &self.rule_name,
            &self.rule_email,
            &self.forward_to_email,
            &self.send_from_email,
        ]
        .iter()
        .any(|field| field.as_deref().is_some_and(|v| v.trim().is_empty()))
    }
}

/// Related records expanded into a forwarding event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventExpand {
    pub rule: Option<ForwardingRule>,
}

/// One inbound email processed (or being processed) for forwarding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardingEvent {
    pub id: RecordId,
    pub user: RecordId,
    pub rule: RecordId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    pub status: EventStatus,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub received_email_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub sent_email_id: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(with = "backend_format")]
    pub created: DateTime<Utc>,
    #[serde(with = "backend_format")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub expand: Option<EventExpand>,
}

impl ForwardingEvent {
    /// Rule name from the expanded relation, if loaded
    pub fn rule_name(&self) -> Option<&str> {
        self.expand
            .as_ref()
            .and_then(|e| e.rule.as_ref())
            .map(|r| r.rule_name.as_str())
    }
}

/// Related records expanded into an event log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogExpand {
    pub rule: Option<ForwardingRule>,
    pub event: Option<ForwardingEvent>,
}

/// Immutable record of one processing step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub id: RecordId,
    pub user: RecordId,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub event: Option<RecordId>,
    pub rule: RecordId,
    #[serde(rename = "type")]
    pub log_type: LogType,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(with = "backend_format")]
    pub created: DateTime<Utc>,
    #[serde(with = "backend_format")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub expand: Option<LogExpand>,
}

/// API key or webhook secret record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: RecordId,
    pub user: RecordId,
    #[serde(alias = "key", alias = "secret")]
    pub value: String,
    #[serde(with = "backend_format")]
    pub created: DateTime<Utc>,
}

/// Global forwarding totals for the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingStats {
    pub id: RecordId,
    #[serde(default)]
    pub user: RecordId,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub delivered: u64,
    #[serde(default)]
    pub failed: u64,
}

/// Rule totals for the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesStats {
    pub id: RecordId,
    #[serde(default)]
    pub user: RecordId,
    #[serde(default)]
    pub total_rules: u64,
    #[serde(default)]
    pub active_rules: u64,
}

/// Number of events forwarded by one rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingCount {
    pub id: RecordId,
    #[serde(default)]
    pub user: RecordId,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub rule: Option<RecordId>,
    #[serde(default)]
    pub total: u64,
}

impl Identified for ForwardingRule {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for ForwardingEvent {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for EventLog {
    fn id(&self) -> &str {
        &self.id
    }
}
