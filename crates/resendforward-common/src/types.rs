//! Common types for ResendForward

use serde::{Deserialize, Deserializer, Serialize};

/// Backend record identifier (15 lowercase alphanumerics)
pub type RecordId = String;

/// Backend collections the dashboard reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    EventLogs,
    ForwardingCounts,
    ForwardingEvents,
    ForwardingRules,
    ForwardingStats,
    ResendApiKeys,
    ResendWebhookSecrets,
    RulesStats,
    Users,
}

impl Collection {
    /// Collection name as used in backend URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::EventLogs => "event_logs",
            Collection::ForwardingCounts => "forwarding_counts",
            Collection::ForwardingEvents => "forwarding_events",
            Collection::ForwardingRules => "forwarding_rules",
            Collection::ForwardingStats => "forwarding_stats",
            Collection::ResendApiKeys => "resend_api_keys",
            Collection::ResendWebhookSecrets => "resend_webhook_secrets",
            Collection::RulesStats => "rules_stats",
            Collection::Users => "users",
        }
    }

    /// Read-only aggregate projections computed by the backend
    pub fn is_view(&self) -> bool {
        matches!(
            self,
            Collection::ForwardingCounts | Collection::ForwardingStats | Collection::RulesStats
        )
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forwarding event status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

impl EventStatus {
    pub const ALL: [EventStatus; 4] = [
        EventStatus::Pending,
        EventStatus::Sent,
        EventStatus::Delivered,
        EventStatus::Failed,
    ];

    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Sent => "sent",
            EventStatus::Delivered => "delivered",
            EventStatus::Failed => "failed",
        }
    }

    /// Only `pending` can still change
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Pending)
    }

    /// Human-readable badge label
    pub fn label(&self) -> &'static str {
        match self {
            EventStatus::Pending => "Pending",
            EventStatus::Sent => "Sent",
            EventStatus::Delivered => "Delivered",
            EventStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| crate::Error::Validation(format!("Unknown event status: {}", s)))
    }
}

/// Event log entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogType {
    #[serde(rename = "webhook.received")]
    WebhookReceived,
    #[serde(rename = "forward.initiated")]
    ForwardInitiated,
    #[serde(rename = "email.sent")]
    EmailSent,
    #[serde(rename = "email.delivered")]
    EmailDelivered,
    #[serde(rename = "email.failed")]
    EmailFailed,
    #[serde(rename = "error")]
    Error,
}

impl LogType {
    pub const ALL: [LogType; 6] = [
        LogType::WebhookReceived,
        LogType::ForwardInitiated,
        LogType::EmailSent,
        LogType::EmailDelivered,
        LogType::EmailFailed,
        LogType::Error,
    ];

    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::WebhookReceived => "webhook.received",
            LogType::ForwardInitiated => "forward.initiated",
            LogType::EmailSent => "email.sent",
            LogType::EmailDelivered => "email.delivered",
            LogType::EmailFailed => "email.failed",
            LogType::Error => "error",
        }
    }

    /// Steps after which the pipeline is still expected to write more logs
    pub fn is_in_flight(&self) -> bool {
        matches!(self, LogType::WebhookReceived | LogType::ForwardInitiated)
    }

    /// Human-readable badge label
    pub fn label(&self) -> &'static str {
        match self {
            LogType::WebhookReceived => "Webhook Received",
            LogType::ForwardInitiated => "Forward Initiated",
            LogType::EmailSent => "Email Sent",
            LogType::EmailDelivered => "Email Delivered",
            LogType::EmailFailed => "Email Failed",
            LogType::Error => "Error",
        }
    }
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::Error::Validation(format!("Unknown log type: {}", s)))
    }
}

/// Credential kinds; at most one live record of each per user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    ApiKey,
    WebhookSecret,
}

impl CredentialKind {
    /// Backing collection
    pub fn collection(&self) -> Collection {
        match self {
            CredentialKind::ApiKey => Collection::ResendApiKeys,
            CredentialKind::WebhookSecret => Collection::ResendWebhookSecrets,
        }
    }

    /// Name of the field holding the secret value
    pub fn value_field(&self) -> &'static str {
        match self {
            CredentialKind::ApiKey => "key",
            CredentialKind::WebhookSecret => "secret",
        }
    }

    /// Query cache root for this credential
    pub fn query_root(&self) -> &'static str {
        match self {
            CredentialKind::ApiKey => "resendApiKey",
            CredentialKind::WebhookSecret => "resendWebhookSecret",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CredentialKind::ApiKey => "API key",
            CredentialKind::WebhookSecret => "Webhook secret",
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Deserialize a relation or optional text field, mapping `""` and `null` to `None`
pub fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
