//! Event log repository (read-only)

use super::{decode_all, NEWEST_FIRST};
use crate::backend::{ListOptions, RecordStore};
use crate::filter::Filter;
use crate::models::EventLog;
use resendforward_common::types::{Collection, LogType, RecordId};
use resendforward_common::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Optional predicates for the event log list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLogFilters {
    pub event_id: Option<RecordId>,
    pub rule_id: Option<RecordId>,
    pub log_type: Option<LogType>,
    /// Lower bound on `created`, in the backend's timestamp format
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: Option<String>,
}

impl EventLogFilters {
    /// Logs of a single forwarding event
    pub fn for_event(event_id: impl Into<RecordId>) -> Self {
        Self {
            event_id: Some(event_id.into()),
            ..Default::default()
        }
    }

    pub fn to_filter(&self) -> Filter {
        Filter::new()
            .eq("event", self.event_id.clone())
            .eq("rule", self.rule_id.clone())
            .eq("type", self.log_type.map(|t| t.as_str()))
            .gte("created", self.start_date.clone())
            .lte("created", self.end_date.clone())
    }

    pub fn to_options(&self) -> ListOptions {
        ListOptions::new()
            .filter(self.to_filter())
            .sort(self.sort.clone().unwrap_or_else(|| NEWEST_FIRST.to_string()))
            .expand("rule,event")
    }

    pub fn params(&self) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        if let Some(event_id) = self.event_id.as_ref().filter(|e| !e.is_empty()) {
            params.insert("eventId", event_id.clone());
        }
        if let Some(rule_id) = self.rule_id.as_ref().filter(|r| !r.is_empty()) {
            params.insert("ruleId", rule_id.clone());
        }
        if let Some(log_type) = self.log_type {
            params.insert("type", log_type.to_string());
        }
        if let Some(start) = &self.start_date {
            params.insert("startDate", start.clone());
        }
        if let Some(end) = &self.end_date {
            params.insert("endDate", end.clone());
        }
        if let Some(sort) = &self.sort {
            params.insert("sort", sort.clone());
        }
        params
    }
}

/// Event log repository
#[derive(Clone)]
pub struct LogRepository {
    store: Arc<dyn RecordStore>,
}

impl LogRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, filters: &EventLogFilters) -> Result<Vec<EventLog>> {
        let options = filters.to_options();
        decode_all(self.store.list(Collection::EventLogs, &options).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_clause_order() {
        let filters = EventLogFilters {
            event_id: Some("e1".to_string()),
            rule_id: Some("r1".to_string()),
            log_type: Some(LogType::EmailFailed),
            ..Default::default()
        };
        assert_eq!(
            filters.to_filter().to_expression().unwrap(),
            "event = \"e1\" && rule = \"r1\" && type = \"email.failed\""
        );
        assert_eq!(filters.to_options().expand.as_deref(), Some("rule,event"));
    }

    #[tokio::test]
    async fn test_list_for_event() {
        let store = Arc::new(MemoryStore::new("u1"));
        for (event, log_type, created) in [
            ("e1", "webhook.received", "2025-03-01 10:00:00.000Z"),
            ("e1", "forward.initiated", "2025-03-01 10:00:01.000Z"),
            ("e2", "webhook.received", "2025-03-01 10:00:02.000Z"),
        ] {
            store
                .insert(
                    Collection::EventLogs,
                    json!({
                        "user": "u1",
                        "event": event,
                        "rule": "r1",
                        "type": log_type,
                        "created": created,
                        "updated": created,
                    }),
                )
                .await;
        }

        let repo = LogRepository::new(store);
        let logs = repo.list(&EventLogFilters::for_event("e1")).await.unwrap();
        let types: Vec<LogType> = logs.iter().map(|l| l.log_type).collect();
        assert_eq!(types, vec![LogType::ForwardInitiated, LogType::WebhookReceived]);
    }
}
