//! Forwarding event repository (read-only)

use super::{decode, decode_all, NEWEST_FIRST};
use crate::backend::{ListOptions, RecordStore};
use crate::filter::Filter;
use crate::models::ForwardingEvent;
use resendforward_common::types::{Collection, EventStatus, RecordId};
use resendforward_common::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Optional predicates for the forwarding event list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingEventFilters {
    pub status: Option<EventStatus>,
    pub rule_id: Option<RecordId>,
    /// Lower bound on `created`, in the backend's timestamp format
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: Option<String>,
}

impl ForwardingEventFilters {
    pub fn to_filter(&self) -> Filter {
        Filter::new()
            .eq("status", self.status.map(|s| s.as_str()))
            .eq("rule", self.rule_id.clone())
            .gte("created", self.start_date.clone())
            .lte("created", self.end_date.clone())
    }

    pub fn to_options(&self) -> ListOptions {
        ListOptions::new()
            .filter(self.to_filter())
            .sort(self.sort.clone().unwrap_or_else(|| NEWEST_FIRST.to_string()))
            .expand("rule")
    }

    /// Resolved parameters, used as the query cache key
    pub fn params(&self) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        if let Some(status) = self.status {
            params.insert("status", status.to_string());
        }
        if let Some(rule_id) = self.rule_id.as_ref().filter(|r| !r.is_empty()) {
            params.insert("ruleId", rule_id.clone());
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

/// Forwarding event repository
#[derive(Clone)]
pub struct EventRepository {
    store: Arc<dyn RecordStore>,
}

impl EventRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, filters: &ForwardingEventFilters) -> Result<Vec<ForwardingEvent>> {
        let options = filters.to_options();
        decode_all(self.store.list(Collection::ForwardingEvents, &options).await?)
    }

    pub async fn get(&self, id: &str) -> Result<ForwardingEvent> {
        decode(self.store.get_one(Collection::ForwardingEvents, id).await?)
    }
}
