//! Read queries of the dashboard

use crate::cache::QueryKey;
use crate::query::Query;
use resendforward_common::types::CredentialKind;
use resendforward_storage::{
    Credential, EventLog, EventLogFilters, ForwardingCount, ForwardingEvent,
    ForwardingEventFilters, ForwardingRule, ForwardingStats, Repositories, RulesStats,
};

pub const FORWARDING_RULES: &str = "forwardingRules";
pub const FORWARDING_RULE: &str = "forwardingRule";
pub const FORWARDING_EVENTS: &str = "forwardingEvents";
pub const FORWARDING_EVENT: &str = "forwardingEvent";
pub const FORWARDING_EVENT_LOGS: &str = "forwardingEventLogs";
pub const RULE_FORWARDING_COUNT: &str = "ruleForwardingCount";
pub const FORWARDING_STATS: &str = "forwardingStats";
pub const RULES_STATS: &str = "rulesStats";

/// Any event still pending
#[allow(clippy::ptr_arg)]
pub fn has_pending_events(events: &Vec<ForwardingEvent>) -> bool {
    events.iter().any(|e| !e.status.is_terminal())
}

/// Any log of a step still in flight
#[allow(clippy::ptr_arg)]
pub fn has_in_flight_logs(logs: &Vec<EventLog>) -> bool {
    logs.iter().any(|l| l.log_type.is_in_flight())
}

/// Builds the query for each read operation
#[derive(Clone)]
pub struct Queries {
    repos: Repositories,
}

impl Queries {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub fn forwarding_rules(&self) -> Query<Vec<ForwardingRule>> {
        let rules = self.repos.rules.clone();
        Query::new(QueryKey::new(FORWARDING_RULES), move || {
            let rules = rules.clone();
            async move { rules.list().await }
        })
    }

    pub fn forwarding_rule(&self, id: &str) -> Query<ForwardingRule> {
        let rules = self.repos.rules.clone();
        let id = id.to_string();
        let key = QueryKey::new(FORWARDING_RULE).param("id", id.clone());
        let enabled = !id.is_empty();
        Query::new(key, move || {
            let rules = rules.clone();
            let id = id.clone();
            async move { rules.get(&id).await }
        })
        .enabled(enabled)
    }

    /// Event list; polls while any returned event is pending
    pub fn forwarding_events(&self, filters: ForwardingEventFilters) -> Query<Vec<ForwardingEvent>> {
        let events = self.repos.events.clone();
        let key = QueryKey::with_params(FORWARDING_EVENTS, filters.params());
        Query::new(key, move || {
            let events = events.clone();
            let filters = filters.clone();
            async move { events.list(&filters).await }
        })
        .poll_while(has_pending_events)
    }

    pub fn forwarding_event(&self, id: &str) -> Query<ForwardingEvent> {
        let events = self.repos.events.clone();
        let id = id.to_string();
        let key = QueryKey::new(FORWARDING_EVENT).param("id", id.clone());
        let enabled = !id.is_empty();
        Query::new(key, move || {
            let events = events.clone();
            let id = id.clone();
            async move { events.get(&id).await }
        })
        .enabled(enabled)
    }

    /// Log list; polls while any returned log is still in flight
    pub fn event_logs(&self, filters: EventLogFilters) -> Query<Vec<EventLog>> {
        let logs = self.repos.logs.clone();
        let key = QueryKey::with_params(FORWARDING_EVENT_LOGS, filters.params());
        Query::new(key, move || {
            let logs = logs.clone();
            let filters = filters.clone();
            async move { logs.list(&filters).await }
        })
        .poll_while(has_in_flight_logs)
    }

    /// Newest credential of a kind, `None` when absent
    pub fn credential(&self, kind: CredentialKind) -> Query<Option<Credential>> {
        let credentials = self.repos.credentials.clone();
        Query::new(QueryKey::new(kind.query_root()), move || {
            let credentials = credentials.clone();
            async move { credentials.latest(kind).await }
        })
    }

    pub fn rule_forwarding_count(&self, rule_id: &str) -> Query<Option<ForwardingCount>> {
        let stats = self.repos.stats.clone();
        let rule_id = rule_id.to_string();
        let key = QueryKey::new(RULE_FORWARDING_COUNT).param("ruleId", rule_id.clone());
        let enabled = !rule_id.is_empty();
        Query::new(key, move || {
            let stats = stats.clone();
            let rule_id = rule_id.clone();
            async move { stats.rule_forwarding_count(&rule_id).await }
        })
        .enabled(enabled)
    }

    pub fn forwarding_stats(&self) -> Query<Option<ForwardingStats>> {
        let stats = self.repos.stats.clone();
        Query::new(QueryKey::new(FORWARDING_STATS), move || {
            let stats = stats.clone();
            async move { stats.forwarding_stats().await }
        })
    }

    pub fn rules_stats(&self) -> Query<Option<RulesStats>> {
        let stats = self.repos.stats.clone();
        Query::new(QueryKey::new(RULES_STATS), move || {
            let stats = stats.clone();
            async move { stats.rules_stats().await }
        })
    }
}
