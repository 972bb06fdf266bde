//! Page bindings: filters, watched queries and selection per dashboard page

use crate::mutations::Mutations;
use crate::queries::Queries;
use crate::query::{Query, QueryClient, QueryState, QueryWatch};
use crate::search_params::{FilterChange, FilterState, SearchPatch};
use crate::selection::Selection;
use resendforward_common::types::RecordId;
use resendforward_common::Result;
use resendforward_storage::{
    EventLog, EventLogFilters, ForwardingEvent, ForwardingEventFilters, ForwardingRule,
    ForwardingStats, RulesStats,
};

/// Events shown for a selected rule
pub const RECENT_EVENTS: usize = 5;

/// Events matching `filters`, with the time range resolved against the clock
fn event_filters(filters: &FilterState) -> ForwardingEventFilters {
    let range = filters.time_range.resolve_now();
    ForwardingEventFilters {
        status: filters.status,
        rule_id: filters.rule_id.clone(),
        start_date: range.start_date(),
        ..Default::default()
    }
}

fn log_filters(filters: &FilterState) -> EventLogFilters {
    let range = filters.time_range.resolve_now();
    EventLogFilters {
        event_id: filters.event_id.clone(),
        rule_id: filters.rule_id.clone(),
        log_type: filters.log_type,
        start_date: range.start_date(),
        ..Default::default()
    }
}

/// Logs of one event; inert without an event
fn detail_logs(queries: &Queries, event_id: Option<&str>) -> Query<Vec<EventLog>> {
    let filters = event_id
        .map(|id| EventLogFilters::for_event(id))
        .unwrap_or_default();
    queries.event_logs(filters).enabled(event_id.is_some())
}

fn rule_events(queries: &Queries, rule_id: Option<&str>) -> Query<Vec<ForwardingEvent>> {
    let filters = ForwardingEventFilters {
        rule_id: rule_id.map(str::to_string),
        ..Default::default()
    };
    queries.forwarding_events(filters).enabled(rule_id.is_some())
}

/// Forwarding events page
pub struct ForwardingView {
    queries: Queries,
    filters: FilterState,
    selection: Selection<ForwardingEvent>,
    events: QueryWatch<Vec<ForwardingEvent>>,
    stats: QueryWatch<Option<ForwardingStats>>,
    logs: QueryWatch<Vec<EventLog>>,
    logs_for: Option<RecordId>,
}

impl ForwardingView {
    pub fn open(client: &QueryClient, queries: &Queries, search: &str) -> Self {
        let filters = FilterState::decode(search);
        let events = client.watch(queries.forwarding_events(event_filters(&filters)));
        Self {
            queries: queries.clone(),
            selection: Selection::seeded(filters.event_id.clone()),
            filters,
            events,
            stats: client.watch(queries.forwarding_stats()),
            logs: client.watch(detail_logs(queries, None)),
            logs_for: None,
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn events(&self) -> QueryState<Vec<ForwardingEvent>> {
        self.events.state()
    }

    /// Totals across every event of the user
    pub fn stats(&self) -> QueryState<Option<ForwardingStats>> {
        self.stats.state()
    }

    pub fn selected(&self) -> Option<&ForwardingEvent> {
        self.selection.selected()
    }

    /// Logs of the selected event
    pub fn logs(&self) -> QueryState<Vec<EventLog>> {
        self.logs.state()
    }

    /// Apply a filter change and return the URL patch for it
    pub fn change_filter(&mut self, change: FilterChange) -> SearchPatch {
        let reseed = matches!(change, FilterChange::Event(_));
        let patch = self.filters.apply(change);
        if reseed {
            self.selection = Selection::seeded(self.filters.event_id.clone());
            self.sync_logs();
        }
        self.events
            .set_query(self.queries.forwarding_events(event_filters(&self.filters)));
        patch
    }

    pub fn select(&mut self, event: ForwardingEvent) {
        self.selection.select(event);
        self.sync_logs();
    }

    pub fn close(&mut self) {
        self.selection.close();
        self.sync_logs();
    }

    /// Wait for the next event list and re-resolve the selection against it
    pub async fn refresh(&mut self) -> Option<QueryState<Vec<ForwardingEvent>>> {
        let state = self.events.next_settled().await?;
        if let (Some(events), false) = (&state.data, state.is_placeholder) {
            self.selection.refresh(events);
        }
        self.sync_logs();
        Some(state)
    }

    pub async fn refresh_logs(&mut self) -> Option<QueryState<Vec<EventLog>>> {
        self.logs.next_settled().await
    }

    pub async fn refresh_stats(&mut self) -> Option<QueryState<Option<ForwardingStats>>> {
        self.stats.next_settled().await
    }

    fn sync_logs(&mut self) {
        let selected = self.selection.selected_id().map(str::to_string);
        if selected != self.logs_for {
            self.logs
                .set_query(detail_logs(&self.queries, selected.as_deref()));
            self.logs_for = selected;
        }
    }
}

/// Event logs page
pub struct LogsView {
    queries: Queries,
    filters: FilterState,
    logs: QueryWatch<Vec<EventLog>>,
}

impl LogsView {
    pub fn open(client: &QueryClient, queries: &Queries, search: &str) -> Self {
        let filters = FilterState::decode(search);
        let logs = client.watch(queries.event_logs(log_filters(&filters)));
        Self {
            queries: queries.clone(),
            filters,
            logs,
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn logs(&self) -> QueryState<Vec<EventLog>> {
        self.logs.state()
    }

    pub fn change_filter(&mut self, change: FilterChange) -> SearchPatch {
        let patch = self.filters.apply(change);
        self.logs
            .set_query(self.queries.event_logs(log_filters(&self.filters)));
        patch
    }

    pub async fn refresh(&mut self) -> Option<QueryState<Vec<EventLog>>> {
        self.logs.next_settled().await
    }
}

/// Forwarding rules page
pub struct RulesView {
    client: QueryClient,
    queries: Queries,
    mutations: Mutations,
    selection: Selection<ForwardingRule>,
    rules: QueryWatch<Vec<ForwardingRule>>,
    stats: QueryWatch<Option<RulesStats>>,
    recent: QueryWatch<Vec<ForwardingEvent>>,
    recent_for: Option<RecordId>,
}

impl RulesView {
    pub fn open(client: &QueryClient, queries: &Queries, mutations: &Mutations, search: &str) -> Self {
        let filters = FilterState::decode(search);
        Self {
            client: client.clone(),
            queries: queries.clone(),
            mutations: mutations.clone(),
            selection: Selection::seeded(filters.rule_id),
            rules: client.watch(queries.forwarding_rules()),
            stats: client.watch(queries.rules_stats()),
            recent: client.watch(rule_events(queries, None)),
            recent_for: None,
        }
    }

    pub fn rules(&self) -> QueryState<Vec<ForwardingRule>> {
        self.rules.state()
    }

    pub fn stats(&self) -> QueryState<Option<RulesStats>> {
        self.stats.state()
    }

    pub fn selected(&self) -> Option<&ForwardingRule> {
        self.selection.selected()
    }

    pub fn select(&mut self, rule: ForwardingRule) {
        self.selection.select(rule);
        self.sync_recent();
    }

    pub fn close(&mut self) {
        self.selection.close();
        self.sync_recent();
    }

    /// Wait for the next rule list and re-resolve the selection against it
    pub async fn refresh(&mut self) -> Option<QueryState<Vec<ForwardingRule>>> {
        let state = self.rules.next_settled().await?;
        if let (Some(rules), false) = (&state.data, state.is_placeholder) {
            self.selection.refresh(rules);
        }
        self.sync_recent();
        Some(state)
    }

    pub async fn refresh_stats(&mut self) -> Option<QueryState<Option<RulesStats>>> {
        self.stats.next_settled().await
    }

    pub async fn refresh_recent(&mut self) -> Option<QueryState<Vec<ForwardingEvent>>> {
        self.recent.next_settled().await
    }

    /// Newest events of the selected rule
    pub fn recent_events(&self) -> Vec<ForwardingEvent> {
        let (Some(rule_id), Some(events)) = (self.selection.selected_id(), self.recent.state().data)
        else {
            return Vec::new();
        };
        events
            .iter()
            .filter(|e| e.rule == rule_id)
            .take(RECENT_EVENTS)
            .cloned()
            .collect()
    }

    /// Number of events forwarded by a rule, zero when none were recorded
    pub async fn forwarding_count(&self, rule_id: &str) -> Result<u64> {
        let count = self
            .client
            .read(&self.queries.rule_forwarding_count(rule_id))
            .await?;
        Ok(count
            .as_deref()
            .and_then(|c| c.as_ref())
            .map(|c| c.total)
            .unwrap_or(0))
    }

    /// Delete a rule, dropping the selection when it pointed at that rule
    pub async fn delete_rule(&mut self, id: &str) -> Result<()> {
        self.mutations.delete_rule(id).await?;
        self.selection.clear_if(id);
        self.sync_recent();
        Ok(())
    }

    fn sync_recent(&mut self) {
        let selected = self.selection.selected_id().map(str::to_string);
        if selected != self.recent_for {
            self.recent
                .set_query(rule_events(&self.queries, selected.as_deref()));
            self.recent_for = selected;
        }
    }
}
