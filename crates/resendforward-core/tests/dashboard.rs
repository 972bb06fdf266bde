use async_trait::async_trait;
use pretty_assertions::assert_eq;
use resendforward_common::config::PollingConfig;
use resendforward_common::types::{Collection, CredentialKind, EventStatus, LogType, RecordId};
use resendforward_common::{Error, Result};
use resendforward_core::notify::{channel, Level, Notification};
use resendforward_core::{CacheEvent, Dashboard, FilterChange};
use resendforward_storage::{ListOptions, MemoryStore, NewRule, RecordStore, StoreOp};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn dashboard(store: Arc<MemoryStore>) -> (Dashboard, UnboundedReceiver<Notification>) {
    let (notifier, rx) = channel();
    let dashboard = Dashboard::new(store, Arc::new(notifier), &PollingConfig::default());
    (dashboard, rx)
}

fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn support_rule() -> NewRule {
    NewRule {
        name: "Support".to_string(),
        rule_email: "catch@x.com".to_string(),
        to_email: "dest@x.com".to_string(),
        from_email: "noreply@x.com".to_string(),
    }
}

/// Memory store whose list requests take a while to answer
struct SlowStore {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

#[async_trait]
impl RecordStore for SlowStore {
    async fn list(&self, collection: Collection, options: &ListOptions) -> Result<Vec<Value>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list(collection, options).await
    }

    async fn get_one(&self, collection: Collection, id: &str) -> Result<Value> {
        self.inner.get_one(collection, id).await
    }

    async fn get_first(&self, collection: Collection, options: &ListOptions) -> Result<Value> {
        self.inner.get_first(collection, options).await
    }

    async fn create(&self, collection: Collection, fields: Value) -> Result<Value> {
        self.inner.create(collection, fields).await
    }

    async fn update(&self, collection: Collection, id: &str, fields: Value) -> Result<Value> {
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.inner.delete(collection, id).await
    }

    async fn current_user(&self) -> Option<RecordId> {
        self.inner.current_user().await
    }
}

async fn insert_event(store: &MemoryStore, id: &str, rule: &str, status: &str) {
    store
        .insert(
            Collection::ForwardingEvents,
            json!({
                "id": id,
                "user": "u1",
                "rule": rule,
                "subject": "Hello",
                "from": "alice@example.com",
                "to": "catch@x.com",
                "status": status,
            }),
        )
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_polling_follows_pending_events() {
    let store = Arc::new(MemoryStore::new("u1"));
    insert_event(&store, "e1aaaaaaaaaaaaa", "r1aaaaaaaaaaaaa", "pending").await;
    let (dashboard, _rx) = dashboard(store.clone());
    let list_calls = || store.calls(StoreOp::List, Collection::ForwardingEvents);

    let mut view = dashboard.forwarding_view("");
    let state = view.refresh().await.unwrap();
    assert_eq!(state.data.unwrap()[0].status, EventStatus::Pending);
    assert_eq!(list_calls().await, 1);

    // a pending event keeps the list polling on the fixed interval
    let started = tokio::time::Instant::now();
    view.refresh().await.unwrap();
    assert!(started.elapsed() <= PollingConfig::default().interval());
    assert_eq!(list_calls().await, 2);

    store
        .update(
            Collection::ForwardingEvents,
            "e1aaaaaaaaaaaaa",
            json!({ "status": "delivered" }),
        )
        .await
        .unwrap();
    let state = view.refresh().await.unwrap();
    assert_eq!(state.data.unwrap()[0].status, EventStatus::Delivered);
    assert_eq!(list_calls().await, 3);

    // nothing pending: no further request is scheduled
    let idle = tokio::time::timeout(Duration::from_secs(60), view.refresh()).await;
    assert!(idle.is_err());
    assert_eq!(list_calls().await, 3);
}

#[tokio::test]
async fn test_create_rule_refreshes_rules_and_stats() {
    let store = Arc::new(MemoryStore::new("u1"));
    let (dashboard, mut rx) = dashboard(store.clone());

    let mut view = dashboard.rules_view("");
    assert!(view.refresh().await.unwrap().data.unwrap().is_empty());
    assert_eq!(*view.refresh_stats().await.unwrap().data.unwrap(), None);

    let mut events = dashboard.client().cache().subscribe();
    let rule = dashboard.mutations().create_rule(support_rule()).await.unwrap();

    let mut invalidated: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            CacheEvent::Invalidated(key) => Some(key.root),
            CacheEvent::Updated(_) => None,
        })
        .collect();
    invalidated.sort();
    assert_eq!(invalidated, vec!["forwardingRules", "rulesStats"]);

    let rules = view.refresh().await.unwrap().data.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, rule.id);
    assert_eq!(rules[0].rule_name, "Support");
    assert!(rules[0].enabled);

    let stats = view.refresh_stats().await.unwrap().data.unwrap();
    assert_eq!((*stats).as_ref().map(|s| s.total_rules), Some(1));

    let toasts = drain(&mut rx);
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, Level::Success);
    assert_eq!(toasts[0].title, "Forwarding rule created successfully");
}

#[tokio::test]
async fn test_credential_replace_gap_is_observable() {
    let store = Arc::new(MemoryStore::new("u1"));
    let (dashboard, mut rx) = dashboard(store.clone());
    let api_key = dashboard.queries().credential(CredentialKind::ApiKey);

    let existing = dashboard
        .mutations()
        .set_credential(CredentialKind::ApiKey, "re_old")
        .await
        .unwrap();
    let current = dashboard.client().read(&api_key).await.unwrap().unwrap();
    assert_eq!((*current).as_ref().map(|c| c.value.as_str()), Some("re_old"));
    let saved: Vec<String> = drain(&mut rx).into_iter().map(|n| n.title).collect();
    assert_eq!(saved, vec!["API key saved successfully".to_string()]);

    store
        .fail_next(
            StoreOp::Create,
            Collection::ResendApiKeys,
            Error::Backend {
                status: 500,
                message: "Something went wrong".to_string(),
            },
        )
        .await;
    let err = dashboard
        .mutations()
        .replace_credential(CredentialKind::ApiKey, Some(&existing), "re_new")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Backend { status: 500, .. }));

    assert!(store.records(Collection::ResendApiKeys).await.is_empty());
    assert_eq!(store.calls(StoreOp::Create, Collection::ResendApiKeys).await, 2);

    let toasts = drain(&mut rx);
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, Level::Error);
    assert_eq!(toasts[0].title, "An error occurred");

    let after = dashboard.client().read(&api_key).await.unwrap().unwrap();
    assert_eq!(*after, None);

    let settings = dashboard.required_settings().await.unwrap();
    assert!(!settings.is_configured);
    assert_eq!(
        settings.missing,
        vec![CredentialKind::ApiKey, CredentialKind::WebhookSecret]
    );
}

#[tokio::test]
async fn test_selected_event_follows_list() {
    let store = Arc::new(MemoryStore::new("u1"));
    insert_event(&store, "e1aaaaaaaaaaaaa", "r1aaaaaaaaaaaaa", "failed").await;
    insert_event(&store, "e2aaaaaaaaaaaaa", "r1aaaaaaaaaaaaa", "delivered").await;
    store
        .insert(
            Collection::EventLogs,
            json!({
                "user": "u1",
                "event": "e2aaaaaaaaaaaaa",
                "rule": "r1aaaaaaaaaaaaa",
                "type": "email.delivered",
                "metadata": { "email_id": "re_123" },
            }),
        )
        .await;
    let (dashboard, mut rx) = dashboard(store.clone());

    let mut view = dashboard.forwarding_view("eventId=e2aaaaaaaaaaaaa&timeRange=30d");
    assert!(view.logs().data.is_none());

    view.refresh().await.unwrap();
    assert_eq!(view.selected().map(|e| e.id.as_str()), Some("e2aaaaaaaaaaaaa"));

    let logs = view.refresh_logs().await.unwrap().data.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].event.as_deref(), Some("e2aaaaaaaaaaaaa"));

    // the selected event drops out of the filtered list
    let patch = view.change_filter(FilterChange::status("failed"));
    assert_eq!(
        patch.apply_to("eventId=e2aaaaaaaaaaaaa&timeRange=30d"),
        "eventId=e2aaaaaaaaaaaaa&timeRange=30d&status=failed"
    );
    let events = view.refresh().await.unwrap().data.unwrap();
    assert_eq!(events.len(), 1);
    assert!(view.selected().is_none());

    let logs = view.refresh_logs().await.unwrap();
    assert!(logs.data.is_none());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_deleting_selected_rule_clears_selection() {
    let store = Arc::new(MemoryStore::new("u1"));
    let (dashboard, _rx) = dashboard(store.clone());
    let rule = dashboard.mutations().create_rule(support_rule()).await.unwrap();
    for n in 0..7 {
        insert_event(&store, &format!("e{}aaaaaaaaaaaaa", n), &rule.id, "delivered").await;
    }

    let mut view = dashboard.rules_view(&format!("ruleId={}", rule.id));
    view.refresh().await.unwrap();
    assert_eq!(view.selected().map(|r| r.id.clone()), Some(rule.id.clone()));

    let recent = view.refresh_recent().await.unwrap().data.unwrap();
    assert_eq!(recent.len(), 7);
    let shown: Vec<String> = view.recent_events().into_iter().map(|e| e.id).collect();
    assert_eq!(
        shown,
        vec![
            "e6aaaaaaaaaaaaa",
            "e5aaaaaaaaaaaaa",
            "e4aaaaaaaaaaaaa",
            "e3aaaaaaaaaaaaa",
            "e2aaaaaaaaaaaaa",
        ]
    );
    assert_eq!(view.forwarding_count(&rule.id).await.unwrap(), 7);

    view.delete_rule(&rule.id).await.unwrap();
    assert!(view.selected().is_none());
    assert!(view.recent_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_views_sharing_a_key_stay_in_step() {
    let memory = Arc::new(MemoryStore::new("u1"));
    let store = Arc::new(SlowStore {
        inner: memory.clone(),
        delay: Duration::from_millis(50),
    });
    let (notifier, _rx) = channel();
    let dashboard = Dashboard::new(store, Arc::new(notifier), &PollingConfig::default());
    let rule_lists = || memory.calls(StoreOp::List, Collection::ForwardingRules);

    let mut first = dashboard.rules_view("");
    let mut second = dashboard.rules_view("");
    let initial = first.refresh().await.unwrap();
    assert!(initial.data.unwrap().is_empty());
    let initial = second.refresh().await.unwrap();
    assert!(initial.data.unwrap().is_empty());
    assert_eq!(rule_lists().await, 1);

    dashboard.mutations().create_rule(support_rule()).await.unwrap();

    assert_eq!(first.refresh().await.unwrap().data.unwrap().len(), 1);
    assert_eq!(second.refresh().await.unwrap().data.unwrap().len(), 1);
    assert_eq!(rule_lists().await, 2);

    // a one-shot read of the watched key joins the request in flight
    dashboard.client().cache().invalidate("forwardingRules").await;
    let read = dashboard
        .client()
        .read(&dashboard.queries().forwarding_rules())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(first.refresh().await.unwrap().data.unwrap().len(), 1);
    assert_eq!(second.refresh().await.unwrap().data.unwrap().len(), 1);
    assert_eq!(rule_lists().await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_log_polling_follows_in_flight_steps() {
    let store = Arc::new(MemoryStore::new("u1"));
    store
        .insert(
            Collection::EventLogs,
            json!({
                "id": "l1aaaaaaaaaaaaa",
                "user": "u1",
                "event": "e1aaaaaaaaaaaaa",
                "rule": "r1aaaaaaaaaaaaa",
                "type": "forward.initiated",
            }),
        )
        .await;
    let (dashboard, _rx) = dashboard(store.clone());
    let log_lists = || store.calls(StoreOp::List, Collection::EventLogs);

    let mut view = dashboard.logs_view("");
    let logs = view.refresh().await.unwrap().data.unwrap();
    assert_eq!(logs[0].log_type, LogType::ForwardInitiated);
    assert_eq!(log_lists().await, 1);

    let started = tokio::time::Instant::now();
    view.refresh().await.unwrap();
    assert!(started.elapsed() <= PollingConfig::default().interval());
    assert_eq!(log_lists().await, 2);

    // the step completes
    store
        .update(
            Collection::EventLogs,
            "l1aaaaaaaaaaaaa",
            json!({ "type": "email.delivered" }),
        )
        .await
        .unwrap();
    let logs = view.refresh().await.unwrap().data.unwrap();
    assert_eq!(logs[0].log_type, LogType::EmailDelivered);
    assert_eq!(log_lists().await, 3);

    let idle = tokio::time::timeout(Duration::from_secs(60), view.refresh()).await;
    assert!(idle.is_err());
    assert_eq!(log_lists().await, 3);
}

#[tokio::test]
async fn test_time_range_bounds_the_event_list() {
    let store = Arc::new(MemoryStore::new("u1"));
    insert_event(&store, "e1aaaaaaaaaaaaa", "r1aaaaaaaaaaaaa", "delivered").await;
    store
        .insert(
            Collection::ForwardingEvents,
            json!({
                "id": "e0aaaaaaaaaaaaa",
                "user": "u1",
                "rule": "r1aaaaaaaaaaaaa",
                "subject": "Old news",
                "from": "alice@example.com",
                "to": "catch@x.com",
                "status": "delivered",
                "created": "2020-01-01 00:00:00.000Z",
            }),
        )
        .await;
    let (dashboard, _rx) = dashboard(store.clone());

    let mut view = dashboard.forwarding_view("timeRange=7d");
    let events = view.refresh().await.unwrap().data.unwrap();
    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e1aaaaaaaaaaaaa"]);

    let patch = view.change_filter(FilterChange::time_range("all"));
    assert_eq!(patch.apply_to("timeRange=7d"), "timeRange=all");
    let events = view.refresh().await.unwrap().data.unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_forwarding_view_shows_global_stats() {
    let store = Arc::new(MemoryStore::new("u1"));
    insert_event(&store, "e1aaaaaaaaaaaaa", "r1aaaaaaaaaaaaa", "delivered").await;
    insert_event(&store, "e2aaaaaaaaaaaaa", "r1aaaaaaaaaaaaa", "failed").await;
    insert_event(&store, "e3aaaaaaaaaaaaa", "r2aaaaaaaaaaaaa", "pending").await;
    let (dashboard, _rx) = dashboard(store.clone());

    let mut view = dashboard.forwarding_view("");
    let stats = view.refresh_stats().await.unwrap().data.unwrap();
    let stats = (*stats).clone().unwrap();
    assert_eq!((stats.total, stats.delivered, stats.failed), (3, 1, 1));
    assert_eq!(*view.stats().data.unwrap(), Some(stats));
}

#[tokio::test]
async fn test_detail_queries_read_single_records() {
    let store = Arc::new(MemoryStore::new("u1"));
    insert_event(&store, "e1aaaaaaaaaaaaa", "r1aaaaaaaaaaaaa", "sent").await;
    let (dashboard, mut rx) = dashboard(store.clone());
    let (client, queries) = (dashboard.client(), dashboard.queries());

    let event = client
        .read(&queries.forwarding_event("e1aaaaaaaaaaaaa"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.status, EventStatus::Sent);
    client
        .read(&queries.forwarding_event("e1aaaaaaaaaaaaa"))
        .await
        .unwrap();
    assert_eq!(store.calls(StoreOp::Get, Collection::ForwardingEvents).await, 1);

    // no id, no request
    assert!(client.read(&queries.forwarding_rule("")).await.unwrap().is_none());
    assert_eq!(store.calls(StoreOp::Get, Collection::ForwardingRules).await, 0);

    let err = client
        .read(&queries.forwarding_rule("r9aaaaaaaaaaaaa"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(drain(&mut rx).len(), 1);
}
