//! In-memory record store
//!
//! Holds records in process and answers the same operations as the hosted
//! backend, including the aggregate views. Used by tests and local
//! development; supports per-operation failure injection and call counting.

use crate::backend::{ListOptions, RecordStore};
use crate::filter::{Filter, Op};
use async_trait::async_trait;
use chrono::Utc;
use resendforward_common::time::format_timestamp;
use resendforward_common::types::{Collection, RecordId};
use resendforward_common::{Error, Result};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Store operation, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Get,
    GetFirst,
    Create,
    Update,
    Delete,
}

#[derive(Default)]
struct State {
    /// Records per collection in insertion order; ties on sort keys fall back to it
    records: HashMap<Collection, Vec<Value>>,
    calls: HashMap<(StoreOp, Collection), usize>,
    failures: HashMap<(StoreOp, Collection), Vec<Error>>,
}

/// In-memory backend
pub struct MemoryStore {
    user: Option<RecordId>,
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create an empty store acting on behalf of `user`
    pub fn new(user: impl Into<RecordId>) -> Self {
        Self {
            user: Some(user.into()),
            state: RwLock::new(State::default()),
        }
    }

    /// Create an empty store with no authenticated user
    pub fn anonymous() -> Self {
        Self {
            user: None,
            state: RwLock::new(State::default()),
        }
    }

    /// Insert a record as the backend itself would (e.g. webhook processing)
    pub async fn insert(&self, collection: Collection, fields: Value) -> Value {
        let mut state = self.state.write().await;
        Self::insert_locked(&mut state, collection, fields)
    }

    /// Make the next `op` on `collection` fail with `error`
    pub async fn fail_next(&self, op: StoreOp, collection: Collection, error: Error) {
        let mut state = self.state.write().await;
        state
            .failures
            .entry((op, collection))
            .or_default()
            .push(error);
    }

    /// Number of `op` calls made against `collection`
    pub async fn calls(&self, op: StoreOp, collection: Collection) -> usize {
        let state = self.state.read().await;
        state.calls.get(&(op, collection)).copied().unwrap_or(0)
    }

    /// Raw records of a base collection
    pub async fn records(&self, collection: Collection) -> Vec<Value> {
        let state = self.state.read().await;
        state.records.get(&collection).cloned().unwrap_or_default()
    }

    fn insert_locked(state: &mut State, collection: Collection, fields: Value) -> Value {
        let stamp = format_timestamp(&Utc::now());

        let mut record = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        record
            .entry("id")
            .or_insert_with(|| Value::String(new_id()));
        record
            .entry("created")
            .or_insert_with(|| Value::String(stamp.clone()));
        record.insert("updated".to_string(), Value::String(stamp));
        record.insert(
            "collectionName".to_string(),
            Value::String(collection.as_str().to_string()),
        );

        let record = Value::Object(record);
        state
            .records
            .entry(collection)
            .or_default()
            .push(record.clone());
        record
    }

    /// Count the call and pop an injected failure, if any
    fn enter(state: &mut State, op: StoreOp, collection: Collection) -> Result<()> {
        *state.calls.entry((op, collection)).or_default() += 1;
        if let Some(queue) = state.failures.get_mut(&(op, collection)) {
            if !queue.is_empty() {
                let error = queue.remove(0);
                debug!(?op, %collection, "Injected failure");
                return Err(error);
            }
        }
        Ok(())
    }

    fn rows(state: &State, collection: Collection) -> Vec<Value> {
        if collection.is_view() {
            return compute_view(state, collection);
        }
        state.records.get(&collection).cloned().unwrap_or_default()
    }

    fn query(state: &State, collection: Collection, options: &ListOptions) -> Vec<Value> {
        let mut rows: Vec<(usize, Value)> = Self::rows(state, collection)
            .into_iter()
            .enumerate()
            .filter(|(_, record)| matches(&options.filter, record))
            .collect();

        if let Some(sort) = options.sort.as_deref().filter(|s| !s.is_empty()) {
            let (field, descending) = match sort.strip_prefix('-') {
                Some(field) => (field, true),
                None => (sort.trim_start_matches('+'), false),
            };
            rows.sort_by(|(ia, a), (ib, b)| {
                let ordering = field_text(a, field)
                    .cmp(&field_text(b, field))
                    .then(ia.cmp(ib));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        rows.into_iter().map(|(_, record)| record).collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(&self, collection: Collection, options: &ListOptions) -> Result<Vec<Value>> {
        let mut state = self.state.write().await;
        Self::enter(&mut state, StoreOp::List, collection)?;
        Ok(Self::query(&state, collection, options))
    }

    async fn get_one(&self, collection: Collection, id: &str) -> Result<Value> {
        let mut state = self.state.write().await;
        Self::enter(&mut state, StoreOp::Get, collection)?;
        Self::rows(&state, collection)
            .into_iter()
            .find(|r| r["id"] == id)
            .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, id)))
    }

    async fn get_first(&self, collection: Collection, options: &ListOptions) -> Result<Value> {
        let mut state = self.state.write().await;
        Self::enter(&mut state, StoreOp::GetFirst, collection)?;
        Self::query(&state, collection, options)
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("No {} record matches", collection)))
    }

    async fn create(&self, collection: Collection, fields: Value) -> Result<Value> {
        let mut state = self.state.write().await;
        Self::enter(&mut state, StoreOp::Create, collection)?;
        if collection.is_view() {
            return Err(Error::Validation(format!("{} is read-only", collection)));
        }
        Ok(Self::insert_locked(&mut state, collection, fields))
    }

    async fn update(&self, collection: Collection, id: &str, fields: Value) -> Result<Value> {
        let mut state = self.state.write().await;
        Self::enter(&mut state, StoreOp::Update, collection)?;
        let stamp = format_timestamp(&Utc::now());

        let record = state
            .records
            .get_mut(&collection)
            .and_then(|rows| rows.iter_mut().find(|r| r["id"] == id))
            .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, id)))?;

        if let (Value::Object(target), Value::Object(patch)) = (&mut *record, fields) {
            for (key, value) in patch {
                if key != "id" && key != "created" {
                    target.insert(key, value);
                }
            }
            target.insert("updated".to_string(), Value::String(stamp));
        }
        Ok(record.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        Self::enter(&mut state, StoreOp::Delete, collection)?;
        let rows = state.records.entry(collection).or_default();
        let before = rows.len();
        rows.retain(|r| r["id"] != id);
        if rows.len() == before {
            return Err(Error::NotFound(format!("{}/{}", collection, id)));
        }
        Ok(())
    }

    async fn current_user(&self) -> Option<RecordId> {
        self.user.clone()
    }
}

/// Backend-style 15 character id
fn new_id() -> RecordId {
    Uuid::new_v4().simple().to_string()[..15].to_string()
}

fn field_text(record: &Value, field: &str) -> String {
    match &record[field] {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Evaluate a structured filter against one record
fn matches(filter: &Filter, record: &Value) -> bool {
    filter.predicates().iter().all(|p| {
        let actual = field_text(record, p.field);
        match p.op {
            Op::Eq => actual == p.value,
            Op::Gte => actual >= p.value,
            Op::Lte => actual <= p.value,
        }
    })
}

/// Aggregate views, computed the way the backend's view collections are
fn compute_view(state: &State, collection: Collection) -> Vec<Value> {
    let rules = state
        .records
        .get(&Collection::ForwardingRules)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let events = state
        .records
        .get(&Collection::ForwardingEvents)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut out: Vec<Value> = Vec::new();
    match collection {
        Collection::RulesStats => {
            for user in distinct(rules, "user") {
                let owned: Vec<&Value> = rules.iter().filter(|r| r["user"] == user).collect();
                let active = owned.iter().filter(|r| r["enabled"] == true).count();
                out.push(json!({
                    "id": user,
                    "user": user,
                    "total_rules": owned.len(),
                    "active_rules": active,
                }));
            }
        }
        Collection::ForwardingStats => {
            for user in distinct(events, "user") {
                let owned: Vec<&Value> = events.iter().filter(|e| e["user"] == user).collect();
                let count = |status: &str| owned.iter().filter(|e| e["status"] == status).count();
                out.push(json!({
                    "id": user,
                    "user": user,
                    "total": owned.len(),
                    "delivered": count("delivered"),
                    "failed": count("failed"),
                }));
            }
        }
        Collection::ForwardingCounts => {
            for rule in distinct(events, "rule") {
                let owned: Vec<&Value> = events.iter().filter(|e| e["rule"] == rule).collect();
                let user = owned
                    .first()
                    .map(|e| e["user"].clone())
                    .unwrap_or(Value::Null);
                out.push(json!({
                    "id": rule,
                    "user": user,
                    "rule": rule,
                    "total": owned.len(),
                }));
            }
        }
        _ => {}
    }
    out
}

fn distinct(records: &[Value], field: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for record in records {
        if let Some(value) = record[field].as_str() {
            if !seen.iter().any(|s| s == value) {
                seen.push(value.to_string());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_filter_and_sort() {
        let store = MemoryStore::new("u1");
        store
            .insert(Collection::ForwardingEvents, json!({ "id": "e1", "user": "u1", "rule": "r1", "status": "sent" }))
            .await;
        store
            .insert(Collection::ForwardingEvents, json!({ "id": "e2", "user": "u1", "rule": "r1", "status": "pending" }))
            .await;
        store
            .insert(Collection::ForwardingEvents, json!({ "id": "e3", "user": "u1", "rule": "r2", "status": "pending" }))
            .await;

        let options = ListOptions::new()
            .filter(Filter::new().eq("rule", Some("r1")))
            .sort("-created");
        let rows = store.list(Collection::ForwardingEvents, &options).await.unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, vec!["e2", "e1"]);
        assert_eq!(store.calls(StoreOp::List, Collection::ForwardingEvents).await, 1);
    }

    #[tokio::test]
    async fn test_views_follow_base_records() {
        let store = MemoryStore::new("u1");
        assert!(store
            .get_first(Collection::RulesStats, &ListOptions::new())
            .await
            .unwrap_err()
            .is_not_found());

        let rule = store
            .create(
                Collection::ForwardingRules,
                json!({ "user": "u1", "rule_email": "a@x.com", "enabled": true }),
            )
            .await
            .unwrap();
        store
            .create(
                Collection::ForwardingRules,
                json!({ "user": "u1", "rule_email": "b@x.com", "enabled": false }),
            )
            .await
            .unwrap();

        let stats = store
            .get_first(Collection::RulesStats, &ListOptions::new())
            .await
            .unwrap();
        assert_eq!(stats["total_rules"], 2);
        assert_eq!(stats["active_rules"], 1);

        let rule_id = rule["id"].as_str().unwrap();
        assert_eq!(rule_id.len(), 15);
        store.delete(Collection::ForwardingRules, rule_id).await.unwrap();
        let stats = store
            .get_first(Collection::RulesStats, &ListOptions::new())
            .await
            .unwrap();
        assert_eq!(stats["total_rules"], 1);
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let store = MemoryStore::new("u1");
        store
            .fail_next(
                StoreOp::Create,
                Collection::ResendApiKeys,
                Error::Network("connection reset".to_string()),
            )
            .await;

        let first = store
            .create(Collection::ResendApiKeys, json!({ "user": "u1", "key": "re_1" }))
            .await;
        assert!(matches!(first, Err(Error::Network(_))));

        let second = store
            .create(Collection::ResendApiKeys, json!({ "user": "u1", "key": "re_1" }))
            .await;
        assert!(second.is_ok());
        assert_eq!(store.calls(StoreOp::Create, Collection::ResendApiKeys).await, 2);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new("u1");
        let rule = store
            .insert(Collection::ForwardingRules, json!({ "user": "u1", "rule_name": "Old", "enabled": true }))
            .await;
        let id = rule["id"].as_str().unwrap();

        let updated = store
            .update(Collection::ForwardingRules, id, json!({ "enabled": false }))
            .await
            .unwrap();
        assert_eq!(updated["rule_name"], "Old");
        assert_eq!(updated["enabled"], false);

        let missing = store
            .update(Collection::ForwardingRules, "nope", json!({}))
            .await;
        assert!(missing.unwrap_err().is_not_found());
    }
}
