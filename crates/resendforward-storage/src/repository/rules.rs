//! Forwarding rule repository

use super::{decode, decode_all, require_user, NEWEST_FIRST};
use crate::backend::{ListOptions, RecordStore};
use crate::models::{ForwardingRule, NewRule, RuleUpdate};
use resendforward_common::types::Collection;
use resendforward_common::{Error, Result};
use serde_json::json;
use std::sync::Arc;

/// Forwarding rule repository
#[derive(Clone)]
pub struct RuleRepository {
    store: Arc<dyn RecordStore>,
}

impl RuleRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// All rules, newest first
    pub async fn list(&self) -> Result<Vec<ForwardingRule>> {
        let options = ListOptions::new().sort(NEWEST_FIRST);
        decode_all(self.store.list(Collection::ForwardingRules, &options).await?)
    }

    pub async fn get(&self, id: &str) -> Result<ForwardingRule> {
        decode(self.store.get_one(Collection::ForwardingRules, id).await?)
    }

    /// Create an enabled rule owned by the authenticated user
    pub async fn create(&self, rule: &NewRule) -> Result<ForwardingRule> {
        let user = require_user(self.store.as_ref()).await?;
        let fields = json!({
            "user": user,
            "rule_name": rule.name,
            "rule_email": rule.rule_email,
            "forward_to_email": rule.to_email,
            "send_from_email": rule.from_email,
            "enabled": true,
        });
        decode(self.store.create(Collection::ForwardingRules, fields).await?)
    }

    pub async fn update(&self, id: &str, update: &RuleUpdate) -> Result<ForwardingRule> {
        let fields = serde_json::to_value(update)
            .map_err(|e| Error::Internal(format!("Failed to encode rule update: {}", e)))?;
        decode(self.store.update(Collection::ForwardingRules, id, fields).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(Collection::ForwardingRules, id).await
    }
}
