//! Aggregate statistics views

use super::{decode, optional};
use crate::backend::{ListOptions, RecordStore};
use crate::filter::Filter;
use crate::models::{ForwardingCount, ForwardingStats, RulesStats};
use resendforward_common::types::Collection;
use resendforward_common::Result;
use std::sync::Arc;

/// Read access to the backend's aggregate views
#[derive(Clone)]
pub struct StatsRepository {
    store: Arc<dyn RecordStore>,
}

impl StatsRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn forwarding_stats(&self) -> Result<Option<ForwardingStats>> {
        self.first(Collection::ForwardingStats, ListOptions::new()).await
    }

    pub async fn rules_stats(&self) -> Result<Option<RulesStats>> {
        self.first(Collection::RulesStats, ListOptions::new()).await
    }

    /// Forwarded-event count for one rule
    pub async fn rule_forwarding_count(&self, rule_id: &str) -> Result<Option<ForwardingCount>> {
        let options = ListOptions::new().filter(Filter::new().eq("rule", Some(rule_id)));
        self.first(Collection::ForwardingCounts, options).await
    }

    async fn first<T: serde::de::DeserializeOwned>(
        &self,
        collection: Collection,
        options: ListOptions,
    ) -> Result<Option<T>> {
        optional(self.store.get_first(collection, &options).await)?
            .map(decode)
            .transpose()
    }
}
