//! ResendForward Core - Dashboard data layer
//!
//! This crate provides:
//! - A shared query cache with last-request-wins commits and invalidation events
//! - Watched queries that poll only while in-flight records remain
//! - Mutations with cache invalidation and uniform error reporting
//! - URL filter state, time ranges and selection binding for the dashboard pages

pub mod cache;
pub mod date_range;
pub mod mutations;
pub mod notify;
pub mod queries;
pub mod query;
pub mod search_params;
pub mod selection;
pub mod settings;
pub mod views;

pub use cache::{CacheEvent, QueryCache, QueryKey};
pub use date_range::{DateRange, TimeRange};
pub use mutations::Mutations;
pub use notify::{Level, LogNotifier, Notification, Notifier};
pub use queries::Queries;
pub use query::{Query, QueryClient, QueryState, QueryWatch};
pub use search_params::{FilterChange, FilterState, SearchPatch};
pub use selection::Selection;
pub use settings::RequiredSettings;
pub use views::{ForwardingView, LogsView, RulesView};

use resendforward_common::config::PollingConfig;
use resendforward_common::types::CredentialKind;
use resendforward_common::Result;
use resendforward_storage::{RecordStore, Repositories};
use std::sync::Arc;

/// Dashboard data layer over one record store
#[derive(Clone)]
pub struct Dashboard {
    client: QueryClient,
    queries: Queries,
    mutations: Mutations,
}

impl Dashboard {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        polling: &PollingConfig,
    ) -> Self {
        let repos = Repositories::new(store);
        let cache = Arc::new(QueryCache::new(polling.event_buffer));
        let client = QueryClient::new(cache.clone(), notifier.clone(), polling.interval());
        Self {
            client,
            queries: Queries::new(repos.clone()),
            mutations: Mutations::new(repos, cache, notifier),
        }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    pub fn mutations(&self) -> &Mutations {
        &self.mutations
    }

    /// Whether forwarding can work: both credentials must be set
    pub async fn required_settings(&self) -> Result<RequiredSettings> {
        let api_key = self
            .client
            .read(&self.queries.credential(CredentialKind::ApiKey))
            .await?;
        let secret = self
            .client
            .read(&self.queries.credential(CredentialKind::WebhookSecret))
            .await?;
        Ok(RequiredSettings::evaluate(
            api_key.as_deref().and_then(Option::as_ref),
            secret.as_deref().and_then(Option::as_ref),
        ))
    }

    pub fn forwarding_view(&self, search: &str) -> ForwardingView {
        ForwardingView::open(&self.client, &self.queries, search)
    }

    pub fn logs_view(&self, search: &str) -> LogsView {
        LogsView::open(&self.client, &self.queries, search)
    }

    pub fn rules_view(&self, search: &str) -> RulesView {
        RulesView::open(&self.client, &self.queries, &self.mutations, search)
    }
}
