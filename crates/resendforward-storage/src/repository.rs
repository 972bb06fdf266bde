//! Repository layer for typed collection access

pub mod credentials;
pub mod events;
pub mod logs;
pub mod rules;
pub mod stats;
pub mod users;

pub use credentials::CredentialRepository;
pub use events::{EventRepository, ForwardingEventFilters};
pub use logs::{EventLogFilters, LogRepository};
pub use rules::RuleRepository;
pub use stats::StatsRepository;
pub use users::UserRepository;

use crate::backend::RecordStore;
use resendforward_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Default sort for every list: newest first
pub const NEWEST_FIRST: &str = "-created";

/// Every repository over one shared store
#[derive(Clone)]
pub struct Repositories {
    pub rules: RuleRepository,
    pub events: EventRepository,
    pub logs: LogRepository,
    pub credentials: CredentialRepository,
    pub stats: StatsRepository,
    pub users: UserRepository,
}

impl Repositories {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            rules: RuleRepository::new(store.clone()),
            events: EventRepository::new(store.clone()),
            logs: LogRepository::new(store.clone()),
            credentials: CredentialRepository::new(store.clone()),
            stats: StatsRepository::new(store.clone()),
            users: UserRepository::new(store),
        }
    }
}

pub(crate) fn decode<T: DeserializeOwned>(record: Value) -> Result<T> {
    serde_json::from_value(record).map_err(|e| Error::Decode(format!("Unexpected record shape: {}", e)))
}

pub(crate) fn decode_all<T: DeserializeOwned>(records: Vec<Value>) -> Result<Vec<T>> {
    records.into_iter().map(decode).collect()
}

/// Map `NotFound` to `None`, keeping every other error
pub(crate) fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Id of the authenticated user, or an auth error
pub(crate) async fn require_user(store: &dyn RecordStore) -> Result<String> {
    store
        .current_user()
        .await
        .ok_or_else(|| Error::Auth("No logged in user detected.".to_string()))
}
