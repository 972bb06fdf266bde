//! Resend API key and webhook secret repository

use super::{decode, optional, require_user, NEWEST_FIRST};
use crate::backend::{ListOptions, RecordStore};
use crate::models::Credential;
use resendforward_common::types::CredentialKind;
use resendforward_common::Result;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Credential repository
///
/// A user may accumulate several records of each kind; only the newest one
/// is ever considered current.
#[derive(Clone)]
pub struct CredentialRepository {
    store: Arc<dyn RecordStore>,
}

impl CredentialRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Newest credential of the given kind, `None` when there is none
    pub async fn latest(&self, kind: CredentialKind) -> Result<Option<Credential>> {
        let options = ListOptions::new().sort(NEWEST_FIRST);
        let record = optional(self.store.get_first(kind.collection(), &options).await)?;
        record.map(decode).transpose()
    }

    pub async fn create(&self, kind: CredentialKind, value: &str) -> Result<Credential> {
        let user = require_user(self.store.as_ref()).await?;
        let mut fields = Map::new();
        fields.insert("user".to_string(), Value::String(user));
        fields.insert(kind.value_field().to_string(), Value::String(value.to_string()));
        decode(self.store.create(kind.collection(), Value::Object(fields)).await?)
    }

    pub async fn delete(&self, kind: CredentialKind, id: &str) -> Result<()> {
        self.store.delete(kind.collection(), id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, StoreOp};
    use resendforward_common::Error;

    #[tokio::test]
    async fn test_latest_is_newest() {
        let store = Arc::new(MemoryStore::new("u1"));
        let repo = CredentialRepository::new(store.clone());
        assert_eq!(repo.latest(CredentialKind::ApiKey).await.unwrap(), None);

        repo.create(CredentialKind::ApiKey, "re_old").await.unwrap();
        repo.create(CredentialKind::ApiKey, "re_new").await.unwrap();

        let latest = repo.latest(CredentialKind::ApiKey).await.unwrap().unwrap();
        assert_eq!(latest.value, "re_new");
        assert_eq!(repo.latest(CredentialKind::WebhookSecret).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_latest_surfaces_other_errors() {
        let store = Arc::new(MemoryStore::new("u1"));
        store
            .fail_next(
                StoreOp::GetFirst,
                CredentialKind::WebhookSecret.collection(),
                Error::Network("connection reset".to_string()),
            )
            .await;

        let repo = CredentialRepository::new(store);
        let err = repo.latest(CredentialKind::WebhookSecret).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_create_requires_user() {
        let repo = CredentialRepository::new(Arc::new(MemoryStore::anonymous()));
        let err = repo.create(CredentialKind::ApiKey, "re_x").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
