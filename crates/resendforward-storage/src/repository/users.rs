//! Account-level operations

use super::require_user;
use crate::backend::RecordStore;
use resendforward_common::types::Collection;
use resendforward_common::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn RecordStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Delete the authenticated user's account
    pub async fn delete_account(&self) -> Result<()> {
        let user = require_user(self.store.as_ref()).await?;
        self.store.delete(Collection::Users, &user).await
    }
}
