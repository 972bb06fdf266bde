//! Record store seam
//!
//! Everything the dashboard knows about persistence goes through
//! [`RecordStore`]. The backend owns every record; implementations only move
//! JSON records across the boundary.

use crate::filter::Filter;
use async_trait::async_trait;
use resendforward_common::types::{Collection, RecordId};
use resendforward_common::Result;
use serde_json::Value;

/// List query options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub filter: Filter,
    /// Sort expression, e.g. `-created`
    pub sort: Option<String>,
    /// Comma-separated relation fields to expand
    pub expand: Option<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }
}

/// Backend collection access
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record matching the options, in sort order
    async fn list(&self, collection: Collection, options: &ListOptions) -> Result<Vec<Value>>;

    /// One record by id; `Error::NotFound` when absent
    async fn get_one(&self, collection: Collection, id: &str) -> Result<Value>;

    /// First record matching the options; `Error::NotFound` when none match
    async fn get_first(&self, collection: Collection, options: &ListOptions) -> Result<Value>;

    /// Create a record from the given fields
    async fn create(&self, collection: Collection, fields: Value) -> Result<Value>;

    /// Apply a partial update
    async fn update(&self, collection: Collection, id: &str, fields: Value) -> Result<Value>;

    /// Delete a record
    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    /// Id of the authenticated user, if any
    async fn current_user(&self) -> Option<RecordId>;
}
