//! Write operations
//!
//! Each mutation performs exactly one backend write (credential replacement
//! performs two), invalidates the queries it can affect on success, and
//! routes failures to the uniform error handler.

use crate::cache::QueryCache;
use crate::notify::{report_error, Notification, Notifier};
use crate::queries::{FORWARDING_RULES, RULES_STATS};
use resendforward_common::types::CredentialKind;
use resendforward_common::{Error, Result};
use resendforward_storage::{Credential, ForwardingRule, NewRule, Repositories, RuleUpdate};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Roots invalidated by any rule write
pub const RULE_QUERIES: &[&str] = &[FORWARDING_RULES, RULES_STATS];

#[derive(Clone)]
pub struct Mutations {
    repos: Repositories,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
}

impl Mutations {
    pub fn new(repos: Repositories, cache: Arc<QueryCache>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repos,
            cache,
            notifier,
        }
    }

    async fn run<T, F>(&self, action: &str, invalidates: &[&str], write: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match write.await {
            Ok(value) => {
                for root in invalidates {
                    self.cache.invalidate(root).await;
                }
                info!(action, "Mutation succeeded");
                Ok(value)
            }
            Err(e) => {
                report_error(self.notifier.as_ref(), &e);
                Err(e)
            }
        }
    }

    /// Local validation failure, surfaced before any network call
    fn reject(&self, message: &str) -> Error {
        self.notifier.notify(Notification::error(message, None));
        Error::Validation(message.to_string())
    }

    fn success(&self, message: &str) {
        self.notifier.notify(Notification::success(message));
    }

    pub async fn create_rule(&self, rule: NewRule) -> Result<ForwardingRule> {
        if !rule.is_complete() {
            return Err(self.reject("All fields are required"));
        }
        let created = self
            .run("create_rule", RULE_QUERIES, self.repos.rules.create(&rule))
            .await?;
        self.success("Forwarding rule created successfully");
        Ok(created)
    }

    /// Full-field or partial edit of a rule
    pub async fn update_rule(&self, id: &str, update: RuleUpdate) -> Result<ForwardingRule> {
        if update.is_empty() || update.has_blank_field() {
            return Err(self.reject("All fields are required"));
        }
        let updated = self
            .run("update_rule", RULE_QUERIES, self.repos.rules.update(id, &update))
            .await?;
        self.success("Forwarding rule updated successfully");
        Ok(updated)
    }

    pub async fn set_rule_enabled(&self, id: &str, enabled: bool) -> Result<ForwardingRule> {
        let update = RuleUpdate::enabled(enabled);
        let updated = self
            .run("set_rule_enabled", RULE_QUERIES, self.repos.rules.update(id, &update))
            .await?;
        self.success(if enabled {
            "Rule enabled successfully"
        } else {
            "Rule disabled successfully"
        });
        Ok(updated)
    }

    pub async fn delete_rule(&self, id: &str) -> Result<()> {
        self.run("delete_rule", RULE_QUERIES, self.repos.rules.delete(id))
            .await?;
        self.success("Forwarding rule deleted successfully");
        Ok(())
    }

    /// Create a credential record without touching an existing one
    pub async fn set_credential(&self, kind: CredentialKind, value: &str) -> Result<Credential> {
        if value.trim().is_empty() {
            return Err(self.reject(empty_credential_message(kind)));
        }
        let created = self.create_credential(kind, value).await?;
        self.success(&format!("{} saved successfully", kind.label()));
        Ok(created)
    }

    pub async fn delete_credential(&self, kind: CredentialKind, id: &str) -> Result<()> {
        self.run(
            "delete_credential",
            &[kind.query_root()],
            self.repos.credentials.delete(kind, id),
        )
        .await?;
        self.success(&format!("{} deleted successfully", kind.label()));
        Ok(())
    }

    /// Replace the current credential of `kind`: delete it, then create.
    ///
    /// Not atomic. If the create fails after the delete went through, no
    /// credential of that kind remains; the error is surfaced and nothing is
    /// retried.
    pub async fn replace_credential(
        &self,
        kind: CredentialKind,
        existing: Option<&Credential>,
        value: &str,
    ) -> Result<Credential> {
        if value.trim().is_empty() {
            return Err(self.reject(empty_credential_message(kind)));
        }

        if let Some(existing) = existing {
            self.delete_credential_quietly(kind, &existing.id).await?;
        }

        match self.create_credential(kind, value).await {
            Ok(created) => {
                self.success(&format!("{} updated successfully", kind.label()));
                Ok(created)
            }
            Err(e) => {
                if existing.is_some() {
                    warn!(
                        %kind,
                        "Previous credential was deleted but the replacement could not be created: {}",
                        e
                    );
                }
                Err(e)
            }
        }
    }

    async fn create_credential(&self, kind: CredentialKind, value: &str) -> Result<Credential> {
        self.run(
            "set_credential",
            &[kind.query_root()],
            self.repos.credentials.create(kind, value.trim()),
        )
        .await
    }

    async fn delete_credential_quietly(&self, kind: CredentialKind, id: &str) -> Result<()> {
        self.run(
            "delete_credential",
            &[kind.query_root()],
            self.repos.credentials.delete(kind, id),
        )
        .await
    }

    pub async fn delete_account(&self) -> Result<()> {
        self.run("delete_account", &[], self.repos.users.delete_account())
            .await?;
        self.success("Account deleted successfully");
        Ok(())
    }
}

fn empty_credential_message(kind: CredentialKind) -> &'static str {
    match kind {
        CredentialKind::ApiKey => "Please enter an API key",
        CredentialKind::WebhookSecret => "Please enter a webhook secret",
    }
}
