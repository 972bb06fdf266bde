//! Required-settings check

use resendforward_common::types::CredentialKind;
use resendforward_storage::Credential;

/// Whether both credentials needed for forwarding are present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredSettings {
    pub has_api_key: bool,
    pub has_webhook_secret: bool,
    pub is_configured: bool,
    pub missing: Vec<CredentialKind>,
}

impl RequiredSettings {
    pub fn evaluate(api_key: Option<&Credential>, webhook_secret: Option<&Credential>) -> Self {
        let has_api_key = api_key.is_some();
        let has_webhook_secret = webhook_secret.is_some();

        let mut missing = Vec::new();
        if !has_api_key {
            missing.push(CredentialKind::ApiKey);
        }
        if !has_webhook_secret {
            missing.push(CredentialKind::WebhookSecret);
        }

        Self {
            has_api_key,
            has_webhook_secret,
            is_configured: missing.is_empty(),
            missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_both_required() {
        let key = Credential {
            id: "k1".to_string(),
            user: "u1".to_string(),
            value: "re_x".to_string(),
            created: Utc::now(),
        };

        let partial = RequiredSettings::evaluate(Some(&key), None);
        assert!(!partial.is_configured);
        assert_eq!(partial.missing, vec![CredentialKind::WebhookSecret]);

        let full = RequiredSettings::evaluate(Some(&key), Some(&key));
        assert!(full.is_configured);
        assert!(full.missing.is_empty());
    }
}
