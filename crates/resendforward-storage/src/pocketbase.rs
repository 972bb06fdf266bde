//! PocketBase record store
//!
//! Talks to the hosted backend over its REST API.
//! See: https://pocketbase.io/docs/api-records/

use crate::backend::{ListOptions, RecordStore};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use resendforward_common::config::BackendConfig;
use resendforward_common::types::{Collection, RecordId};
use resendforward_common::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// One page of a list response
#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    items: Vec<Value>,
}

/// Error body returned by the backend
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Password auth response
#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    record: AuthRecord,
}

#[derive(Debug, Deserialize)]
struct AuthRecord {
    id: RecordId,
}

/// Authenticated session
#[derive(Debug, Clone)]
struct AuthState {
    token: String,
    user_id: RecordId,
}

/// PocketBase REST client
pub struct PocketBaseStore {
    base_url: Url,
    page_size: u32,
    client: Client,
    auth: RwLock<Option<AuthState>>,
}

impl PocketBaseStore {
    /// Create a new client from configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid backend URL {}: {}", config.url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Backend URL {} cannot be used as a base",
                config.url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            page_size: config.page_size.max(1),
            client,
            auth: RwLock::new(None),
        })
    }

    /// Authenticate with identity/password against an auth collection
    pub async fn auth_with_password(
        &self,
        auth_collection: &str,
        identity: &str,
        password: &str,
    ) -> Result<RecordId> {
        let url = self.url(&["api", "collections", auth_collection, "auth-with-password"]);
        let body = serde_json::json!({
            "identity": identity,
            "password": password,
        });

        let response = self
            .send(self.client.request(Method::POST, url).json(&body))
            .await?;
        let auth: AuthResponse = decode(response).await?;

        info!(user = %auth.record.id, "Authenticated with backend");
        let user_id = auth.record.id.clone();
        *self.auth.write().await = Some(AuthState {
            token: auth.token,
            user_id: auth.record.id,
        });
        Ok(user_id)
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn records_url(&self, collection: Collection) -> Url {
        self.url(&["api", "collections", collection.as_str(), "records"])
    }

    fn record_url(&self, collection: Collection, id: &str) -> Url {
        self.url(&["api", "collections", collection.as_str(), "records", id])
    }

    /// Build a request with the auth header when a session exists
    async fn build_request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(auth) = self.auth.read().await.as_ref() {
            request = request.header("Authorization", auth.token.as_str());
        }
        request
    }

    /// Send a request and map non-success statuses to errors
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorBody = response.json().await.unwrap_or_else(|e| {
            warn!("Failed to read backend error body: {}", e);
            ErrorBody::default()
        });
        debug!(status = status.as_u16(), message = %body.message, "Backend request failed");
        Err(status_error(status, body.message))
    }

    async fn list_page(
        &self,
        collection: Collection,
        options: &ListOptions,
        page: u32,
        per_page: u32,
    ) -> Result<ListPage> {
        let mut query: Vec<(&str, String)> = vec![
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
            ("skipTotal", "1".to_string()),
        ];
        if let Some(filter) = options.filter.to_expression() {
            query.push(("filter", filter));
        }
        if let Some(sort) = &options.sort {
            query.push(("sort", sort.clone()));
        }
        if let Some(expand) = &options.expand {
            query.push(("expand", expand.clone()));
        }

        let request = self
            .build_request(Method::GET, self.records_url(collection))
            .await
            .query(&query);
        decode(self.send(request).await?).await
    }
}

#[async_trait]
impl RecordStore for PocketBaseStore {
    async fn list(&self, collection: Collection, options: &ListOptions) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_page(collection, options, page, self.page_size).await?;
            let count = batch.items.len();
            records.extend(batch.items);
            if count < self.page_size as usize {
                break;
            }
            page += 1;
        }
        debug!(
            collection = %collection,
            count = records.len(),
            pages = page,
            "Fetched full list"
        );
        Ok(records)
    }

    async fn get_one(&self, collection: Collection, id: &str) -> Result<Value> {
        let request = self
            .build_request(Method::GET, self.record_url(collection, id))
            .await;
        decode(self.send(request).await?).await
    }

    async fn get_first(&self, collection: Collection, options: &ListOptions) -> Result<Value> {
        let page = self.list_page(collection, options, 1, 1).await?;
        page.items.into_iter().next().ok_or_else(|| {
            Error::NotFound(format!(
                "No {} record matches {}",
                collection,
                options.filter.to_expression().unwrap_or_default()
            ))
        })
    }

    async fn create(&self, collection: Collection, fields: Value) -> Result<Value> {
        let request = self
            .build_request(Method::POST, self.records_url(collection))
            .await
            .json(&fields);
        decode(self.send(request).await?).await
    }

    async fn update(&self, collection: Collection, id: &str, fields: Value) -> Result<Value> {
        let request = self
            .build_request(Method::PATCH, self.record_url(collection, id))
            .await
            .json(&fields);
        decode(self.send(request).await?).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let request = self
            .build_request(Method::DELETE, self.record_url(collection, id))
            .await;
        self.send(request).await?;
        Ok(())
    }

    async fn current_user(&self) -> Option<RecordId> {
        self.auth.read().await.as_ref().map(|a| a.user_id.clone())
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::Decode(format!("Failed to parse backend response: {}", e)))
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_decode() {
        Error::Decode(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

fn status_error(status: StatusCode, message: String) -> Error {
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        message
    };
    match status {
        StatusCode::BAD_REQUEST => Error::Validation(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        _ => Error::Backend {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer, page_size: u32) -> PocketBaseStore {
        let config = BackendConfig {
            url: server.uri(),
            page_size,
            ..Default::default()
        };
        PocketBaseStore::new(&config).unwrap()
    }

    fn rule_json(id: &str) -> Value {
        json!({
            "id": id,
            "user": "u1aaaaaaaaaaaaa",
            "rule_name": "Support",
            "rule_email": "catch@x.com",
            "forward_to_email": "dest@x.com",
            "send_from_email": "noreply@x.com",
            "enabled": true,
            "created": "2025-03-01 10:00:00.000Z",
            "updated": "2025-03-01 10:00:00.000Z"
        })
    }

    #[test]
    fn test_invalid_base_url() {
        let config = BackendConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            PocketBaseStore::new(&config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_list_sends_filter_and_pages_until_short_page() {
        let server = MockServer::start().await;
        let expression = "status = \"pending\"";

        Mock::given(method("GET"))
            .and(path("/api/collections/forwarding_events/records"))
            .and(query_param("page", "1"))
            .and(query_param("perPage", "2"))
            .and(query_param("filter", expression))
            .and(query_param("sort", "-created"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 1, "perPage": 2, "items": [{"id": "a"}, {"id": "b"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/collections/forwarding_events/records"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 2, "perPage": 2, "items": [{"id": "c"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, 2);
        let options = ListOptions::new()
            .filter(Filter::new().eq("status", Some("pending")))
            .sort("-created");
        let records = store
            .list(Collection::ForwardingEvents, &options)
            .await
            .unwrap();

        let ids: Vec<&str> = records.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_get_first_empty_page_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/collections/resend_api_keys/records"))
            .and(query_param("perPage", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "page": 1, "items": [] })),
            )
            .mount(&server)
            .await;

        let store = store_for(&server, 500);
        let err = store
            .get_first(Collection::ResendApiKeys, &ListOptions::new().sort("-created"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_auth_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/collections/users/auth-with-password"))
            .and(body_json(json!({ "identity": "ops@x.com", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "tok_123",
                "record": { "id": "u1aaaaaaaaaaaaa", "email": "ops@x.com" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/collections/forwarding_rules/records/r1aaaaaaaaaaaaa"))
            .and(header("Authorization", "tok_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rule_json("r1aaaaaaaaaaaaa")))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, 500);
        let user = store
            .auth_with_password("users", "ops@x.com", "pw")
            .await
            .unwrap();
        assert_eq!(user, "u1aaaaaaaaaaaaa");
        assert_eq!(store.current_user().await.as_deref(), Some("u1aaaaaaaaaaaaa"));

        let record = store
            .get_one(Collection::ForwardingRules, "r1aaaaaaaaaaaaa")
            .await
            .unwrap();
        assert_eq!(record["rule_name"], "Support");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/collections/forwarding_rules/records"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "code": 403, "message": "you have reached the maximum number of rules", "data": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/collections/forwarding_rules/records/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 404, "message": "The requested resource wasn't found.", "data": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/collections/forwarding_rules/records/busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = store_for(&server, 500);

        let err = store
            .create(Collection::ForwardingRules, json!({ "rule_name": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(ref m) if m.contains("maximum number of rules")));

        let err = store
            .delete(Collection::ForwardingRules, "gone")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = store
            .update(Collection::ForwardingRules, "busy", json!({ "enabled": false }))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let config = BackendConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let store = PocketBaseStore::new(&config).unwrap();
        let err = store
            .get_one(Collection::ForwardingRules, "r1aaaaaaaaaaaaa")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
