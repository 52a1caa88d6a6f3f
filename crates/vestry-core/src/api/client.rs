//! API client for the hosted content backend.
//!
//! This module provides the `ApiClient` struct for reading and upserting
//! rows of the `site_content` table over the backend's REST interface.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::models::{ContentRecord, SectionId};
use crate::store::ContentStore;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// REST path of the content table, relative to the project URL
const CONTENT_TABLE_PATH: &str = "/rest/v1/site_content";

/// Default HTTP request timeout in seconds.
/// Section reads sit on the page render path, so fail well before a browser would.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Header carrying the project's public API key
const API_KEY_HEADER: &str = "apikey";

/// Upsert on the `section` unique key, skip echoing the row back
const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=minimal";

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    section: &'a str,
    content: &'a str,
    updated_at: DateTime<Utc>,
}

/// Client for the hosted content table.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    anon_key: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client for the project at `project_url`
    pub fn new(project_url: &str, anon_key: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: project_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            anon_key: self.anon_key.clone(),
            token: Some(token),
        }
    }

    fn table_url(&self) -> String {
        format!("{}{}", self.base_url, CONTENT_TABLE_PATH)
    }

    /// Without an access token the anon key doubles as the bearer token
    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let bearer = self.token.as_deref().unwrap_or(&self.anon_key);
        let mut headers = header::HeaderMap::new();
        headers.insert(API_KEY_HEADER, Self::header_value(&self.anon_key)?);
        headers.insert(
            header::AUTHORIZATION,
            Self::header_value(&format!("Bearer {}", bearer))?,
        );
        Ok(headers)
    }

    fn header_value(value: &str) -> Result<header::HeaderValue, ApiError> {
        header::HeaderValue::from_str(value)
            .map_err(|_| ApiError::InvalidResponse("credential is not a valid header value".into()))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let url = self.table_url();
        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .query(query)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse content rows: {}", e)))
    }
}

#[async_trait]
impl ContentStore for ApiClient {
    async fn fetch_section(&self, section: &SectionId) -> Result<ContentRecord, ApiError> {
        let filter = format!("eq.{}", section);
        let rows: Vec<ContentRecord> = self
            .get(&[("select", "*"), ("section", filter.as_str()), ("limit", "1")])
            .await?;

        debug!(section = %section, rows = rows.len(), "Fetched section content");
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(section.to_string()))
    }

    async fn upsert_section(&self, section: &SectionId, content: &str) -> Result<(), ApiError> {
        let row = UpsertRow {
            section: section.as_str(),
            content,
            updated_at: Utc::now(),
        };

        let response = self
            .client
            .post(self.table_url())
            .headers(self.auth_headers()?)
            .header("Prefer", UPSERT_PREFER)
            .query(&[("on_conflict", "section")])
            .json(&[row])
            .send()
            .await?;

        Self::check_response(response).await?;
        debug!(section = %section, "Upserted section content");
        Ok(())
    }

    async fn list_sections(&self) -> Result<Vec<ContentRecord>, ApiError> {
        self.get(&[("select", "*"), ("order", "section.asc")]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ANON: &str = "anon-key";

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&format!("{}/", server.uri()), ANON, DEFAULT_REQUEST_TIMEOUT_SECS).unwrap()
    }

    fn id(s: &str) -> SectionId {
        SectionId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_section_queries_by_section() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENT_TABLE_PATH))
            .and(query_param("section", "eq.contact"))
            .and(query_param("limit", "1"))
            .and(header("apikey", ANON))
            .and(header("authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "1", "section": "contact", "content": "<p>Hi</p>", "updated_at": null}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let record = client_for(&server).fetch_section(&id("contact")).await.unwrap();
        assert_eq!(record.html(), "<p>Hi</p>");
    }

    #[tokio::test]
    async fn test_fetch_section_empty_result_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENT_TABLE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_section(&id("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_fetch_section_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_section(&id("contact")).await.unwrap_err();
        assert!(matches!(err, ApiError::ServerError(ref body) if body == "maintenance"));
    }

    #[tokio::test]
    async fn test_fetch_section_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_section(&id("contact")).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_upsert_sends_row_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONTENT_TABLE_PATH))
            .and(query_param("on_conflict", "section"))
            .and(header("authorization", "Bearer admin-token"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).with_token("admin-token".to_string());
        client
            .upsert_section(&id("contact"), "<p>Updated</p>")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let prefer = requests[0].headers.get("prefer").unwrap().to_str().unwrap();
        assert_eq!(prefer, UPSERT_PREFER);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body[0]["section"], "contact");
        assert_eq!(body[0]["content"], "<p>Updated</p>");
        assert!(body[0]["updated_at"].is_string());
    }

    #[tokio::test]
    async fn test_upsert_rejected_by_row_security() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("new row violates policy"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .upsert_section(&id("contact"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_list_sections_ordered_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONTENT_TABLE_PATH))
            .and(query_param("order", "section.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "1", "section": "about", "content": "a"},
                {"id": "2", "section": "contact", "content": null}
            ])))
            .mount(&server)
            .await;

        let rows = client_for(&server).list_sections().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].html(), "");
    }

    #[tokio::test]
    async fn test_cache_over_http_scenario() {
        use crate::cache::SectionCache;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("section", "eq.contact"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "1", "section": "contact", "content": "<p>Hi</p>"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let cache = SectionCache::new(client_for(&server));
        assert_eq!(cache.read("contact").await, "<p>Hi</p>");
        assert_eq!(cache.read("contact").await, "<p>Hi</p>");
        // MockServer verifies the single fetch on drop
    }
}
