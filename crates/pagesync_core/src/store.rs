//! Confluence REST content store.
//!
//! Blocking client with cursor pagination, basic auth and bounded
//! retry on retryable transport failures. The sync pipeline talks to
//! the `ContentStore` trait so tests can substitute an in-memory
//! store.

use std::env;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_PAGE_LIMIT: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpaceSummary {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub id: String,
    pub title: String,
    pub version: i64,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PutOutcome {
    Updated,
    VersionConflict,
}

pub trait ContentStore {
    fn list_spaces(&mut self) -> Result<Vec<SpaceSummary>>;
    fn list_pages(&mut self, space_key: &str) -> Result<Vec<PageSummary>>;
    fn get_page(&mut self, page_id: &str) -> Result<PageContent>;
    /// `page.version` must be the version the caller intends to write,
    /// i.e. the version read plus one; the server rejects stale writes.
    fn put_page(&mut self, page: &PageContent) -> Result<PutOutcome>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct ConfluenceClientConfig {
    pub base_url: String,
    pub email: String,
    pub token: String,
    pub timeout_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub page_limit: usize,
}

impl ConfluenceClientConfig {
    pub fn from_config(config: &crate::config::SyncConfig) -> Self {
        Self {
            base_url: config.base_url().unwrap_or_default(),
            email: config.email().unwrap_or_default(),
            token: config.token().unwrap_or_default(),
            timeout_ms: env_value_u64("CONFLUENCE_HTTP_TIMEOUT_MS", 30_000),
            max_retries: env_value_usize("CONFLUENCE_HTTP_RETRIES", 2),
            retry_delay_ms: env_value_u64("CONFLUENCE_HTTP_RETRY_DELAY_MS", 500),
            page_limit: config.page_limit(),
        }
    }
}

#[derive(Debug)]
pub struct ConfluenceClient {
    client: Client,
    config: ConfluenceClientConfig,
    request_count: usize,
}

impl ConfluenceClient {
    pub fn new(config: ConfluenceClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            bail!("Confluence base URL is not configured (set CONFLUENCE_BASE_URL)");
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build Confluence HTTP client")?;
        Ok(Self {
            client,
            config,
            request_count: 0,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn get_json(&mut self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.api_url(path);
        for attempt in 0..=self.config.max_retries {
            self.request_count += 1;
            let response = self
                .client
                .get(&url)
                .basic_auth(&self.config.email, Some(&self.config.token))
                .query(query)
                .send();

            match response {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        if attempt < self.config.max_retries && is_retryable_status(status) {
                            self.wait_before_retry(attempt);
                            continue;
                        }
                        bail!("Confluence API request failed with HTTP {status}");
                    }
                    return response
                        .json()
                        .context("failed to decode Confluence API JSON response");
                }
                Err(error) => {
                    if attempt < self.config.max_retries && is_retryable_error(&error) {
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    return Err(error).context("failed to call Confluence API");
                }
            }
        }
        bail!("Confluence API request exhausted retry budget")
    }

    fn wait_before_retry(&self, attempt: usize) {
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let delay = self
            .config
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        sleep(Duration::from_millis(delay));
    }
}

impl ContentStore for ConfluenceClient {
    fn list_spaces(&mut self) -> Result<Vec<SpaceSummary>> {
        let limit = self.config.page_limit.max(1);
        let mut spaces = Vec::new();
        let mut start = 0usize;
        loop {
            let payload = self.get_json(
                "/rest/api/space",
                &[("limit", limit.to_string()), ("start", start.to_string())],
            )?;
            if let Some(results) = payload.get("results").and_then(Value::as_array) {
                for entry in results {
                    let key = entry.get("key").and_then(Value::as_str).unwrap_or_default();
                    let name = entry.get("name").and_then(Value::as_str).unwrap_or_default();
                    if !key.is_empty() {
                        spaces.push(SpaceSummary {
                            key: key.to_string(),
                            name: name.to_string(),
                        });
                    }
                }
            }
            if has_next_link(&payload) {
                start += limit;
            } else {
                break;
            }
        }
        Ok(spaces)
    }

    fn list_pages(&mut self, space_key: &str) -> Result<Vec<PageSummary>> {
        let limit = self.config.page_limit.max(1);
        let mut pages = Vec::new();
        let mut start = 0usize;
        loop {
            let payload = self.get_json(
                "/rest/api/content",
                &[
                    ("spaceKey", space_key.to_string()),
                    ("limit", limit.to_string()),
                    ("start", start.to_string()),
                    ("expand", "ancestors".to_string()),
                ],
            )?;
            if let Some(results) = payload.get("results").and_then(Value::as_array) {
                for entry in results {
                    let Some(id) = id_value(entry.get("id")) else {
                        continue;
                    };
                    let title = entry
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    // The nearest ancestor is the direct parent.
                    let parent_id = entry
                        .get("ancestors")
                        .and_then(Value::as_array)
                        .and_then(|ancestors| ancestors.last())
                        .and_then(|ancestor| id_value(ancestor.get("id")));
                    pages.push(PageSummary {
                        id,
                        title: title.to_string(),
                        parent_id,
                    });
                }
            }
            if has_next_link(&payload) {
                start += limit;
            } else {
                break;
            }
        }
        Ok(pages)
    }

    fn get_page(&mut self, page_id: &str) -> Result<PageContent> {
        let payload = self.get_json(
            &format!("/rest/api/content/{page_id}"),
            &[("expand", "body.storage,version".to_string())],
        )?;
        let id = id_value(payload.get("id")).unwrap_or_else(|| page_id.to_string());
        let title = payload
            .get("title")
            .and_then(Value::as_str)
            .with_context(|| format!("page {page_id} response carries no title"))?
            .to_string();
        let version = payload
            .get("version")
            .and_then(|version| version.get("number"))
            .and_then(Value::as_i64)
            .with_context(|| format!("page {page_id} response carries no version number"))?;
        let body = payload
            .get("body")
            .and_then(|body| body.get("storage"))
            .and_then(|storage| storage.get("value"))
            .and_then(Value::as_str)
            .with_context(|| format!("page {page_id} response carries no storage body"))?
            .to_string();
        Ok(PageContent {
            id,
            title,
            version,
            body,
        })
    }

    fn put_page(&mut self, page: &PageContent) -> Result<PutOutcome> {
        let payload = serde_json::json!({
            "id": page.id,
            "type": "page",
            "title": page.title,
            "version": { "number": page.version },
            "body": {
                "storage": {
                    "value": page.body,
                    "representation": "storage",
                }
            },
        });

        // Writes are not retried: a flaky transport could double-apply.
        self.request_count += 1;
        let url = self.api_url(&format!("/rest/api/content/{}", page.id));
        let response = self
            .client
            .put(&url)
            .basic_auth(&self.config.email, Some(&self.config.token))
            .json(&payload)
            .send()
            .context("failed to call Confluence API")?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Ok(PutOutcome::VersionConflict);
        }
        if !status.is_success() {
            bail!("Confluence page update failed with HTTP {status}");
        }
        Ok(PutOutcome::Updated)
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

fn has_next_link(payload: &Value) -> bool {
    payload
        .get("_links")
        .and_then(|links| links.get("next"))
        .is_some()
}

fn id_value(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if let Some(text) = value.as_str() {
        return Some(text.to_string());
    }
    value.as_i64().map(|number| number.to_string())
}

fn env_value_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_value_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

#[cfg(test)]
mod tests {
    use super::{ConfluenceClient, ConfluenceClientConfig, has_next_link, id_value};
    use serde_json::json;

    fn config(base_url: &str) -> ConfluenceClientConfig {
        ConfluenceClientConfig {
            base_url: base_url.to_string(),
            email: "bot@example.org".to_string(),
            token: "token".to_string(),
            timeout_ms: 1_000,
            max_retries: 0,
            retry_delay_ms: 0,
            page_limit: 25,
        }
    }

    #[test]
    fn client_requires_a_base_url() {
        let error = ConfluenceClient::new(config("")).expect_err("must fail");
        assert!(error.to_string().contains("CONFLUENCE_BASE_URL"));
    }

    #[test]
    fn api_url_joins_without_duplicate_slash() {
        let client = ConfluenceClient::new(config("https://wiki.example.org/")).expect("client");
        assert_eq!(
            client.api_url("/rest/api/space"),
            "https://wiki.example.org/rest/api/space"
        );
    }

    #[test]
    fn has_next_link_reads_links_object() {
        assert!(has_next_link(&json!({"_links": {"next": "/next"}})));
        assert!(!has_next_link(&json!({"_links": {}})));
        assert!(!has_next_link(&json!({})));
    }

    #[test]
    fn id_value_accepts_string_and_number() {
        assert_eq!(id_value(Some(&json!("123"))), Some("123".to_string()));
        assert_eq!(id_value(Some(&json!(123))), Some("123".to_string()));
        assert_eq!(id_value(Some(&json!(null))), None);
        assert_eq!(id_value(None), None);
    }
}
