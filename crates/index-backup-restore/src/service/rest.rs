//! REST client for a hosted search service.
//!
//! Talks to the service's index management and document endpoints:
//! `/indexes/{name}` for schemas, `/indexes/{name}/docs/search` for paged
//! reads and `/indexes/{name}/docs/index` for bulk uploads.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::service::common::{check_response, create_http_client, validate_url};
use crate::service::{Document, SearchService};

/// Prefix of per-result query annotations (`@search.score`, ...).
const ANNOTATION_PREFIX: &str = "@search.";

/// Search request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    search: &'a str,
    search_mode: &'a str,
    skip: u64,
    top: usize,
}

/// Search response body.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    value: Vec<Document>,
}

/// Bulk index response body.
#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(default)]
    value: Vec<IndexResult>,
}

#[derive(Debug, Deserialize)]
struct IndexResult {
    key: Option<String>,
    status: bool,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// HTTP implementation of [`SearchService`].
pub struct RestSearchService {
    config: ServiceConfig,
    base_url: String,
    api_version: String,
    client: Client,
}

impl RestSearchService {
    /// Creates a client for one service.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not http(s).
    pub fn new(config: ServiceConfig, api_version: String) -> Result<Self> {
        let base_url = config.base_url();
        validate_url(&base_url)?;
        Ok(Self {
            config,
            base_url,
            api_version,
            client: create_http_client(),
        })
    }

    /// Builds a URL under the service root.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Makes an authenticated request.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, self.url(path))
            .query(&[("api-version", self.api_version.as_str())]);

        if let Some(api_key) = &self.config.api_key {
            req = req.header("api-key", api_key);
        } else if let Some(token) = &self.config.bearer_token {
            req = req.bearer_auth(token);
        }

        req
    }

    async fn send(&self, req: RequestBuilder, context: &str) -> Result<reqwest::Response> {
        let response = req
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", context, e)))?;
        check_response(response, context).await
    }
}

/// Removes `@search.*` annotations from a search result row.
fn strip_annotations(mut doc: Document) -> Document {
    doc.retain(|key, _| !key.starts_with(ANNOTATION_PREFIX));
    doc
}

/// Parses the body of `/docs/$count` (plain text, possibly BOM-prefixed).
fn parse_count(body: &str) -> Result<u64> {
    body.trim_start_matches('\u{feff}')
        .trim()
        .parse()
        .map_err(|e| Error::Transport(format!("invalid document count '{}': {}", body.trim(), e)))
}

#[async_trait]
impl SearchService for RestSearchService {
    fn service_name(&self) -> &str {
        &self.config.service
    }

    async fn fetch_schema(&self, index: &str) -> Result<String> {
        let context = format!("get schema of index '{}'", index);
        let response = self
            .send(self.request(Method::GET, &format!("/indexes/{}", index)), &context)
            .await?;
        Ok(response.text().await?)
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let context = format!("delete index '{}'", index);
        self.send(
            self.request(Method::DELETE, &format!("/indexes/{}", index)),
            &context,
        )
        .await?;
        Ok(())
    }

    async fn create_index(&self, schema_json: &str) -> Result<()> {
        let req = self
            .request(Method::POST, "/indexes")
            .header("Content-Type", "application/json")
            .body(schema_json.to_string());
        self.send(req, "create index").await?;
        Ok(())
    }

    async fn count_documents(&self, index: &str) -> Result<u64> {
        let context = format!("count documents of index '{}'", index);
        let response = self
            .send(
                self.request(Method::GET, &format!("/indexes/{}/docs/$count", index)),
                &context,
            )
            .await?;
        parse_count(&response.text().await?)
    }

    async fn fetch_page(&self, index: &str, offset: u64, size: usize) -> Result<Vec<Document>> {
        let context = format!("search index '{}' (skip {}, top {})", index, offset, size);
        let body = SearchRequest {
            search: "*",
            search_mode: "all",
            skip: offset,
            top: size,
        };
        let response = self
            .send(
                self.request(Method::POST, &format!("/indexes/{}/docs/search", index))
                    .json(&body),
                &context,
            )
            .await?;

        let page: SearchResponse = response.json().await.map_err(|e| {
            Error::Transport(format!("{}: failed to parse search response: {}", context, e))
        })?;
        debug!("{}: {} documents", context, page.value.len());

        Ok(page.value.into_iter().map(strip_annotations).collect())
    }

    async fn upload_documents(&self, index: &str, body: Vec<u8>) -> Result<()> {
        let context = format!("upload documents to index '{}'", index);
        let req = self
            .request(Method::POST, &format!("/indexes/{}/docs/index", index))
            .header("Content-Type", "application/json")
            .body(body);
        let response = self.send(req, &context).await?;

        // 207 Multi-Status: some documents were rejected.
        if response.status().as_u16() == 207 {
            let result: IndexResponse = response.json().await.unwrap_or(IndexResponse {
                value: Vec::new(),
            });
            let failed: Vec<&IndexResult> = result.value.iter().filter(|r| !r.status).collect();
            let first = failed
                .first()
                .map(|r| {
                    format!(
                        "key '{}': {}",
                        r.key.as_deref().unwrap_or("?"),
                        r.error_message.as_deref().unwrap_or("unknown error")
                    )
                })
                .unwrap_or_default();
            return Err(Error::ValidationFailed(format!(
                "{}: {} document(s) rejected; first {}",
                context,
                failed.len(),
                first
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
