//! Search service access.
//!
//! Everything the backup/restore pipeline needs from a remote search service
//! goes through [`SearchService`]; [`rest::RestSearchService`] is the HTTP
//! implementation.

pub mod common;
pub mod rest;

use async_trait::async_trait;

use crate::config::{RunConfig, ServiceConfig};
use crate::error::Result;

/// One indexed document: field name to value, in service order.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Operations the pipeline requires from a search service.
///
/// Implement this trait to back up from, or restore to, another kind of
/// service.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Human-readable service identifier for logs.
    fn service_name(&self) -> &str;

    /// Get the raw schema JSON of an index, exactly as the service returns it.
    async fn fetch_schema(&self, index: &str) -> Result<String>;

    /// Delete an index. A missing index yields [`crate::Error::NotFound`].
    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Create an index from a schema document (the name is inside the schema).
    async fn create_index(&self, schema_json: &str) -> Result<()>;

    /// Total number of documents in an index.
    async fn count_documents(&self, index: &str) -> Result<u64>;

    /// Fetch up to `size` documents starting at `offset`.
    ///
    /// The query is unsorted and unfiltered; documents carry no query
    /// annotations.
    async fn fetch_page(&self, index: &str, offset: u64, size: usize) -> Result<Vec<Document>>;

    /// Upload a `{"value": [...]}` envelope to an index as-is.
    async fn upload_documents(&self, index: &str, body: Vec<u8>) -> Result<()>;
}

/// Create a REST service client for one side of the copy.
///
/// # Errors
///
/// Returns an error if the configured endpoint is not a valid URL.
pub fn create_service(config: &ServiceConfig, run: &RunConfig) -> Result<Box<dyn SearchService>> {
    Ok(Box::new(rest::RestSearchService::new(
        config.clone(),
        run.options.api_version.clone(),
    )?))
}
