//! HTTP helpers shared by service clients.

use crate::error::{Error, Result};
use reqwest::Client;
use std::time::Duration;

/// Default HTTP timeout for service requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates a configured HTTP client with timeout.
#[must_use]
pub fn create_http_client() -> Client {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Validates a service base URL.
pub fn validate_url(url: &str) -> Result<()> {
    let has_valid_scheme = ["http://", "https://"].iter().any(|s| url.starts_with(s));

    if !has_valid_scheme {
        return Err(Error::Config(format!(
            "Invalid URL scheme in '{}'. Allowed: http, https",
            url
        )));
    }

    if url.len() < 10 {
        return Err(Error::Config(format!("Invalid URL format: {}", url)));
    }

    Ok(())
}

/// Maps an HTTP error status to the error taxonomy.
///
/// `context` names the operation and resource, e.g. `"create index hotels"`.
pub fn handle_http_error(status_code: u16, body: &str, context: &str) -> Error {
    let detail = format!("{} (HTTP {}): {}", context, status_code, body.trim());
    match status_code {
        401 | 403 => Error::AuthFailure(detail),
        404 => Error::NotFound(detail),
        409 => Error::Conflict(detail),
        400 | 422 => Error::ValidationFailed(detail),
        _ => Error::Transport(detail),
    }
}

/// Turns a non-success response into an error; passes successful ones through.
pub async fn check_response(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(handle_http_error(status.as_u16(), &body, context))
}
