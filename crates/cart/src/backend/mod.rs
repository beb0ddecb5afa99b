//! HTTP client for the storefront cart backend.
//!
//! # Architecture
//!
//! - JSON over HTTP with `reqwest`, bearer-token authentication
//! - The backend is the source of truth for authenticated carts
//! - One client implements both [`CartGateway`](crate::gateway::CartGateway)
//!   and [`Catalog`](crate::catalog::Catalog)
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list lines | `GET cart/lines` |
//! | add line | `POST cart/lines` |
//! | remove line | `DELETE cart/lines/{id}` |
//! | change quantity | `PATCH cart/lines/{id}/quantity` |
//! | change variant | `PATCH cart/lines/{id}/variant` |
//! | get product | `GET products/{id}` |

mod cart;
mod conversions;
mod products;
pub mod types;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::{BackendConfig, bearer};

/// Maximum number of response body characters kept in errors and logs.
const BODY_EXCERPT_CHARS: usize = 500;

/// Errors that can occur when talking to the cart backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// Backend returned a line or product the cart cannot use.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The configured base URL cannot carry path segments.
    #[error("Base URL cannot be used for API paths")]
    InvalidBaseUrl,
}

/// Client for the cart backend.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_token: SecretString,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
                api_token: config.api_token.clone(),
            }),
        })
    }

    /// Build an endpoint URL from path segments.
    ///
    /// Segments are percent-encoded, so opaque IDs containing `/` stay in
    /// one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start an authenticated request.
    fn request(&self, method: Method, segments: &[&str]) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        Ok(self
            .inner
            .client
            .request(method, url)
            .bearer_auth(bearer(&self.inner.api_token)))
    }

    /// Send a request and return the raw body of a successful response.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;
        let excerpt = body.chars().take(BODY_EXCERPT_CHARS).collect::<String>();

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(excerpt));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %excerpt,
                "Cart backend returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        Ok(body)
    }

    /// Send a request and decode the JSON response.
    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(BODY_EXCERPT_CHARS).collect::<String>(),
                "Failed to parse cart backend response"
            );
            ApiError::Parse(e)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(&BackendConfig {
            base_url: Url::parse(base).unwrap(),
            api_token: SecretString::from("token"),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = client("https://api.shop.test/v1/");
        let url = client.endpoint(&["cart", "lines"]).unwrap();
        assert_eq!(url.as_str(), "https://api.shop.test/v1/cart/lines");
    }

    #[test]
    fn test_endpoint_encodes_opaque_ids() {
        let client = client("https://api.shop.test/");
        let url = client
            .endpoint(&["cart", "lines", "gid://cart/Line/7"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.shop.test/cart/lines/gid:%2F%2Fcart%2FLine%2F7"
        );
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::NotFound("line-1".to_string());
        assert_eq!(err.to_string(), "Not found: line-1");

        let err = ApiError::RateLimited(30);
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");

        let err = ApiError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned 502: bad gateway");
    }
}
