//! HTTP fetcher
//!
//! Builds the HTTP client and performs the actual page fetches. Redirects
//! are followed by the client (default policy, 10 hops); the final URL is
//! reported back so redirects can be detected and links resolved against
//! the page's real location. Transport failure never escapes as an error:
//! it is classified into a [`FetchOutcome`] the worker folds into its
//! result.

use crate::config::WorkerConfig;
use crate::crawler::ExceptionRecord;
use crate::url::UrlSplit;
use crate::{CrawlError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;

const HTML_MIME_TYPE: &str = "text/html";

/// Outcome of one fetch attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    /// A response was obtained (any status, including 4xx/5xx).
    Response {
        status: u16,
        /// URL after redirects.
        final_url: UrlSplit,
        body: String,
        is_html: bool,
    },
    /// The fetch was abandoned after the configured timeout.
    Timeout,
    /// Transport failure (DNS, connect, TLS, decode, ...).
    Failed(ExceptionRecord),
}

/// Builds the HTTP client for one worker.
///
/// Extra headers are validated here; a malformed header name or value is a
/// start-time configuration error.
pub fn build_http_client(config: &WorkerConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.extra_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| CrawlError::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| CrawlError::InvalidHeader(value.clone()))?;
        headers.insert(name, value);
    }

    let client = Client::builder()
        .user_agent(concat!("linksentry/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Fetches one URL and classifies the outcome.
pub async fn fetch_url(client: &Client, config: &WorkerConfig, url: &UrlSplit) -> FetchOutcome {
    let mut request = client.get(url.as_str());
    if let Some(username) = &config.username {
        request = request.basic_auth(username, config.password.as_deref());
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => return FetchOutcome::Timeout,
        Err(e) => return FetchOutcome::Failed(classify_error(&e)),
    };

    let status = response.status().as_u16();
    let final_url = UrlSplit::from(response.url().clone());
    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.contains(HTML_MIME_TYPE));

    // Server-declared charset is honored on request; otherwise bodies are
    // decoded as UTF-8 with replacement.
    let body = if config.prefer_server_encoding {
        response.text().await
    } else {
        response
            .bytes()
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    };

    match body {
        Ok(body) => FetchOutcome::Response {
            status,
            final_url,
            body,
            is_html,
        },
        Err(e) if e.is_timeout() => FetchOutcome::Timeout,
        Err(e) => FetchOutcome::Failed(classify_error(&e)),
    }
}

/// Flattens a transport error into a plain record that can cross the
/// worker boundary.
fn classify_error(error: &reqwest::Error) -> ExceptionRecord {
    let kind = if error.is_connect() {
        "connect"
    } else if error.is_redirect() {
        "redirect"
    } else if error.is_decode() {
        "decode"
    } else if error.is_request() {
        "request"
    } else {
        "transport"
    };

    ExceptionRecord {
        kind: kind.to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let config = WorkerConfig::default();
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_build_http_client_with_headers() {
        let config = WorkerConfig {
            extra_headers: vec![("X-Token".to_string(), "secret".to_string())],
            ..Default::default()
        };
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_build_http_client_rejects_bad_header_name() {
        let config = WorkerConfig {
            extra_headers: vec![("bad name".to_string(), "v".to_string())],
            ..Default::default()
        };
        assert!(matches!(
            build_http_client(&config),
            Err(CrawlError::InvalidHeader(_))
        ));
    }
}
