//! Browser session abstraction.
//!
//! The crawl drives exactly one tab. Every operation takes `&mut self`, so
//! the borrow checker enforces the one-thing-at-a-time contract: nothing
//! can start a navigation while a click or fetch is still in flight.

#[cfg(feature = "browser")]
mod cdp;
mod scripts;

#[cfg(feature = "browser")]
pub use cdp::CdpSession;

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

/// Outcome of a top-level navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// URL after redirects.
    pub url: String,
    /// HTTP status of the main document, when the browser reports one.
    pub status: Option<u16>,
}

impl Navigation {
    pub fn is_error_status(&self) -> bool {
        self.status.is_some_and(|s| s >= 400)
    }
}

/// Bytes fetched through the page's own network stack.
#[derive(Debug, Clone)]
pub struct FetchedBytes {
    pub status: u16,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Cannot reach browser at {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Browser has no open tabs")]
    NoPages,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("No element #{index} matches selector {selector}")]
    ElementNotFound { selector: String, index: usize },

    #[error("HTTP {status} fetching {url}")]
    Http { status: u16, url: String },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    /// Errors worth another attempt: timeouts, dropped connections,
    /// throttling and server-side failures.
    pub fn is_transient(&self) -> bool {
        match self {
            BrowserError::Timeout(_) | BrowserError::Network(_) => true,
            BrowserError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// One authenticated browser tab.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate the tab and wait for the load to finish (bounded by `timeout`).
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Navigation, BrowserError>;

    async fn current_url(&mut self) -> Result<String, BrowserError>;

    /// Serialized DOM of the current document.
    async fn content(&mut self) -> Result<String, BrowserError>;

    /// Evaluate a JavaScript expression; promises are awaited.
    /// `undefined` results come back as `Value::Null`.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Click the `index`-th element (document order) matching `selector`.
    async fn click(&mut self, selector: &str, index: usize) -> Result<(), BrowserError>;

    /// Wait until the page stops loading resources. Never fails; a timeout
    /// just means we carry on with whatever DOM exists.
    async fn wait_for_idle(&mut self, timeout: Duration) {
        let script = scripts::network_idle(timeout);
        match tokio::time::timeout(timeout + Duration::from_secs(1), self.evaluate(&script)).await {
            Ok(Ok(info)) => debug!(
                "Network idle wait: ok={} waited={}ms",
                info.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
                info.get("waitedMs").and_then(|v| v.as_u64()).unwrap_or(0)
            ),
            Ok(Err(e)) => debug!("Network idle wait failed: {}", e),
            Err(_) => debug!("Network idle wait timed out after {:?}", timeout),
        }
    }

    /// Fetch a URL with the session's cookies by running `fetch()` inside
    /// the page. Redirects follow the browser's defaults.
    async fn fetch_bytes(&mut self, url: &str, timeout: Duration) -> Result<FetchedBytes, BrowserError> {
        let script = scripts::fetch_binary(url, timeout);
        let result = tokio::time::timeout(timeout + Duration::from_secs(5), self.evaluate(&script))
            .await
            .map_err(|_| BrowserError::Timeout(timeout))??;
        parse_fetch_result(url, timeout, &result)
    }
}

fn parse_fetch_result(
    url: &str,
    timeout: Duration,
    result: &serde_json::Value,
) -> Result<FetchedBytes, BrowserError> {
    if result.get("timedOut").and_then(|v| v.as_bool()) == Some(true) {
        return Err(BrowserError::Timeout(timeout));
    }

    let status = result.get("status").and_then(|s| s.as_u64()).unwrap_or(0) as u16;

    if let Some(error) = result.get("error").and_then(|e| e.as_str()) {
        return Err(if status > 0 {
            BrowserError::Http {
                status,
                url: url.to_string(),
            }
        } else {
            BrowserError::Network(error.to_string())
        });
    }

    let content_type = result
        .get("contentType")
        .and_then(|c| c.as_str())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data_b64 = result.get("data").and_then(|d| d.as_str()).unwrap_or("");
    let data = base64::engine::general_purpose::STANDARD
        .decode(data_b64)
        .map_err(|e| BrowserError::Script(format!("Failed to decode base64 data: {}", e)))?;

    Ok(FetchedBytes {
        status,
        content_type,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URL: &str = "https://app.example.com/f.pdf";

    #[test]
    fn test_parse_fetch_result_ok() {
        let r = json!({"status": 200, "contentType": "application/pdf", "data": "JVBERg=="});
        let bytes = parse_fetch_result(URL, Duration::from_secs(1), &r).unwrap();
        assert_eq!(bytes.data, b"%PDF");
        assert_eq!(bytes.content_type, "application/pdf");
    }

    #[test]
    fn test_parse_fetch_result_http_error() {
        let r = json!({"status": 503, "error": "HTTP 503: Service Unavailable"});
        let err = parse_fetch_result(URL, Duration::from_secs(1), &r).unwrap_err();
        assert!(matches!(err, BrowserError::Http { status: 503, .. }));
        assert!(err.is_transient());

        let r = json!({"status": 404, "error": "HTTP 404: Not Found"});
        let err = parse_fetch_result(URL, Duration::from_secs(1), &r).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_fetch_result_network_and_timeout() {
        let r = json!({"error": "TypeError: Failed to fetch"});
        let err = parse_fetch_result(URL, Duration::from_secs(1), &r).unwrap_err();
        assert!(matches!(err, BrowserError::Network(_)));

        let r = json!({"timedOut": true, "error": "AbortError"});
        let err = parse_fetch_result(URL, Duration::from_secs(2), &r).unwrap_err();
        assert!(matches!(err, BrowserError::Timeout(_)));
    }

    #[test]
    fn test_navigation_error_status() {
        let nav = |status| Navigation {
            url: "https://x".into(),
            status,
        };
        assert!(nav(Some(404)).is_error_status());
        assert!(!nav(Some(302)).is_error_status());
        assert!(!nav(None).is_error_status());
    }
}
