//! `BrowserSession` over the Chrome DevTools Protocol.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::{scripts, BrowserError, BrowserSession, Navigation};

/// Wait after `fetch_targets` for the handler to register attached pages.
const TARGET_SETTLE: Duration = Duration::from_millis(500);

/// Upper bound on asking the handler for the main document's response.
const RESPONSE_WAIT: Duration = Duration::from_secs(2);

/// Main document status: the CDP network response first, then the
/// navigation timing entry. Zero means the layer did not know.
fn document_status(response: Option<i64>, timing: Option<i64>) -> Option<u16> {
    [response, timing]
        .into_iter()
        .flatten()
        .filter(|s| *s > 0)
        .find_map(|s| u16::try_from(s).ok())
}

/// One tab of a browser the user launched with `--remote-debugging-port`.
///
/// Dropping the session closes the websocket only; the browser and its
/// tabs stay open.
pub struct CdpSession {
    _browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl CdpSession {
    /// Attach to the browser behind `endpoint` (e.g. `http://127.0.0.1:9222`)
    /// and pick a tab to drive.
    ///
    /// A tab already on `base_url`'s host is preferred; otherwise the first
    /// tab is navigated to `base_url`.
    pub async fn attach(
        endpoint: &str,
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, BrowserError> {
        let connect_err = |reason: String| BrowserError::Connect {
            endpoint: endpoint.to_string(),
            reason,
        };

        let http_url = endpoint
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(request_timeout)
            .send()
            .await
            .map_err(|e| connect_err(e.to_string()))?
            .json()
            .await
            .map_err(|e| connect_err(format!("bad /json/version response: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| connect_err("no webSocketDebuggerUrl in response".to_string()))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout,
            ..Default::default()
        };

        let (mut browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        browser.fetch_targets().await.map_err(map_cdp)?;
        tokio::time::sleep(TARGET_SETTLE).await;
        let pages = browser.pages().await.map_err(map_cdp)?;
        if pages.is_empty() {
            handler.abort();
            return Err(BrowserError::NoPages);
        }
        debug!("Found {} open tab(s)", pages.len());

        let base_host = Url::parse(base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase));

        let mut on_site = None;
        for page in &pages {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            let host = Url::parse(&url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
            if host.is_some() && host == base_host {
                info!("Using existing tab at {}", url);
                on_site = Some(page.clone());
                break;
            }
        }

        let mut session = match on_site {
            Some(page) => Self {
                _browser: browser,
                page,
                handler,
            },
            None => {
                let page = pages[0].clone();
                info!("No tab on {}, reusing first tab", base_url);
                let mut session = Self {
                    _browser: browser,
                    page,
                    handler,
                };
                session.navigate(base_url, request_timeout).await?;
                session
            }
        };
        session.wait_for_idle(Duration::from_secs(5)).await;

        Ok(session)
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

fn map_cdp(err: CdpError) -> BrowserError {
    match err {
        CdpError::Timeout => BrowserError::Timeout(Duration::ZERO),
        CdpError::Ws(e) => BrowserError::Network(e.to_string()),
        CdpError::Io(e) => BrowserError::Network(e.to_string()),
        other => BrowserError::Protocol(other.to_string()),
    }
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Navigation, BrowserError> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Err(_) => return Err(BrowserError::Timeout(timeout)),
            Ok(Err(CdpError::Timeout)) => return Err(BrowserError::Timeout(timeout)),
            Ok(Err(e @ (CdpError::Ws(_) | CdpError::Io(_)))) => {
                return Err(BrowserError::Network(e.to_string()))
            }
            Ok(Err(e)) => {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(Ok(_)) => {}
        }

        // goto has already waited, so this resolves with the finished request.
        let response_status = match tokio::time::timeout(
            RESPONSE_WAIT,
            self.page.wait_for_navigation_response(),
        )
        .await
        {
            Ok(Ok(Some(request))) => request.response.as_ref().map(|r| r.status),
            _ => None,
        };
        let status = match document_status(response_status, None) {
            Some(status) => Some(status),
            None => {
                let timing = self
                    .evaluate(scripts::NAVIGATION_STATUS)
                    .await
                    .ok()
                    .and_then(|v| v.as_i64());
                document_status(None, timing)
            }
        };
        let final_url = self.current_url().await.unwrap_or_else(|_| url.to_string());

        Ok(Navigation {
            url: final_url,
            status,
        })
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.page.url().await.map_err(map_cdp)?.unwrap_or_default())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(map_cdp)
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let result = self
            .page
            .evaluate(script.to_string())
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        // `undefined` has no JSON value
        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    async fn click(&mut self, selector: &str, index: usize) -> Result<(), BrowserError> {
        let elements = self.page.find_elements(selector).await.map_err(map_cdp)?;
        let element = elements
            .into_iter()
            .nth(index)
            .ok_or_else(|| BrowserError::ElementNotFound {
                selector: selector.to_string(),
                index,
            })?;
        element.click().await.map_err(map_cdp)?;
        Ok(())
    }

    async fn wait_for_idle(&mut self, timeout: Duration) {
        // A click may or may not trigger a full navigation.
        let nav_wait = timeout.min(Duration::from_secs(2));
        if let Ok(Err(e)) = tokio::time::timeout(nav_wait, self.page.wait_for_navigation()).await {
            warn!("Navigation wait failed: {}", e);
        }

        let script = scripts::network_idle(timeout);
        match tokio::time::timeout(timeout + Duration::from_secs(1), self.evaluate(&script)).await {
            Ok(Ok(info)) => debug!(
                "Network idle: ok={}",
                info.get("ok").and_then(|v| v.as_bool()).unwrap_or(false)
            ),
            Ok(Err(e)) => debug!("Network idle wait failed: {}", e),
            Err(_) => debug!("Network idle wait timed out after {:?}", timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_status_prefers_network_response() {
        assert_eq!(document_status(Some(404), Some(200)), Some(404));
        assert_eq!(document_status(None, Some(200)), Some(200));
        assert_eq!(document_status(Some(0), Some(503)), Some(503));
        assert_eq!(document_status(None, Some(0)), None);
        assert_eq!(document_status(None, None), None);
    }
}
