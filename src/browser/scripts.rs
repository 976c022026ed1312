//! JavaScript shipped into the page.

use std::time::Duration;

/// Fetch a URL from inside the page with the session's cookies and return
/// the body base64-encoded.
pub fn fetch_binary(url: &str, timeout: Duration) -> String {
    // JSON string literal is also a valid JS string literal.
    let url_literal = serde_json::to_string(url).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"
        (async () => {{
            const controller = new AbortController();
            const timer = setTimeout(() => controller.abort(), {timeout_ms});
            try {{
                const response = await fetch({url}, {{
                    method: 'GET',
                    credentials: 'include',
                    redirect: 'follow',
                    signal: controller.signal
                }});

                if (!response.ok) {{
                    return {{
                        error: `HTTP ${{response.status}}: ${{response.statusText}}`,
                        status: response.status
                    }};
                }}

                const contentType = response.headers.get('content-type') || 'application/octet-stream';
                const bytes = new Uint8Array(await response.arrayBuffer());

                let binary = '';
                const chunk = 0x8000;
                for (let i = 0; i < bytes.length; i += chunk) {{
                    binary += String.fromCharCode.apply(null, bytes.subarray(i, i + chunk));
                }}

                return {{
                    status: response.status,
                    contentType: contentType,
                    size: bytes.length,
                    data: btoa(binary)
                }};
            }} catch (e) {{
                return {{ error: e.toString(), timedOut: e.name === 'AbortError' }};
            }} finally {{
                clearTimeout(timer);
            }}
        }})()
        "#,
        url = url_literal,
        timeout_ms = timeout.as_millis()
    )
}

/// Resolve once `readyState` is complete and the resource count has been
/// stable for a second, or when `timeout` elapses.
pub fn network_idle(timeout: Duration) -> String {
    format!(
        r#"(async () => {{
            const timeoutMs = {timeout_ms};
            const idleMs = 1000;
            const interval = 250;
            const start = Date.now();
            let lastCount = 0;
            let stableMs = 0;

            try {{ lastCount = performance.getEntriesByType('resource').length; }} catch (_) {{ lastCount = 0; }}

            while (Date.now() - start < timeoutMs) {{
                await new Promise(r => setTimeout(r, interval));
                let curCount = lastCount;
                try {{ curCount = performance.getEntriesByType('resource').length; }} catch (_) {{ curCount = lastCount; }}

                if (document.readyState === 'complete' && curCount === lastCount) {{
                    stableMs += interval;
                    if (stableMs >= idleMs) {{
                        return {{ ok: true, waitedMs: Date.now() - start }};
                    }}
                }} else {{
                    stableMs = 0;
                }}
                lastCount = curCount;
            }}
            return {{ ok: false, waitedMs: Date.now() - start }};
        }})()"#,
        timeout_ms = timeout.as_millis()
    )
}

/// HTTP status of the current document's navigation, or null when the
/// browser does not expose it.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub const NAVIGATION_STATUS: &str = r#"(() => {
    try {
        const entry = performance.getEntriesByType('navigation')[0];
        return entry && entry.responseStatus ? entry.responseStatus : null;
    } catch (_) {
        return null;
    }
})()"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_script_quotes_url() {
        let script = fetch_binary("https://x.com/a'b\".pdf", Duration::from_secs(3));
        assert!(script.contains(r#"fetch("https://x.com/a'b\".pdf""#));
        assert!(script.contains("credentials: 'include'"));
        assert!(script.contains("3000"));
    }

    #[test]
    fn test_idle_script_timeout() {
        assert!(network_idle(Duration::from_millis(1500)).contains("const timeoutMs = 1500;"));
    }
}
