use crate::provider::{truncate_message, FailureReason};
use crate::{Error, ErrorContext, Result};
use reqwest::Proxy;
use serde_json::Value;
use std::env;
use std::time::Duration;

const ERROR_BODY_MAX_CHARS: usize = 512;

/// Shared HTTP client for every remote adapter.
///
/// One connection pool is reused across adapters; the per-attempt budget is applied per
/// request rather than on the client, so a single transport serves callers with different
/// timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(
                env::var("NIHONGO_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(16),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("NIHONGO_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )))
            .connect_timeout(Duration::from_secs(10));

        if let Ok(proxy_url) = env::var("NIHONGO_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("failed to build HTTP client: {}", e),
                ErrorContext::new().with_source("http_transport"),
            )
        })?;

        Ok(Self { client })
    }

    /// Wrap an existing client (tests, custom TLS setups).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &Value,
        timeout: Duration,
    ) -> std::result::Result<Value, FailureReason> {
        let mut req = self.client.post(url).timeout(timeout).json(body);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        let resp = req.send().await.map_err(|e| classify_error(e, timeout))?;
        Self::read_json(resp, timeout).await
    }

    pub async fn get_json(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<Value, FailureReason> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(e, timeout))?;
        Self::read_json(resp, timeout).await
    }

    async fn read_json(
        resp: reqwest::Response,
        timeout: Duration,
    ) -> std::result::Result<Value, FailureReason> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FailureReason::http(
                status.as_u16(),
                truncate_message(&body, ERROR_BODY_MAX_CHARS),
            ));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| classify_error(e, timeout))
    }
}

fn classify_error(e: reqwest::Error, timeout: Duration) -> FailureReason {
    if e.is_timeout() {
        FailureReason::timeout(timeout)
    } else if e.is_decode() {
        FailureReason::transport(format!("invalid response body: {}", e))
    } else {
        FailureReason::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Read an API key from the named environment variable, ignoring blank values.
pub fn api_key_from_env(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
