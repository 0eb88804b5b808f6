//! Ollama local runtime adapter (`/api/generate`, non-streaming).

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{FailureReason, ProviderAdapter};
use crate::transport::HttpTransport;
use crate::types::{ProviderId, ProviderRequest, ProviderResponse};

#[derive(Debug)]
pub struct OllamaAdapter {
    id: ProviderId,
    transport: Arc<HttpTransport>,
    base_url: String,
    model: String,
    /// Last known reachability of the daemon. Starts optimistic; `probe` refreshes it.
    available: AtomicBool,
}

impl OllamaAdapter {
    pub fn new(
        transport: Arc<HttpTransport>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: ProviderId::from("ollama"),
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            available: AtomicBool::new(true),
        }
    }

    pub fn with_id(mut self, id: impl Into<ProviderId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(&self, request: &ProviderRequest) -> Value {
        let prompt = format!(
            "{}\n\nUser: {}\n\nAssistant:",
            request.system_prompt,
            request.prompt()
        );
        json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        })
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn identifier(&self) -> &ProviderId {
        &self.id
    }

    fn is_configured(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn invoke(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, FailureReason> {
        let url = format!("{}/api/generate", self.base_url);
        let body = self.build_body(request);
        let json = self.transport.post_json(&url, &[], &body, timeout).await?;

        let text = json
            .get("response")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FailureReason::transport("ollama response missing 'response' field"))?;

        Ok(ProviderResponse::new(text).with_model(self.model.clone()))
    }

    async fn probe(&self, timeout: Duration) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let reachable = self.transport.get_json(&url, timeout).await.is_ok();
        self.available.store(reachable, Ordering::Relaxed);
        debug!(provider = %self.id, reachable, "ollama probe");
        reachable
    }
}
