//! Anthropic Messages API adapter.
//!
//! Differences from the OpenAI shape that matter here:
//! - the system prompt is a top-level `system` parameter;
//! - content is a list of typed blocks;
//! - `max_tokens` is required.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{FailureReason, ProviderAdapter};
use crate::transport::HttpTransport;
use crate::types::{ProviderId, ProviderRequest, ProviderResponse};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug)]
pub struct AnthropicAdapter {
    id: ProviderId,
    transport: Arc<HttpTransport>,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl AnthropicAdapter {
    pub fn new(
        transport: Arc<HttpTransport>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            id: ProviderId::from("anthropic"),
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    fn build_body(&self, request: &ProviderRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [{ "type": "text", "text": request.prompt() }],
            }],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        if !request.system_prompt.is_empty() {
            body["system"] = Value::String(request.system_prompt.clone());
        }
        body
    }

    /// Concatenate every `text` block of the response.
    fn extract_text(json: &Value) -> Option<String> {
        let blocks = json.get("content")?.as_array()?;
        let text: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn identifier(&self) -> &ProviderId {
        &self.id
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn invoke(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, FailureReason> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| FailureReason::not_configured("ANTHROPIC_API_KEY not set"))?;

        let url = format!("{}/v1/messages", self.base_url);
        let headers = [
            ("x-api-key", api_key.clone()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ];
        let json = self
            .transport
            .post_json(&url, &headers, &self.build_body(request), timeout)
            .await?;

        let text = Self::extract_text(&json)
            .ok_or_else(|| FailureReason::transport("anthropic response had no text content"))?;
        Ok(ProviderResponse::new(text).with_model(self.model.clone()))
    }
}
