//! OpenAI-style `/chat/completions` adapter. Serves OpenAI itself and compatible vendors
//! such as Groq, distinguished only by identifier, base URL and key.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{FailureReason, ProviderAdapter};
use crate::transport::HttpTransport;
use crate::types::{ProviderId, ProviderRequest, ProviderResponse};

#[derive(Debug)]
pub struct OpenAiCompatAdapter {
    id: ProviderId,
    transport: Arc<HttpTransport>,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatAdapter {
    pub fn new(
        id: impl Into<ProviderId>,
        transport: Arc<HttpTransport>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    fn build_body(&self, request: &ProviderRequest) -> Value {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system_prompt }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt() }));
        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": false,
        })
    }

    fn extract_text(json: &Value) -> Option<String> {
        json.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
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
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            FailureReason::not_configured(format!("no API key configured for {}", self.id))
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let headers = [("authorization", format!("Bearer {}", api_key))];
        let json = self
            .transport
            .post_json(&url, &headers, &self.build_body(request), timeout)
            .await?;

        let text = Self::extract_text(&json).ok_or_else(|| {
            FailureReason::transport(format!("{} response had no message content", self.id))
        })?;
        Ok(ProviderResponse::new(text).with_model(self.model.clone()))
    }
}
