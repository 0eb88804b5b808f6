//! Google Gemini `generateContent` adapter.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{FailureReason, ProviderAdapter};
use crate::transport::HttpTransport;
use crate::types::{ProviderId, ProviderRequest, ProviderResponse};

#[derive(Debug)]
pub struct GeminiAdapter {
    id: ProviderId,
    transport: Arc<HttpTransport>,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiAdapter {
    pub fn new(
        transport: Arc<HttpTransport>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            id: ProviderId::from("gemini"),
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    fn build_body(&self, request: &ProviderRequest) -> Value {
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt() }],
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
            }
        });
        if !request.system_prompt.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": request.system_prompt }] });
        }
        body
    }

    fn extract_text(json: &Value) -> Option<String> {
        let parts = json.pointer("/candidates/0/content/parts")?.as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
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
impl ProviderAdapter for GeminiAdapter {
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
            .ok_or_else(|| FailureReason::not_configured("GEMINI_API_KEY not set"))?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let headers = [("x-goog-api-key", api_key.clone())];
        let json = self
            .transport
            .post_json(&url, &headers, &self.build_body(request), timeout)
            .await?;

        let text = Self::extract_text(&json)
            .ok_or_else(|| FailureReason::transport("gemini response had no candidate text"))?;
        Ok(ProviderResponse::new(text).with_model(self.model.clone()))
    }
}
