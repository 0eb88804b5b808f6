//! Built-in rule-based responder.
//!
//! Has no external dependency, so it is both a routable provider (`simple`) and the
//! terminal [`FallbackResponder`] of every attempt loop.

use async_trait::async_trait;
use std::time::Duration;

use super::{FailureReason, FallbackResponder, ProviderAdapter};
use crate::types::{ProviderId, ProviderRequest, ProviderResponse};

/// Greeting table checked in order; first phrase found in the prompt wins.
const JAPANESE_PATTERNS: &[(&str, &str)] = &[
    ("こんにちは", "Hello! How can I help you with Japanese?"),
    ("ありがとう", "You're welcome! 😊"),
    ("おはよう", "Good morning!"),
    ("こんばんは", "Good evening!"),
    ("はい", "I understand!"),
    ("いいえ", "I see."),
    ("すみません", "No problem!"),
    ("さようなら", "Goodbye! またね！"),
];

#[derive(Debug, Clone)]
pub struct SimpleResponder {
    id: ProviderId,
}

impl SimpleResponder {
    pub const ID: &'static str = "simple";

    pub fn new() -> Self {
        Self::with_id(Self::ID)
    }

    pub fn with_id(id: impl Into<ProviderId>) -> Self {
        Self { id: id.into() }
    }

    fn reply_for(prompt: &str) -> &'static str {
        for (phrase, reply) in JAPANESE_PATTERNS {
            if prompt.contains(phrase) {
                return reply;
            }
        }

        let lower = prompt.to_lowercase();
        if lower.contains("translate") {
            "I can help with basic translation, but please configure a proper AI model for better results."
        } else if lower.contains("grammar") || lower.contains("explain") {
            "I can provide basic grammar help, but an AI model would give much better explanations."
        } else if lower.contains("analyze") {
            "Text analysis is available through the Japanese processor. For AI insights, please configure an AI model."
        } else {
            "I'm a simple responder. Please configure an AI model (like Ollama) for full functionality."
        }
    }
}

impl Default for SimpleResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackResponder for SimpleResponder {
    fn fallback_id(&self) -> &ProviderId {
        &self.id
    }

    fn respond(&self, request: &ProviderRequest) -> ProviderResponse {
        ProviderResponse::new(Self::reply_for(&request.prompt())).with_model("simple-responder")
    }
}

#[async_trait]
impl ProviderAdapter for SimpleResponder {
    fn identifier(&self) -> &ProviderId {
        &self.id
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn invoke(
        &self,
        request: &ProviderRequest,
        _timeout: Duration,
    ) -> Result<ProviderResponse, FailureReason> {
        Ok(self.respond(request))
    }
}
