//! Provider 适配层：通过 trait 将各推理后端统一为相同的能力接口
//!
//! Provider adapter layer. Every backend (the rule-based responder, a local model runtime,
//! remote vendor APIs, and the tokenizer / vocabulary collaborators) is wrapped behind the
//! same [`ProviderAdapter`] trait so the executor never touches vendor specifics.
//!
//! | Adapter | Identifier | Backend |
//! |---------|------------|---------|
//! | [`SimpleResponder`] | `simple` | built-in rules, always configured |
//! | [`OllamaAdapter`] | `ollama` | local Ollama runtime |
//! | [`AnthropicAdapter`] | `anthropic` | Anthropic Messages API |
//! | [`OpenAiCompatAdapter`] | `openai`, `groq` | OpenAI-style chat completions |
//! | [`GeminiAdapter`] | `gemini` | Google `generateContent` |
//! | [`LocalAnalysisAdapter`] | `local` | host-supplied tokenizer |
//! | [`VocabularyAdapter`] | `vocabulary` | host-supplied vector search |

pub mod anthropic;
pub mod gemini;
pub mod local;
pub mod ollama;
pub mod openai_compat;
pub mod simple;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{ProviderId, ProviderRequest, ProviderResponse};

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use local::{
    extract_search_terms, CollaboratorError, LocalAnalysisAdapter, TextAnalyzer, TokenInfo,
    VocabularyAdapter, VocabularyEntry, VocabularySearch,
};
pub use ollama::OllamaAdapter;
pub use openai_compat::OpenAiCompatAdapter;
pub use simple::SimpleResponder;

/// Why a single adapter call did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("provider not configured: {reason}")]
    NotConfigured { reason: String },

    #[error("attempt timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("transport failure{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },
}

/// Coarse failure taxonomy used for logging and diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotConfigured,
    Timeout,
    TransportFailure,
}

impl FailureReason {
    pub fn not_configured(reason: impl Into<String>) -> Self {
        FailureReason::NotConfigured {
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        FailureReason::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        FailureReason::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        FailureReason::Timeout {
            after_ms: after.as_millis() as u64,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FailureReason::NotConfigured { .. } => FailureKind::NotConfigured,
            FailureReason::Timeout { .. } => FailureKind::Timeout,
            FailureReason::Transport { .. } => FailureKind::TransportFailure,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FailureReason::Timeout { .. })
    }
}

/// Relative strengths of a backend (0.0 – 1.0), reported on the status surface only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapabilityScores {
    pub speed: f32,
    pub quality: f32,
    pub japanese: f32,
    pub cost: f32,
}

impl CapabilityScores {
    pub fn new(speed: f32, quality: f32, japanese: f32, cost: f32) -> Self {
        Self {
            speed,
            quality,
            japanese,
            cost,
        }
    }

    /// Built-in scores for the well-known backends.
    pub fn for_provider(id: &str) -> Option<Self> {
        let scores = match id {
            "ollama" => Self::new(0.7, 0.8, 0.7, 1.0),
            "anthropic" => Self::new(0.8, 0.9, 0.85, 0.2),
            "gemini" => Self::new(0.8, 0.9, 0.8, 0.8),
            "groq" => Self::new(0.95, 0.8, 0.7, 0.9),
            "openai" => Self::new(0.8, 0.9, 0.8, 0.3),
            "local" => Self::new(0.9, 0.5, 0.3, 1.0),
            "vocabulary" => Self::new(0.9, 0.5, 0.6, 1.0),
            "simple" => Self::new(1.0, 0.2, 0.4, 1.0),
            _ => return None,
        };
        Some(scores)
    }
}

/// Uniform capability wrapper around one inference backend.
///
/// # Contract
///
/// `invoke` must return within `timeout`: on expiry or transport error it returns a
/// [`FailureReason`], never hangs. The executor additionally enforces the budget with
/// `tokio::time::timeout`, so an adapter that overruns is cut off and its future dropped.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + std::fmt::Debug {
    /// Registry key for this adapter.
    fn identifier(&self) -> &ProviderId;

    /// Credentials / runtime present. Must be cheap and non-blocking.
    fn is_configured(&self) -> bool;

    /// Run one attempt.
    async fn invoke(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, FailureReason>;

    /// Refresh runtime availability (e.g. is the local daemon reachable) and report it.
    ///
    /// Defaults to `is_configured()`; adapters with a reachability check override it.
    async fn probe(&self, _timeout: Duration) -> bool {
        self.is_configured()
    }

    fn capabilities(&self) -> Option<CapabilityScores> {
        CapabilityScores::for_provider(self.identifier().as_str())
    }
}

/// The terminal responder. Infallible by signature: the attempt loop ends here.
pub trait FallbackResponder: Send + Sync + std::fmt::Debug {
    fn fallback_id(&self) -> &ProviderId;

    fn respond(&self, request: &ProviderRequest) -> ProviderResponse;
}

/// Shared tutor persona sent to every model-backed adapter unless configured otherwise.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant specialized in Japanese language learning. \
You help users learn Japanese by providing clear explanations, translations, and cultural context. \
Be encouraging and provide examples when appropriate.";

/// Shorten an upstream error body so log lines stay readable.
pub(crate) fn truncate_message(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push('…');
    out
}
