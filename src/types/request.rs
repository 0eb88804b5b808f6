use crate::types::task::{ProviderId, TaskCategory};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inbound orchestration call.
///
/// Front ends (chat, translate, analyze, explain) build one of these per user turn, passing
/// a task hint matching their own command semantics when they have one.
#[derive(Debug, Clone)]
pub struct OrchestrationRequest {
    pub text: String,
    pub task_hint: Option<TaskCategory>,
    pub provider_override: Option<ProviderId>,
    /// Per-attempt budget. `None` uses the orchestrator's configured default.
    pub timeout: Option<Duration>,
    /// Optional pre-computed context (e.g. tokenizer output) forwarded to adapters.
    pub context: Option<String>,
}

impl OrchestrationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            task_hint: None,
            provider_override: None,
            timeout: None,
            context: None,
        }
    }

    pub fn with_task_hint(mut self, category: TaskCategory) -> Self {
        self.task_hint = Some(category);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<ProviderId>) -> Self {
        self.provider_override = Some(provider.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// What an adapter receives for one attempt.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub text: String,
    pub category: TaskCategory,
    pub context: Option<String>,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl ProviderRequest {
    /// Prompt body with the optional context block prepended.
    pub fn prompt(&self) -> String {
        match &self.context {
            Some(ctx) if !ctx.trim().is_empty() => format!("{}\n\n{}", ctx, self.text),
            _ => self.text.clone(),
        }
    }
}

/// Successful adapter output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
    /// Backend model name when the adapter knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Terminal state reached by the attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Succeeded,
    FallbackSucceeded,
}

/// Result returned to the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResponse {
    pub request_id: String,
    pub response_text: String,
    pub provider_used: ProviderId,
    pub task_category: TaskCategory,
    pub terminal_state: TerminalState,
    /// Number of adapters actually invoked (skips excluded, terminal fallback included).
    pub attempts: u32,
    pub elapsed_ms: u64,
}

impl OrchestrationResponse {
    pub fn used_fallback(&self) -> bool {
        self.terminal_state == TerminalState::FallbackSucceeded
    }
}
