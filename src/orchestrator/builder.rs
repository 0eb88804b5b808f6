use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{ExecutionSettings, Orchestrator};
use crate::classifier::TaskClassifier;
use crate::config::OrchestratorConfig;
use crate::metrics::MetricsCollector;
use crate::provider::{
    AnthropicAdapter, FallbackResponder, GeminiAdapter, LocalAnalysisAdapter, OllamaAdapter,
    OpenAiCompatAdapter, ProviderAdapter, SimpleResponder, TextAnalyzer, VocabularyAdapter,
    VocabularySearch,
};
use crate::registry::ProviderRegistry;
use crate::routing::RoutingPolicy;
use crate::telemetry::{noop_sink, AttemptSink};
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};

/// Assembles an [`Orchestrator`] from configuration plus host-supplied collaborators.
///
/// Adapters added with [`with_adapter`](Self::with_adapter) take precedence over the
/// built-in adapter of the same id.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    transport: Option<Arc<HttpTransport>>,
    text_analyzer: Option<Arc<dyn TextAnalyzer>>,
    vocabulary: Option<Arc<dyn VocabularySearch>>,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    fallback: Option<Arc<dyn FallbackResponder>>,
    sink: Option<Arc<dyn AttemptSink>>,
    builtin_adapters: bool,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::from_config(OrchestratorConfig::default())
    }

    pub fn from_config(config: OrchestratorConfig) -> Self {
        Self {
            config,
            transport: None,
            text_analyzer: None,
            vocabulary: None,
            adapters: Vec::new(),
            fallback: None,
            sink: None,
            builtin_adapters: true,
        }
    }

    pub fn config_mut(&mut self) -> &mut OrchestratorConfig {
        &mut self.config
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.config.attempt_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_transport(mut self, transport: Arc<HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_text_analyzer(mut self, analyzer: Arc<dyn TextAnalyzer>) -> Self {
        self.text_analyzer = Some(analyzer);
        self
    }

    pub fn with_vocabulary_search(mut self, search: Arc<dyn VocabularySearch>) -> Self {
        self.vocabulary = Some(search);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackResponder>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn AttemptSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Register only the adapters passed to `with_adapter`.
    pub fn without_builtin_adapters(mut self) -> Self {
        self.builtin_adapters = false;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let config = self.config;
        config.validate()?;

        let classifier = TaskClassifier::new(config.classifier.clone())?;
        let table = config.to_routing_table()?;

        let fallback: Arc<dyn FallbackResponder> = match self.fallback {
            Some(f) => f,
            None => Arc::new(SimpleResponder::with_id(config.fallback_provider.as_str())),
        };
        if fallback.fallback_id() != table.fallback() {
            return Err(Error::configuration_with_context(
                format!(
                    "fallback responder '{}' does not match fallback_provider '{}'",
                    fallback.fallback_id(),
                    table.fallback()
                ),
                ErrorContext::new()
                    .with_field_path("fallback_provider")
                    .with_source("orchestrator_builder"),
            ));
        }

        let registry = ProviderRegistry::new(config.breaker_config());
        for adapter in self.adapters {
            registry.register(adapter)?;
        }

        if self.builtin_adapters {
            let transport = match self.transport {
                Some(t) => t,
                None => Arc::new(HttpTransport::new()?),
            };
            for adapter in builtin_adapters(&config, transport, self.text_analyzer, self.vocabulary) {
                if registry.contains(adapter.identifier()) {
                    debug!(provider = %adapter.identifier(), "built-in adapter replaced by host adapter");
                    continue;
                }
                registry.register(adapter)?;
            }
        }

        let orchestrator = Orchestrator {
            classifier,
            registry: Arc::new(registry),
            policy: Arc::new(RoutingPolicy::new(table)),
            metrics: Arc::new(MetricsCollector::new(config.metrics.latency_window)),
            fallback,
            sink: self.sink.unwrap_or_else(noop_sink),
            settings: ExecutionSettings {
                attempt_timeout: config.attempt_timeout(),
                probe_timeout: config.probe_timeout(),
                system_prompt: config.system_prompt.clone(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
        };
        orchestrator.unregistered_route_ids();
        Ok(orchestrator)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_adapters(
    config: &OrchestratorConfig,
    transport: Arc<HttpTransport>,
    analyzer: Option<Arc<dyn TextAnalyzer>>,
    vocabulary: Option<Arc<dyn VocabularySearch>>,
) -> Vec<Arc<dyn ProviderAdapter>> {
    let p = &config.providers;
    let mut out: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

    if p.ollama.enabled {
        out.push(Arc::new(OllamaAdapter::new(
            Arc::clone(&transport),
            &p.ollama.base_url,
            &p.ollama.model,
        )));
    }
    if p.anthropic.enabled {
        out.push(Arc::new(AnthropicAdapter::new(
            Arc::clone(&transport),
            &p.anthropic.base_url,
            &p.anthropic.model,
            p.anthropic.api_key(),
        )));
    }
    for (id, endpoint) in [("openai", &p.openai), ("groq", &p.groq)] {
        if endpoint.enabled {
            out.push(Arc::new(OpenAiCompatAdapter::new(
                id,
                Arc::clone(&transport),
                &endpoint.base_url,
                &endpoint.model,
                endpoint.api_key(),
            )));
        }
    }
    if p.gemini.enabled {
        out.push(Arc::new(GeminiAdapter::new(
            Arc::clone(&transport),
            &p.gemini.base_url,
            &p.gemini.model,
            p.gemini.api_key(),
        )));
    }

    out.push(Arc::new(LocalAnalysisAdapter::new(analyzer)));
    out.push(Arc::new(VocabularyAdapter::new(vocabulary)));
    out.push(Arc::new(SimpleResponder::new()));
    out
}
