//! 编排执行器：分类、路由、逐个尝试、兜底
//!
//! The orchestration executor.
//!
//! One request runs `CLASSIFYING → ROUTING → ATTEMPTING(i) → SUCCEEDED | FALLBACK_SUCCEEDED`.
//! There is no failed terminal state: when every candidate fails, is skipped or times out,
//! the [`FallbackResponder`] answers. Callers only ever see a rejected request
//! ([`Error::Validation`](crate::Error::Validation)) or [`Error::Cancelled`](crate::Error::Cancelled).
//!
//! ```no_run
//! use ai_nihongo_router::{OrchestrationRequest, OrchestratorBuilder, TaskCategory};
//!
//! # async fn run() -> ai_nihongo_router::Result<()> {
//! let orchestrator = OrchestratorBuilder::new().build()?;
//! let response = orchestrator
//!     .execute(OrchestrationRequest::new("「猫」はどういう意味？").with_task_hint(TaskCategory::Translation))
//!     .await?;
//! println!("{} answered: {}", response.provider_used, response.response_text);
//! # Ok(())
//! # }
//! ```

mod builder;
mod executor;
mod status;

pub use builder::OrchestratorBuilder;
pub use status::{BenchmarkResult, ProviderStatus, StatusReport, DEFAULT_BENCHMARK_PROMPT};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::classifier::TaskClassifier;
use crate::config::{reload_routes, ConfigWatcher};
use crate::metrics::MetricsCollector;
use crate::provider::FallbackResponder;
use crate::registry::ProviderRegistry;
use crate::routing::RoutingPolicy;
use crate::telemetry::AttemptSink;
use crate::types::{ProviderId, TaskCategory};
use crate::Result;

#[derive(Debug, Clone)]
pub(crate) struct ExecutionSettings {
    pub attempt_timeout: Duration,
    pub probe_timeout: Duration,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Shared, cheaply clonable handles make this safe to use from many tasks at once.
pub struct Orchestrator {
    pub(crate) classifier: TaskClassifier,
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) policy: Arc<RoutingPolicy>,
    pub(crate) metrics: Arc<MetricsCollector>,
    pub(crate) fallback: Arc<dyn FallbackResponder>,
    pub(crate) sink: Arc<dyn AttemptSink>,
    pub(crate) settings: ExecutionSettings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.registry.ids())
            .field("fallback", self.fallback.fallback_id())
            .field("attempt_timeout", &self.settings.attempt_timeout)
            .finish()
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &Arc<RoutingPolicy> {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn classifier(&self) -> &TaskClassifier {
        &self.classifier
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.settings.attempt_timeout
    }

    pub fn classify(&self, text: &str, hint: Option<TaskCategory>) -> TaskCategory {
        self.classifier.classify(text, hint)
    }

    /// Refresh runtime availability of every provider (e.g. Ollama reachability).
    pub async fn probe_providers(&self) -> Vec<(ProviderId, bool)> {
        let results = self.registry.probe_all(self.settings.probe_timeout).await;
        for (id, available) in &results {
            info!(provider = %id, available, "provider probed");
        }
        results
    }

    /// Replace one category's preference list atomically.
    pub fn set_task_preference(&self, category: TaskCategory, ids: Vec<ProviderId>) -> Result<()> {
        for id in &ids {
            if id != self.fallback.fallback_id() && !self.registry.contains(id) {
                warn!(provider = %id, category = %category, "preference names an unregistered provider");
            }
        }
        self.policy.set_task_preference(category, ids)
    }

    /// Re-read routes from a config file; the current table survives any error.
    pub fn reload_routes(&self, path: impl AsRef<Path>) -> Result<()> {
        reload_routes(path.as_ref(), &self.policy)?;
        self.unregistered_route_ids();
        Ok(())
    }

    /// Ids the current table routes to that have no registered adapter. They are skipped at
    /// request time; each one is logged.
    pub fn unregistered_route_ids(&self) -> Vec<ProviderId> {
        let table = self.policy.table();
        let missing: Vec<ProviderId> = table
            .referenced_ids()
            .into_iter()
            .filter(|id| id != table.fallback() && !self.registry.contains(id))
            .collect();
        for id in &missing {
            warn!(provider = %id, "routing table names an unregistered provider");
        }
        missing
    }

    /// Hot-reload routes whenever the file changes. Requires a tokio runtime.
    pub fn watch_config(&self, path: impl AsRef<Path>) -> Result<ConfigWatcher> {
        ConfigWatcher::spawn(path.as_ref(), Arc::clone(&self.policy))
    }

    /// Operator action: clear a provider's failure history.
    pub fn reset_health(&self, id: &ProviderId) -> bool {
        self.registry.reset_health(id)
    }
}
