//! # ai-nihongo-router
//!
//! 日语学习助手的模型编排与任务路由引擎：按任务类别选择推理提供方，逐个尝试，永远有兜底回复。
//!
//! Model orchestration and task routing for a Japanese-learning assistant.
//!
//! ## Overview
//!
//! A request is classified into a [`TaskCategory`], the category is resolved to an ordered
//! list of inference providers, and the providers are attempted in order under a
//! per-attempt timeout. Per-provider health (consecutive failures, cooldown, rolling
//! latency) moves failing providers to the back of the line. When every candidate has
//! failed, a zero-dependency rule-based responder answers, so a well-formed request always
//! gets a reply.
//!
//! ## Core Philosophy
//!
//! - **Always answer**: there is no failed terminal state, only the fallback
//! - **Deterministic routing**: same text, same health, same plan
//! - **Non-blocking observability**: metrics are atomics, routing never reads them
//! - **Swappable tables**: routes are immutable snapshots replaced atomically
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_nihongo_router::{OrchestrationRequest, OrchestratorBuilder, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> ai_nihongo_router::Result<()> {
//!     let config = OrchestratorConfig::load(None)?;
//!     let orchestrator = OrchestratorBuilder::from_config(config).build()?;
//!
//!     let response = orchestrator
//!         .execute(OrchestrationRequest::new("Translate 猫が好きです to English"))
//!         .await?;
//!     println!("[{}] {}", response.provider_used, response.response_text);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`classifier`] | Text → task category rules |
//! | [`provider`] | Adapter trait, failure reasons, built-in adapters |
//! | [`transport`] | Shared HTTP client for remote adapters |
//! | [`resilience`] | Circuit breaker carrying provider health |
//! | [`registry`] | Registered adapters and their live health |
//! | [`routing`] | Preference tables and route plans |
//! | [`orchestrator`] | The attempt loop, status and benchmark |
//! | [`metrics`] | Lock-free per-provider counters and latency percentiles |
//! | [`telemetry`] | Attempt sinks |
//! | [`config`] | File/env configuration and hot reload |
//! | [`types`] | Requests, responses, attempt records |

pub mod classifier;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod routing;
pub mod telemetry;
pub mod transport;
pub mod types;

mod error;

pub use classifier::{ClassifierConfig, TaskClassifier};
pub use config::{ConfigWatcher, OrchestratorConfig};
pub use metrics::{MetricsCollector, MetricsSnapshot, ProviderMetricsSnapshot};
pub use orchestrator::{BenchmarkResult, Orchestrator, OrchestratorBuilder, StatusReport};
pub use provider::{
    FailureKind, FailureReason, FallbackResponder, ProviderAdapter, SimpleResponder,
    TextAnalyzer, VocabularySearch,
};
pub use registry::{ProviderRegistry, Usability};
pub use routing::{RoutePlan, RoutingPolicy, RoutingTable};
pub use telemetry::{AttemptEvent, AttemptSink};
pub use types::{
    AttemptOutcome, AttemptRecord, OrchestrationRequest, OrchestrationResponse, ProviderId,
    ProviderRequest, ProviderResponse, TaskCategory, TerminalState,
};

pub use tokio_util::sync::CancellationToken;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::{Error, ErrorContext};
