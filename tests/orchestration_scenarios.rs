//! End-to-end routing scenarios with scripted adapters.
//!
//! Every test runs on a paused tokio clock, so adapter delays and attempt timeouts resolve
//! deterministically without real waiting.

use ai_nihongo_router::telemetry::{count_outcomes, AttemptEvent, InMemoryAttemptSink};
use ai_nihongo_router::{
    AttemptOutcome, AttemptSink, BenchmarkResult, CancellationToken, Error, FailureReason, OrchestrationRequest, Orchestrator,
    OrchestratorBuilder, OrchestratorConfig, ProviderAdapter, ProviderId, ProviderRequest,
    ProviderResponse, SimpleResponder, TaskCategory, TerminalState, Usability,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Script {
    Answer(&'static str),
    Fail,
}

#[derive(Debug)]
struct ScriptedAdapter {
    id: ProviderId,
    configured: bool,
    script: Script,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedAdapter {
    fn answering(id: &str, text: &'static str) -> Arc<Self> {
        Self::build(id, true, Script::Answer(text), Duration::ZERO)
    }

    fn failing(id: &str) -> Arc<Self> {
        Self::build(id, true, Script::Fail, Duration::ZERO)
    }

    fn unconfigured(id: &str) -> Arc<Self> {
        Self::build(id, false, Script::Answer("should never be called"), Duration::ZERO)
    }

    fn slow(id: &str, delay: Duration) -> Arc<Self> {
        Self::build(id, true, Script::Answer("too late"), delay)
    }

    fn build(id: &str, configured: bool, script: Script, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::from(id),
            configured,
            script,
            delay,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn identifier(&self) -> &ProviderId {
        &self.id
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn invoke(
        &self,
        _request: &ProviderRequest,
        _timeout: Duration,
    ) -> Result<ProviderResponse, FailureReason> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            Script::Answer(text) => Ok(ProviderResponse::new(*text)),
            Script::Fail => Err(FailureReason::http(500, "internal error")),
        }
    }
}

fn ids(list: &[&str]) -> Vec<ProviderId> {
    list.iter().map(|id| ProviderId::from(*id)).collect()
}

fn config(routes: Vec<(TaskCategory, Vec<&str>)>) -> OrchestratorConfig {
    let mut cfg = OrchestratorConfig::default();
    cfg.routes = routes
        .into_iter()
        .map(|(category, list)| (category, ids(&list)))
        .collect::<BTreeMap<_, _>>();
    cfg.attempt_timeout_ms = 1_000;
    cfg
}

fn orchestrator(
    cfg: OrchestratorConfig,
    adapters: &[Arc<ScriptedAdapter>],
    sink: &Arc<InMemoryAttemptSink>,
) -> Orchestrator {
    let mut builder = OrchestratorBuilder::from_config(cfg)
        .without_builtin_adapters()
        .with_sink(Arc::clone(sink) as Arc<dyn AttemptSink>);
    for adapter in adapters {
        builder = builder.with_adapter(Arc::clone(adapter) as Arc<dyn ProviderAdapter>);
    }
    builder.build().expect("orchestrator builds")
}

#[tokio::test(start_paused = true)]
async fn test_fallback_mid_list_ends_the_route() {
    let ollama = ScriptedAdapter::answering("ollama", "ollama says hi");
    let openai = ScriptedAdapter::answering("openai", "openai says hi");
    let anthropic = ScriptedAdapter::answering("anthropic", "anthropic says hi");
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = orchestrator(
        config(vec![(TaskCategory::Chat, vec!["ollama", "simple", "openai", "anthropic"])]),
        &[ollama.clone(), openai.clone(), anthropic.clone()],
        &sink,
    );

    let table = orch.policy().table();
    assert_eq!(table.preferences(TaskCategory::Chat), ids(&["ollama", "simple"]).as_slice());

    let resp = orch
        .execute(OrchestrationRequest::new("hello there").with_task_hint(TaskCategory::Chat))
        .await
        .unwrap();
    assert_eq!(resp.provider_used, "ollama");
    assert_eq!(resp.response_text, "ollama says hi");
    assert_eq!(resp.terminal_state, TerminalState::Succeeded);
    assert_eq!(resp.attempts, 1);
    assert_eq!(openai.calls() + anthropic.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failure_before_mid_list_fallback_never_reaches_later_providers() {
    let ollama = ScriptedAdapter::failing("ollama");
    let openai = ScriptedAdapter::answering("openai", "openai says hi");
    let anthropic = ScriptedAdapter::answering("anthropic", "anthropic says hi");
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = orchestrator(
        config(vec![(TaskCategory::Chat, vec!["ollama", "simple", "openai", "anthropic"])]),
        &[ollama.clone(), openai.clone(), anthropic.clone()],
        &sink,
    );

    let resp = orch
        .execute(OrchestrationRequest::new("hello there").with_task_hint(TaskCategory::Chat))
        .await
        .unwrap();
    assert_eq!(resp.provider_used, "simple");
    assert_eq!(resp.terminal_state, TerminalState::FallbackSucceeded);
    assert_eq!(resp.attempts, 2);
    assert_eq!(ollama.calls(), 1);
    assert_eq!(openai.calls() + anthropic.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_skip_then_success() {
    let ollama = ScriptedAdapter::slow("ollama", Duration::from_secs(60));
    let openai = ScriptedAdapter::unconfigured("openai");
    let anthropic = ScriptedAdapter::answering("anthropic", "\"I like cats\"");
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = orchestrator(
        config(vec![(TaskCategory::Translation, vec!["ollama", "openai", "anthropic", "simple"])]),
        &[ollama.clone(), openai.clone(), anthropic.clone()],
        &sink,
    );

    let resp = orch
        .execute(OrchestrationRequest::new("Translate 猫が好きです to English"))
        .await
        .unwrap();

    assert_eq!(resp.task_category, TaskCategory::Translation);
    assert_eq!(resp.provider_used, "anthropic");
    assert_eq!(resp.terminal_state, TerminalState::Succeeded);
    assert_eq!(resp.attempts, 2);
    assert_eq!(openai.calls(), 0);

    let events = sink.events_for_request(&resp.request_id);
    let outcomes: Vec<(&str, AttemptOutcome)> = events
        .iter()
        .map(|e| (e.record.provider.as_str(), e.record.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("ollama", AttemptOutcome::Timeout),
            ("openai", AttemptOutcome::SkippedNotConfigured),
            ("anthropic", AttemptOutcome::Success),
        ]
    );
    assert_eq!(
        events.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let metrics = orch.metrics().snapshot();
    assert_eq!(metrics.get("ollama").unwrap().timeouts, 1);
    assert_eq!(metrics.get("openai").unwrap().skipped_not_configured, 1);
    assert_eq!(metrics.get("openai").unwrap().attempts, 0);
    assert_eq!(metrics.get("anthropic").unwrap().successes, 1);
    assert_eq!(metrics.total_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_every_provider_fails_and_fallback_answers() {
    let adapters = [
        ScriptedAdapter::failing("ollama"),
        ScriptedAdapter::failing("groq"),
        ScriptedAdapter::failing("anthropic"),
    ];
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = orchestrator(
        config(vec![(TaskCategory::Chat, vec!["ollama", "groq", "anthropic", "simple"])]),
        &adapters,
        &sink,
    );

    let resp = orch
        .execute(OrchestrationRequest::new("hello there"))
        .await
        .unwrap();

    assert_eq!(resp.provider_used, SimpleResponder::ID);
    assert_eq!(resp.terminal_state, TerminalState::FallbackSucceeded);
    assert!(resp.used_fallback());
    assert_eq!(resp.attempts, 4);
    assert!(!resp.response_text.trim().is_empty());

    let events = sink.events_for_request(&resp.request_id);
    assert_eq!(count_outcomes(&events, AttemptOutcome::Failure), 3);
    assert_eq!(count_outcomes(&events, AttemptOutcome::Success), 1);
    assert_eq!(events.last().unwrap().record.provider, "simple");
    assert!(adapters.iter().all(|a| a.calls() == 1));
}

#[tokio::test(start_paused = true)]
async fn test_unconfigured_top_choices_are_deferred() {
    let anthropic = ScriptedAdapter::unconfigured("anthropic");
    let gemini = ScriptedAdapter::unconfigured("gemini");
    let ollama = ScriptedAdapter::answering("ollama", "local answer");
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = orchestrator(
        config(vec![(TaskCategory::GrammarAnalysis, vec!["anthropic", "gemini", "ollama", "simple"])]),
        &[anthropic.clone(), gemini.clone(), ollama.clone()],
        &sink,
    );

    let plan = orch
        .policy()
        .resolve(TaskCategory::GrammarAnalysis, None, orch.registry());
    assert_eq!(plan.order()[0], "ollama");

    let resp = orch
        .execute(OrchestrationRequest::new("Explain the particle は").with_task_hint(TaskCategory::GrammarAnalysis))
        .await
        .unwrap();
    assert_eq!(resp.provider_used, "ollama");
    assert_eq!(resp.attempts, 1);

    let events = sink.events_for_request(&resp.request_id);
    assert_eq!(count_outcomes(&events, AttemptOutcome::SkippedNotConfigured), 2);
    assert_eq!(events.last().unwrap().record.provider, "ollama");
}

#[tokio::test(start_paused = true)]
async fn test_provider_override() {
    let ollama = ScriptedAdapter::answering("ollama", "from ollama");
    let anthropic = ScriptedAdapter::answering("anthropic", "from anthropic");
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = orchestrator(
        config(vec![(TaskCategory::Chat, vec!["ollama", "anthropic", "simple"])]),
        &[ollama.clone(), anthropic.clone()],
        &sink,
    );

    let resp = orch
        .execute(OrchestrationRequest::new("hello").with_provider("anthropic"))
        .await
        .unwrap();
    assert_eq!(resp.provider_used, "anthropic");
    assert_eq!(ollama.calls(), 0);

    // the fallback itself as override goes straight to the responder
    let resp = orch
        .execute(OrchestrationRequest::new("hello").with_provider("simple"))
        .await
        .unwrap();
    assert_eq!(resp.provider_used, "simple");
    assert_eq!(resp.terminal_state, TerminalState::FallbackSucceeded);
    assert_eq!(resp.attempts, 1);

    // an override without a registered adapter is passed over, not rejected
    let resp = orch
        .execute(OrchestrationRequest::new("hello").with_provider("vendor-x"))
        .await
        .unwrap();
    assert_eq!(resp.provider_used, "ollama");
    assert_eq!(resp.terminal_state, TerminalState::Succeeded);
    assert_eq!(resp.attempts, 1);
    let events = sink.events_for_request(&resp.request_id);
    assert!(events.iter().all(|e| e.record.provider != "vendor-x"));
}

#[tokio::test(start_paused = true)]
async fn test_circuit_opens_and_recovers_after_cooldown() {
    let flaky = ScriptedAdapter::failing("ollama");
    let backup = ScriptedAdapter::answering("anthropic", "backup answer");
    let sink = Arc::new(InMemoryAttemptSink::default());
    let mut cfg = config(vec![(TaskCategory::Chat, vec!["ollama", "anthropic", "simple"])]);
    cfg.circuit_breaker.failure_threshold = 3;
    cfg.circuit_breaker.cooldown_ms = 30_000;
    let orch = orchestrator(cfg, &[flaky.clone(), backup.clone()], &sink);

    for _ in 0..3 {
        let resp = orch.execute(OrchestrationRequest::new("hello")).await.unwrap();
        assert_eq!(resp.provider_used, "anthropic");
    }
    assert_eq!(flaky.calls(), 3);
    assert_eq!(orch.registry().usability(&"ollama".into()), Usability::CircuitOpen);

    let resp = orch.execute(OrchestrationRequest::new("hello")).await.unwrap();
    assert_eq!(resp.provider_used, "anthropic");
    assert_eq!(resp.attempts, 1);
    assert_eq!(flaky.calls(), 3);
    let events = sink.events_for_request(&resp.request_id);
    assert_eq!(events[0].record.outcome, AttemptOutcome::SkippedCircuitOpen);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(orch.registry().is_usable(&"ollama".into()));
    orch.execute(OrchestrationRequest::new("hello")).await.unwrap();
    assert_eq!(flaky.calls(), 4);

    let health = orch.registry().health(&"ollama".into()).unwrap();
    assert_eq!(health.consecutive_failures, 4);
    assert!(orch.reset_health(&"ollama".into()));
    assert_eq!(orch.registry().health(&"ollama".into()).unwrap().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_in_flight_attempt() {
    let slow = ScriptedAdapter::slow("ollama", Duration::from_secs(20));
    let sink = Arc::new(InMemoryAttemptSink::default());
    let mut cfg = config(vec![(TaskCategory::Chat, vec!["ollama", "simple"])]);
    cfg.attempt_timeout_ms = 30_000;
    let orch = orchestrator(cfg, &[slow.clone()], &sink);

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = orch
        .execute_with_cancel(OrchestrationRequest::new("hello"), &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(slow.calls(), 1);
    // a cancelled attempt is not an outcome
    assert!(sink.is_empty());

    let err = orch
        .execute_with_cancel(OrchestrationRequest::new("hello"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(slow.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout_overrides_default() {
    let slow = ScriptedAdapter::slow("ollama", Duration::from_millis(500));
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = orchestrator(
        config(vec![(TaskCategory::Chat, vec!["ollama", "simple"])]),
        &[slow.clone()],
        &sink,
    );

    let resp = orch.execute(OrchestrationRequest::new("hello")).await.unwrap();
    assert_eq!(resp.provider_used, "ollama");

    let resp = orch
        .execute(OrchestrationRequest::new("hello").with_timeout(Duration::from_millis(100)))
        .await
        .unwrap();
    assert_eq!(resp.provider_used, "simple");
    let events = sink.events_for_request(&resp.request_id);
    assert_eq!(events[0].record.outcome, AttemptOutcome::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_requests_are_rejected() {
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = orchestrator(config(vec![]), &[], &sink);

    let err = orch.execute(OrchestrationRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let err = orch
        .execute(OrchestrationRequest::new("hello").with_timeout(Duration::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(sink.is_empty());

    // no routes at all still answers
    let resp = orch.execute(OrchestrationRequest::new("hello")).await.unwrap();
    assert_eq!(resp.provider_used, "simple");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_share_one_orchestrator() {
    let ollama = ScriptedAdapter::build("ollama", true, Script::Answer("ok"), Duration::from_millis(10));
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = Arc::new(orchestrator(
        config(vec![(TaskCategory::Chat, vec!["ollama", "simple"])]),
        &[ollama.clone()],
        &sink,
    ));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                orch.execute(OrchestrationRequest::new(format!("hello #{i}")))
                    .await
            })
        })
        .collect();
    let mut request_ids = Vec::new();
    for handle in handles {
        let resp = handle.await.unwrap().unwrap();
        assert_eq!(resp.provider_used, "ollama");
        request_ids.push(resp.request_id);
    }
    request_ids.sort();
    request_ids.dedup();
    assert_eq!(request_ids.len(), 16);
    assert_eq!(ollama.calls(), 16);
    assert_eq!(orch.metrics().snapshot().get("ollama").unwrap().successes, 16);
}

#[tokio::test(start_paused = true)]
async fn test_runtime_preference_swap() {
    let ollama = ScriptedAdapter::answering("ollama", "from ollama");
    let gemini = ScriptedAdapter::answering("gemini", "from gemini");
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = orchestrator(
        config(vec![(TaskCategory::CreativeWriting, vec!["ollama", "gemini", "simple"])]),
        &[ollama.clone(), gemini.clone()],
        &sink,
    );

    orch.set_task_preference(TaskCategory::CreativeWriting, ids(&["gemini", "ollama"]))
        .unwrap();
    let resp = orch
        .execute(OrchestrationRequest::new("Write a short story about autumn"))
        .await
        .unwrap();
    assert_eq!(resp.task_category, TaskCategory::CreativeWriting);
    assert_eq!(resp.provider_used, "gemini");
    assert_eq!(ollama.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_status_and_benchmark() {
    let ollama = ScriptedAdapter::answering("ollama", "はい");
    let groq = ScriptedAdapter::failing("groq");
    let anthropic = ScriptedAdapter::unconfigured("anthropic");
    let sink = Arc::new(InMemoryAttemptSink::default());
    let orch = orchestrator(
        config(vec![(TaskCategory::Chat, vec!["ollama", "groq", "anthropic", "simple"])]),
        &[ollama.clone(), groq.clone(), anthropic.clone()],
        &sink,
    );

    let results = orch.benchmark(None).await;
    assert_eq!(results.len(), 3);
    let by_id = |id: &str| -> BenchmarkResult {
        results.iter().find(|r| r.provider == id).cloned().unwrap()
    };
    assert!(by_id("ollama").succeeded());
    assert_eq!(by_id("ollama").response_chars, Some(2));
    assert_eq!(by_id("groq").outcome, "failure");
    assert!(by_id("groq").error.is_some());
    assert_eq!(by_id("anthropic").outcome, "skipped_not_configured");
    assert_eq!(anthropic.calls(), 0);

    let status = orch.status();
    assert_eq!(status.fallback, "simple");
    assert_eq!(status.attempt_timeout_ms, 1_000);
    assert_eq!(status.providers.len(), 3);
    let anthropic_status = status.provider("anthropic").unwrap();
    assert!(!anthropic_status.configured);
    assert_eq!(anthropic_status.usability, Usability::NotConfigured);
    assert_eq!(status.provider("groq").unwrap().health.consecutive_failures, 1);
    assert_eq!(
        status.provider("ollama").unwrap().metrics.as_ref().unwrap().successes,
        1
    );
    assert_eq!(
        status.routes.get(&TaskCategory::Chat).unwrap(),
        &ids(&["ollama", "groq", "anthropic", "simple"])
    );

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["providers"][0]["provider"], "anthropic");
}

struct RejectingSink;

#[async_trait]
impl AttemptSink for RejectingSink {
    async fn report(&self, _event: AttemptEvent) -> ai_nihongo_router::Result<()> {
        Err(Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed")))
    }
}

#[tokio::test(start_paused = true)]
async fn test_rejecting_sink_does_not_disturb_requests_or_benchmark() {
    let ollama = ScriptedAdapter::answering("ollama", "はい");
    let groq = ScriptedAdapter::failing("groq");
    let orch = OrchestratorBuilder::from_config(config(vec![(
        TaskCategory::Chat,
        vec!["groq", "ollama", "simple"],
    )]))
    .without_builtin_adapters()
    .with_sink(Arc::new(RejectingSink) as Arc<dyn AttemptSink>)
    .with_adapter(ollama.clone() as Arc<dyn ProviderAdapter>)
    .with_adapter(groq.clone() as Arc<dyn ProviderAdapter>)
    .build()
    .unwrap();

    let resp = orch
        .execute(OrchestrationRequest::new("hello").with_task_hint(TaskCategory::Chat))
        .await
        .unwrap();
    assert_eq!(resp.provider_used, "ollama");
    assert_eq!(resp.attempts, 2);

    let results = orch.benchmark(None).await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().any(|r| r.provider == "ollama" && r.succeeded()));
    let metrics = orch.metrics().snapshot();
    assert_eq!(metrics.get("groq").unwrap().failures, 2);
}

#[tokio::test]
async fn test_host_adapter_replaces_builtin() {
    let host_ollama = ScriptedAdapter::answering("ollama", "host ollama");
    let orch = OrchestratorBuilder::new()
        .with_adapter(host_ollama.clone() as Arc<dyn ProviderAdapter>)
        .build()
        .unwrap();

    assert!(orch.registry().contains(&"anthropic".into()));
    assert!(orch.registry().contains(&"local".into()));
    let resp = orch
        .execute(OrchestrationRequest::new("hello").with_task_hint(TaskCategory::Chat))
        .await
        .unwrap();
    assert_eq!(resp.provider_used, "ollama");
    assert_eq!(resp.response_text, "host ollama");
    assert_eq!(host_ollama.calls(), 1);
}

#[test]
fn test_mismatched_fallback_is_rejected() {
    let err = OrchestratorBuilder::new()
        .without_builtin_adapters()
        .with_fallback(Arc::new(SimpleResponder::with_id("rules")))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}
