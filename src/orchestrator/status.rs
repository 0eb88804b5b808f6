use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::Orchestrator;
use crate::metrics::ProviderMetricsSnapshot;
use crate::provider::{CapabilityScores, FailureReason};
use crate::registry::Usability;
use crate::resilience::HealthSnapshot;
use crate::telemetry::AttemptEvent;
use crate::types::{AttemptOutcome, AttemptRecord, ProviderId, ProviderRequest, TaskCategory};

pub const DEFAULT_BENCHMARK_PROMPT: &str = "こんにちは";

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub provider: ProviderId,
    pub configured: bool,
    pub usability: Usability,
    pub health: HealthSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ProviderMetricsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilityScores>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub fallback: ProviderId,
    pub attempt_timeout_ms: u64,
    pub providers: Vec<ProviderStatus>,
    pub routes: BTreeMap<TaskCategory, Vec<ProviderId>>,
}

impl StatusReport {
    pub fn provider(&self, id: &str) -> Option<&ProviderStatus> {
        self.providers.iter().find(|p| p.provider == id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    pub provider: ProviderId,
    pub outcome: &'static str,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_chars: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchmarkResult {
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Success.as_str()
    }
}

impl Orchestrator {
    /// Health, metrics and capability view of every registered provider plus the live routes.
    pub fn status(&self) -> StatusReport {
        let providers = self
            .registry
            .ids()
            .into_iter()
            .filter_map(|id| {
                let entry = self.registry.entry(&id)?;
                Some(ProviderStatus {
                    configured: entry.adapter.is_configured(),
                    usability: self.registry.usability(&id),
                    health: entry.breaker.snapshot(),
                    metrics: self.metrics.provider_snapshot(&id),
                    capabilities: entry.adapter.capabilities(),
                    provider: id,
                })
            })
            .collect();

        let table = self.policy.table();
        StatusReport {
            fallback: table.fallback().clone(),
            attempt_timeout_ms: self.settings.attempt_timeout.as_millis() as u64,
            providers,
            routes: table.iter().map(|(c, ids)| (c, ids.to_vec())).collect(),
        }
    }

    /// Send `prompt` to every registered provider at once, ignoring routing and circuit state.
    ///
    /// Unconfigured providers are reported without being called. Outcomes feed health and
    /// metrics like any other attempt.
    pub async fn benchmark(&self, prompt: Option<&str>) -> Vec<BenchmarkResult> {
        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_BENCHMARK_PROMPT);
        let category = self.classifier.classify(prompt, None);
        let request = ProviderRequest {
            text: prompt.to_string(),
            category,
            context: None,
            system_prompt: self.settings.system_prompt.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        let request_id = format!("benchmark-{}", Uuid::new_v4());
        let timeout = self.settings.attempt_timeout;

        let runs = self.registry.ids().into_iter().filter_map(|id| {
            let adapter = self.registry.get(&id)?;
            let request = &request;
            Some(async move {
                if !adapter.is_configured() {
                    let record =
                        AttemptRecord::skipped(id.clone(), category, AttemptOutcome::SkippedNotConfigured);
                    return (record, None);
                }
                let start = Instant::now();
                let result = tokio::time::timeout(timeout, adapter.invoke(request, timeout))
                    .await
                    .unwrap_or_else(|_| Err(FailureReason::timeout(timeout)));
                let latency = start.elapsed();
                match result {
                    Ok(resp) => (
                        AttemptRecord::success(id.clone(), category, latency),
                        Some(resp.text.chars().count()),
                    ),
                    Err(reason) => (AttemptRecord::failed(id.clone(), category, latency, reason), None),
                }
            })
        });
        let outcomes = join_all(runs).await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (sequence, (record, chars)) in outcomes.into_iter().enumerate() {
            info!(
                provider = %record.provider,
                outcome = record.outcome.as_str(),
                latency_ms = record.latency.as_millis() as u64,
                "benchmark result"
            );
            results.push(BenchmarkResult {
                provider: record.provider.clone(),
                outcome: record.outcome.as_str(),
                latency_ms: record.latency.as_millis() as u64,
                response_chars: chars,
                error: record.failure.as_ref().map(|f| f.to_string()),
            });
            self.registry.record_outcome(&record.provider, &record);
            self.metrics.record(&record);
            let event = AttemptEvent {
                request_id: request_id.clone(),
                sequence: sequence as u32 + 1,
                record,
            };
            if let Err(e) = self.sink.report(event).await {
                warn!(error = %e, "attempt sink rejected benchmark event");
            }
        }
        results
    }
}
