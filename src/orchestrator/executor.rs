use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::Orchestrator;
use crate::provider::{FailureReason, ProviderAdapter};
use crate::registry::Usability;
use crate::routing::{RouteCandidate, RoutePlan};
use crate::telemetry::AttemptEvent;
use crate::types::{
    AttemptOutcome, AttemptRecord, OrchestrationRequest, OrchestrationResponse, ProviderId,
    ProviderRequest, ProviderResponse, TaskCategory, TerminalState,
};
use crate::{Error, ErrorContext, Result};

/// Per-request bookkeeping.
struct Run {
    request_id: String,
    category: TaskCategory,
    sequence: u32,
    invoked: u32,
}

enum Step {
    Answered(ProviderResponse),
    Continue,
}

impl Orchestrator {
    /// Run one request to completion. Always answers unless the request itself is invalid.
    pub async fn execute(&self, request: OrchestrationRequest) -> Result<OrchestrationResponse> {
        self.execute_with_cancel(request, &CancellationToken::new()).await
    }

    /// Like [`execute`](Self::execute), but stops with [`Error::Cancelled`] once `cancel`
    /// fires, dropping any in-flight adapter call.
    pub async fn execute_with_cancel(
        &self,
        request: OrchestrationRequest,
        cancel: &CancellationToken,
    ) -> Result<OrchestrationResponse> {
        validate(&request)?;
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("orchestrate", request_id = %request_id);
        self.run(request, request_id, cancel).instrument(span).await
    }

    async fn run(
        &self,
        request: OrchestrationRequest,
        request_id: String,
        cancel: &CancellationToken,
    ) -> Result<OrchestrationResponse> {
        let started = Instant::now();

        let category = self.classifier.classify(&request.text, request.task_hint);
        debug!(category = %category, hinted = request.task_hint.is_some(), "classified");

        let plan = self
            .policy
            .resolve(category, request.provider_override.as_ref(), &self.registry);

        let timeout = request.timeout.unwrap_or(self.settings.attempt_timeout);
        let provider_request = ProviderRequest {
            text: request.text,
            category,
            context: request.context,
            system_prompt: self.settings.system_prompt.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let mut run = Run {
            request_id,
            category,
            sequence: 0,
            invoked: 0,
        };
        let mut visited = vec![false; plan.candidates.len()];

        for (i, candidate) in plan.candidates.iter().enumerate() {
            if visited[i] {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(cancelled(&run));
            }
            if candidate.is_usable() {
                // pass over higher-preference candidates that were deferred as unusable
                self.skip_deferred_before(&plan, candidate.rank, &mut visited, &mut run)
                    .await;
            }
            visited[i] = true;

            // usability may have moved since the plan was resolved
            match self.registry.usability(&candidate.provider) {
                Usability::Usable => {}
                other => {
                    self.record_skip(candidate, other, &mut run).await;
                    continue;
                }
            }
            let Some(adapter) = self.registry.get(&candidate.provider) else {
                continue;
            };

            match self
                .attempt(&candidate.provider, adapter, &provider_request, timeout, cancel, &mut run)
                .await?
            {
                Step::Answered(resp) => {
                    return Ok(self.respond(
                        &run,
                        resp,
                        candidate.provider.clone(),
                        TerminalState::Succeeded,
                        started,
                    ));
                }
                Step::Continue => {}
            }
        }

        if cancel.is_cancelled() {
            return Err(cancelled(&run));
        }
        Ok(self
            .fallback_response(&plan, &provider_request, &mut run, started)
            .await)
    }

    async fn skip_deferred_before(
        &self,
        plan: &RoutePlan,
        rank: usize,
        visited: &mut [bool],
        run: &mut Run,
    ) {
        for (j, other) in plan.candidates.iter().enumerate() {
            if !visited[j] && !other.is_usable() && other.rank < rank {
                visited[j] = true;
                self.record_skip(other, other.usability, run).await;
            }
        }
    }

    async fn record_skip(&self, candidate: &RouteCandidate, usability: Usability, run: &mut Run) {
        let outcome = match usability {
            Usability::NotConfigured => AttemptOutcome::SkippedNotConfigured,
            Usability::CircuitOpen => AttemptOutcome::SkippedCircuitOpen,
            Usability::Unknown => {
                debug!(provider = %candidate.provider, "no adapter registered; skipped");
                return;
            }
            Usability::Usable => return,
        };
        debug!(
            provider = %candidate.provider,
            rank = candidate.rank,
            outcome = outcome.as_str(),
            "candidate skipped"
        );
        let record = AttemptRecord::skipped(candidate.provider.clone(), run.category, outcome);
        self.observe(record, run).await;
    }

    async fn attempt(
        &self,
        provider: &ProviderId,
        adapter: Arc<dyn ProviderAdapter>,
        request: &ProviderRequest,
        timeout: std::time::Duration,
        cancel: &CancellationToken,
        run: &mut Run,
    ) -> Result<Step> {
        let provider = provider.clone();
        run.invoked += 1;
        debug!(provider = %provider, attempt = run.invoked, timeout_ms = timeout.as_millis() as u64, "attempting");

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(run)),
            res = tokio::time::timeout(timeout, adapter.invoke(request, timeout)) => {
                res.unwrap_or_else(|_| Err(FailureReason::timeout(timeout)))
            }
        };
        let latency = start.elapsed();

        match result {
            Ok(resp) => {
                info!(
                    provider = %provider,
                    attempt = run.invoked,
                    latency_ms = latency.as_millis() as u64,
                    "provider succeeded"
                );
                self.observe(AttemptRecord::success(provider, run.category, latency), run)
                    .await;
                Ok(Step::Answered(resp))
            }
            Err(reason) => {
                warn!(
                    provider = %provider,
                    attempt = run.invoked,
                    latency_ms = latency.as_millis() as u64,
                    error = %reason,
                    "provider attempt failed"
                );
                self.observe(AttemptRecord::failed(provider, run.category, latency, reason), run)
                    .await;
                Ok(Step::Continue)
            }
        }
    }

    async fn fallback_response(
        &self,
        plan: &RoutePlan,
        request: &ProviderRequest,
        run: &mut Run,
        started: Instant,
    ) -> OrchestrationResponse {
        let start = Instant::now();
        let resp = self.fallback.respond(request);
        let latency = start.elapsed();
        run.invoked += 1;
        info!(
            provider = %plan.fallback,
            attempt = run.invoked,
            candidates = plan.candidates.len(),
            "all candidates exhausted; fallback responder used"
        );
        self.observe(
            AttemptRecord::success(plan.fallback.clone(), run.category, latency),
            run,
        )
        .await;
        self.respond(
            run,
            resp,
            plan.fallback.clone(),
            TerminalState::FallbackSucceeded,
            started,
        )
    }

    /// Feed one record to health, metrics and the attempt sink.
    async fn observe(&self, record: AttemptRecord, run: &mut Run) {
        run.sequence += 1;
        self.registry.record_outcome(&record.provider, &record);
        self.metrics.record(&record);
        let event = AttemptEvent {
            request_id: run.request_id.clone(),
            sequence: run.sequence,
            record,
        };
        if let Err(e) = self.sink.report(event).await {
            warn!(error = %e, "attempt sink rejected event");
        }
    }

    fn respond(
        &self,
        run: &Run,
        resp: ProviderResponse,
        provider: ProviderId,
        terminal_state: TerminalState,
        started: Instant,
    ) -> OrchestrationResponse {
        OrchestrationResponse {
            request_id: run.request_id.clone(),
            response_text: resp.text,
            provider_used: provider,
            task_category: run.category,
            terminal_state,
            attempts: run.invoked,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn validate(request: &OrchestrationRequest) -> Result<()> {
    if request.text.trim().is_empty() {
        return Err(Error::validation_with_context(
            "request text is empty",
            ErrorContext::new()
                .with_field_path("text")
                .with_source("orchestrator"),
        ));
    }
    if request.timeout.is_some_and(|t| t.is_zero()) {
        return Err(Error::validation_with_context(
            "attempt timeout must be greater than zero",
            ErrorContext::new()
                .with_field_path("timeout")
                .with_source("orchestrator"),
        ));
    }
    Ok(())
}

fn cancelled(run: &Run) -> Error {
    info!(attempts = run.invoked, "request cancelled");
    Error::Cancelled
}
