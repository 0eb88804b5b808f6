use crate::provider::FailureReason;
use crate::types::task::{ProviderId, TaskCategory};
use std::time::Duration;

/// How a single candidate ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptOutcome {
    Success,
    Failure,
    Timeout,
    /// Passed over without invoking: the adapter lacks credentials or runtime.
    SkippedNotConfigured,
    /// Passed over without invoking: circuit breaker open.
    SkippedCircuitOpen,
}

impl AttemptOutcome {
    /// Whether the adapter was actually called.
    pub fn was_invoked(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::Success | AttemptOutcome::Failure | AttemptOutcome::Timeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Failure => "failure",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::SkippedNotConfigured => "skipped_not_configured",
            AttemptOutcome::SkippedCircuitOpen => "skipped_circuit_open",
        }
    }
}

/// Ephemeral per-candidate record, consumed by the registry and metrics then dropped.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub provider: ProviderId,
    pub category: TaskCategory,
    pub outcome: AttemptOutcome,
    pub latency: Duration,
    pub failure: Option<FailureReason>,
}

impl AttemptRecord {
    pub fn success(provider: ProviderId, category: TaskCategory, latency: Duration) -> Self {
        Self {
            provider,
            category,
            outcome: AttemptOutcome::Success,
            latency,
            failure: None,
        }
    }

    /// Build a failed record; timeouts are classified from the reason.
    pub fn failed(
        provider: ProviderId,
        category: TaskCategory,
        latency: Duration,
        reason: FailureReason,
    ) -> Self {
        let outcome = if reason.is_timeout() {
            AttemptOutcome::Timeout
        } else {
            AttemptOutcome::Failure
        };
        Self {
            provider,
            category,
            outcome,
            latency,
            failure: Some(reason),
        }
    }

    pub fn skipped(provider: ProviderId, category: TaskCategory, outcome: AttemptOutcome) -> Self {
        debug_assert!(!outcome.was_invoked());
        Self {
            provider,
            category,
            outcome,
            latency: Duration::ZERO,
            failure: None,
        }
    }
}
