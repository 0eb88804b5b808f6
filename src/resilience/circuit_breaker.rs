use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// The newest sample contributes 1/N of the rolling latency average.
const LATENCY_EWMA_WEIGHT: u128 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit stays open after the last failure.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold (clamped to at least 1)
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the cooldown duration
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    /// Threshold reached but cooldown elapsed: the next attempt is let through.
    HalfOpen,
}

/// Per-provider health record.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    pub consecutive_failures: u32,
    pub last_success: Option<Instant>,
    pub last_failure: Option<Instant>,
    pub rolling_avg_latency: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    pub consecutive_failures: u32,
    pub circuit: CircuitState,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
    pub last_success_ago_ms: Option<u64>,
    pub last_failure_ago_ms: Option<u64>,
    pub rolling_avg_latency_ms: Option<u64>,
}

/// Consecutive-failure circuit breaker carrying the provider's health record.
///
/// - Counts consecutive failures; a success resets the count
/// - Open while `failures >= threshold` and the last failure is younger than the cooldown
/// - Half-open once the cooldown passes; a failure there re-opens immediately
///
/// Time comes from `tokio::time::Instant`, so paused-clock tests can drive the cooldown.
#[derive(Debug)]
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: Mutex<HealthState>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(HealthState::default()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    // every update is a few plain field stores, so a poisoned record is still consistent
    fn lock(&self) -> MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn circuit_state(&self, st: &HealthState, now: Instant) -> CircuitState {
        if st.consecutive_failures < self.cfg.failure_threshold {
            return CircuitState::Closed;
        }
        match st.last_failure {
            Some(at) if now.saturating_duration_since(at) < self.cfg.cooldown => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Whether a request may pass right now.
    pub fn allow(&self) -> bool {
        let st = self.lock();
        self.circuit_state(&st, Instant::now()) != CircuitState::Open
    }

    pub fn state(&self) -> CircuitState {
        let st = self.lock();
        self.circuit_state(&st, Instant::now())
    }

    pub fn on_success(&self, latency: Duration) {
        let mut st = self.lock();
        st.consecutive_failures = 0;
        st.last_success = Some(Instant::now());
        st.rolling_avg_latency = Some(match st.rolling_avg_latency {
            None => latency,
            Some(avg) => {
                let nanos = (avg.as_nanos() * (LATENCY_EWMA_WEIGHT - 1) + latency.as_nanos())
                    / LATENCY_EWMA_WEIGHT;
                Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
            }
        });
    }

    /// Record a failure; returns true when this failure opened the circuit.
    pub fn on_failure(&self) -> bool {
        let mut st = self.lock();
        let now = Instant::now();
        let was_open = self.circuit_state(&st, now) == CircuitState::Open;
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
        st.last_failure = Some(now);
        !was_open && self.circuit_state(&st, now) == CircuitState::Open
    }

    /// Operator reset back to the zero-failure defaults.
    pub fn reset(&self) {
        *self.lock() = HealthState::default();
    }

    pub fn health(&self) -> HealthState {
        self.lock().clone()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let st = self.lock();
        let now = Instant::now();
        let circuit = self.circuit_state(&st, now);
        let open_remaining_ms = match (circuit, st.last_failure) {
            (CircuitState::Open, Some(at)) => Some(
                (at + self.cfg.cooldown)
                    .saturating_duration_since(now)
                    .as_millis() as u64,
            ),
            _ => None,
        };
        let ago = |t: Option<Instant>| t.map(|t| now.saturating_duration_since(t).as_millis() as u64);
        HealthSnapshot {
            failure_threshold: self.cfg.failure_threshold,
            cooldown_ms: self.cfg.cooldown.as_millis() as u64,
            consecutive_failures: st.consecutive_failures,
            circuit,
            open_remaining_ms,
            last_success_ago_ms: ago(st.last_success),
            last_failure_ago_ms: ago(st.last_failure),
            rolling_avg_latency_ms: st.rolling_avg_latency.map(|d| d.as_millis() as u64),
        }
    }
}
