//! Per-provider attempt metrics.
//!
//! Counters are plain atomics and latencies go into a fixed-size lock-free ring, so
//! [`MetricsCollector::record`] never waits on a reader and a snapshot never blocks a writer.
//! Snapshots are eventually consistent across counters. Routing never reads these numbers.

use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::types::{AttemptOutcome, AttemptRecord, ProviderId};

pub const DEFAULT_LATENCY_WINDOW: usize = 256;

const EMPTY_SLOT: u64 = u64::MAX;

/// Last `N` invoked-attempt latencies in nanoseconds.
#[derive(Debug)]
struct LatencyRing {
    slots: Box<[AtomicU64]>,
    cursor: AtomicUsize,
}

impl LatencyRing {
    fn new(window: usize) -> Self {
        let slots = (0..window.max(1)).map(|_| AtomicU64::new(EMPTY_SLOT)).collect();
        Self {
            slots,
            cursor: AtomicUsize::new(0),
        }
    }

    fn push(&self, nanos: u64) {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        self.slots[idx].store(nanos.min(EMPTY_SLOT - 1), Ordering::Relaxed);
    }

    fn sorted(&self) -> Vec<u64> {
        let mut values: Vec<u64> = self
            .slots
            .iter()
            .map(|s| s.load(Ordering::Relaxed))
            .filter(|v| *v != EMPTY_SLOT)
            .collect();
        values.sort_unstable();
        values
    }
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[u64], p: f64) -> Option<u64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}

#[derive(Debug)]
struct ProviderMetrics {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    skipped_not_configured: AtomicU64,
    skipped_circuit_open: AtomicU64,
    latencies: LatencyRing,
}

impl ProviderMetrics {
    fn new(window: usize) -> Self {
        Self {
            attempts: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            skipped_not_configured: AtomicU64::new(0),
            skipped_circuit_open: AtomicU64::new(0),
            latencies: LatencyRing::new(window),
        }
    }

    fn snapshot(&self, provider: &ProviderId) -> ProviderMetricsSnapshot {
        let attempts = self.attempts.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let latencies = self.latencies.sorted();
        let ms = |v: u64| v as f64 / 1_000_000.0;
        ProviderMetricsSnapshot {
            provider: provider.clone(),
            attempts,
            successes,
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            skipped_not_configured: self.skipped_not_configured.load(Ordering::Relaxed),
            skipped_circuit_open: self.skipped_circuit_open.load(Ordering::Relaxed),
            success_rate: (attempts > 0).then(|| successes as f64 / attempts as f64),
            p50_ms: percentile(&latencies, 0.50).map(ms),
            p95_ms: percentile(&latencies, 0.95).map(ms),
        }
    }
}

/// Point-in-time counters for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderMetricsSnapshot {
    pub provider: ProviderId,
    /// Invoked attempts; skips are counted separately.
    pub attempts: u64,
    pub successes: u64,
    /// Non-timeout failures.
    pub failures: u64,
    pub timeouts: u64,
    pub skipped_not_configured: u64,
    pub skipped_circuit_open: u64,
    pub success_rate: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Sorted by provider id.
    pub providers: Vec<ProviderMetricsSnapshot>,
}

impl MetricsSnapshot {
    pub fn get(&self, provider: &str) -> Option<&ProviderMetricsSnapshot> {
        self.providers.iter().find(|p| p.provider == provider)
    }

    pub fn total_attempts(&self) -> u64 {
        self.providers.iter().map(|p| p.attempts).sum()
    }
}

#[derive(Debug)]
pub struct MetricsCollector {
    providers: ArcSwap<HashMap<ProviderId, Arc<ProviderMetrics>>>,
    window: usize,
    // taken only when a provider is seen for the first time
    insert: Mutex<()>,
}

impl MetricsCollector {
    pub fn new(latency_window: usize) -> Self {
        Self {
            providers: ArcSwap::from_pointee(HashMap::new()),
            window: latency_window.max(1),
            insert: Mutex::new(()),
        }
    }

    pub fn latency_window(&self) -> usize {
        self.window
    }

    fn slot(&self, provider: &ProviderId) -> Arc<ProviderMetrics> {
        if let Some(m) = self.providers.load().get(provider) {
            return Arc::clone(m);
        }
        let _guard = self.insert.lock().unwrap_or_else(|p| p.into_inner());
        let current = self.providers.load();
        if let Some(m) = current.get(provider) {
            return Arc::clone(m);
        }
        let metrics = Arc::new(ProviderMetrics::new(self.window));
        let mut next = HashMap::clone(&current);
        next.insert(provider.clone(), Arc::clone(&metrics));
        self.providers.store(Arc::new(next));
        metrics
    }

    pub fn record(&self, record: &AttemptRecord) {
        let m = self.slot(&record.provider);
        match record.outcome {
            AttemptOutcome::SkippedNotConfigured => {
                m.skipped_not_configured.fetch_add(1, Ordering::Relaxed);
                return;
            }
            AttemptOutcome::SkippedCircuitOpen => {
                m.skipped_circuit_open.fetch_add(1, Ordering::Relaxed);
                return;
            }
            AttemptOutcome::Success => {
                m.successes.fetch_add(1, Ordering::Relaxed);
            }
            AttemptOutcome::Failure => {
                m.failures.fetch_add(1, Ordering::Relaxed);
            }
            AttemptOutcome::Timeout => {
                m.timeouts.fetch_add(1, Ordering::Relaxed);
            }
        }
        m.attempts.fetch_add(1, Ordering::Relaxed);
        m.latencies
            .push(record.latency.as_nanos().min(u64::MAX as u128) as u64);
    }

    pub fn provider_snapshot(&self, provider: &ProviderId) -> Option<ProviderMetricsSnapshot> {
        self.providers
            .load()
            .get(provider)
            .map(|m| m.snapshot(provider))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let map = self.providers.load();
        let mut providers: Vec<ProviderMetricsSnapshot> =
            map.iter().map(|(id, m)| m.snapshot(id)).collect();
        providers.sort_by(|a, b| a.provider.cmp(&b.provider));
        MetricsSnapshot { providers }
    }

    /// Drop every counter.
    pub fn reset(&self) {
        let _guard = self.insert.lock().unwrap_or_else(|p| p.into_inner());
        self.providers.store(Arc::new(HashMap::new()));
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}
