//! 遥测模块：尝试记录的可选观察出口。
//!
//! Attempt telemetry.
//!
//! Every candidate the executor passes over or invokes produces an [`AttemptEvent`]. The
//! built-in [`MetricsCollector`](crate::metrics::MetricsCollector) always sees them; hosts
//! that want the raw stream (audit logs, dashboards, tests) attach an [`AttemptSink`].
//! A sink error is logged and otherwise ignored: telemetry never fails a request.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`AttemptSink`] | Trait for attempt destinations |
//! | [`NoopAttemptSink`] | Default sink (no collection) |
//! | [`InMemoryAttemptSink`] | Bounded in-memory sink for tests |
//! | [`TracingAttemptSink`] | Emits one `tracing` event per attempt |
//! | [`CompositeAttemptSink`] | Fan-out to several sinks |

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::types::{AttemptOutcome, AttemptRecord};
use crate::Result;

/// One attempt, tagged with the request it belongs to.
#[derive(Debug, Clone)]
pub struct AttemptEvent {
    pub request_id: String,
    /// 1-based position among the request's attempt records.
    pub sequence: u32,
    pub record: AttemptRecord,
}

#[async_trait]
pub trait AttemptSink: Send + Sync {
    async fn report(&self, event: AttemptEvent) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub struct NoopAttemptSink;

#[async_trait]
impl AttemptSink for NoopAttemptSink {
    async fn report(&self, _: AttemptEvent) -> Result<()> {
        Ok(())
    }
}

pub fn noop_sink() -> Arc<dyn AttemptSink> {
    Arc::new(NoopAttemptSink)
}

/// Keeps the most recent `max_events` events.
pub struct InMemoryAttemptSink {
    events: RwLock<VecDeque<AttemptEvent>>,
    max_events: usize,
}

impl InMemoryAttemptSink {
    pub fn new(max: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            max_events: max.max(1),
        }
    }

    pub fn events(&self) -> Vec<AttemptEvent> {
        self.events
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn events_for_request(&self, request_id: &str) -> Vec<AttemptEvent> {
        self.events
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.write().unwrap_or_else(|p| p.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryAttemptSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl AttemptSink for InMemoryAttemptSink {
    async fn report(&self, event: AttemptEvent) -> Result<()> {
        let mut events = self.events.write().unwrap_or_else(|p| p.into_inner());
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
        Ok(())
    }
}

/// Logs each attempt under the `attempts` target.
#[derive(Debug, Default)]
pub struct TracingAttemptSink;

#[async_trait]
impl AttemptSink for TracingAttemptSink {
    async fn report(&self, event: AttemptEvent) -> Result<()> {
        let r = &event.record;
        info!(
            target: "attempts",
            request_id = %event.request_id,
            sequence = event.sequence,
            provider = %r.provider,
            category = %r.category,
            outcome = r.outcome.as_str(),
            latency_ms = r.latency.as_millis() as u64,
            failure = r.failure.as_ref().map(|f| f.to_string()),
            "attempt"
        );
        Ok(())
    }
}

pub struct CompositeAttemptSink {
    sinks: Vec<Arc<dyn AttemptSink>>,
}

impl CompositeAttemptSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(mut self, sink: Arc<dyn AttemptSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Default for CompositeAttemptSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttemptSink for CompositeAttemptSink {
    async fn report(&self, event: AttemptEvent) -> Result<()> {
        for s in &self.sinks {
            let _ = s.report(event.clone()).await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for s in &self.sinks {
            let _ = s.close().await;
        }
        Ok(())
    }
}

/// Count of events per outcome; handy for assertions.
pub fn count_outcomes(events: &[AttemptEvent], outcome: AttemptOutcome) -> usize {
    events.iter().filter(|e| e.record.outcome == outcome).count()
}
