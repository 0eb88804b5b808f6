//! 提供方注册表：保存适配器及其实时健康状态
//!
//! Provider registry: every configured adapter plus its live health record.
//!
//! The id → entry map is copy-on-write behind an `ArcSwap`, so lookups on the request path
//! never take a lock. Health mutation goes through each entry's own circuit breaker mutex;
//! traffic on one provider never serializes behind another.

use arc_swap::ArcSwap;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use crate::provider::ProviderAdapter;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, HealthSnapshot};
use crate::types::{AttemptOutcome, AttemptRecord, ProviderId};
use crate::{Error, ErrorContext, Result};

/// One registered provider.
#[derive(Debug)]
pub struct ProviderEntry {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub breaker: CircuitBreaker,
}

/// Why a provider can or cannot take traffic right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Usability {
    Usable,
    Unknown,
    NotConfigured,
    CircuitOpen,
}

impl Usability {
    pub fn is_usable(&self) -> bool {
        *self == Usability::Usable
    }
}

pub struct ProviderRegistry {
    entries: ArcSwap<HashMap<ProviderId, Arc<ProviderEntry>>>,
    breaker_config: CircuitBreakerConfig,
    // serializes writers only; readers go through `entries.load()`
    registration: Mutex<()>,
}

impl ProviderRegistry {
    pub fn new(breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
            breaker_config,
            registration: Mutex::new(()),
        }
    }

    pub fn breaker_config(&self) -> &CircuitBreakerConfig {
        &self.breaker_config
    }

    /// Register an adapter under its own identifier.
    pub fn register(&self, adapter: Arc<dyn ProviderAdapter>) -> Result<()> {
        let id = adapter.identifier().clone();
        self.register_as(id, adapter)
    }

    /// Register an adapter under an explicit identifier. Identifiers are unique.
    pub fn register_as(&self, id: impl Into<ProviderId>, adapter: Arc<dyn ProviderAdapter>) -> Result<()> {
        let id = id.into();
        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = self.entries.load();
        if current.contains_key(&id) {
            return Err(Error::configuration_with_context(
                format!("provider '{}' is already registered", id),
                ErrorContext::new()
                    .with_field_path("providers")
                    .with_source("provider_registry"),
            ));
        }

        let mut updated: HashMap<ProviderId, Arc<ProviderEntry>> = HashMap::clone(&current);
        updated.insert(
            id.clone(),
            Arc::new(ProviderEntry {
                adapter,
                breaker: CircuitBreaker::new(self.breaker_config),
            }),
        );
        self.entries.store(Arc::new(updated));
        info!(provider = %id, "registered provider");
        Ok(())
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.entries.load().get(id).map(|e| Arc::clone(&e.adapter))
    }

    pub(crate) fn entry(&self, id: &ProviderId) -> Option<Arc<ProviderEntry>> {
        self.entries.load().get(id).cloned()
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.entries.load().contains_key(id)
    }

    /// Registered identifiers in sorted order.
    pub fn ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self.entries.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn usability(&self, id: &ProviderId) -> Usability {
        match self.entries.load().get(id) {
            None => Usability::Unknown,
            Some(entry) if !entry.adapter.is_configured() => Usability::NotConfigured,
            Some(entry) if !entry.breaker.allow() => Usability::CircuitOpen,
            Some(_) => Usability::Usable,
        }
    }

    pub fn is_usable(&self, id: &ProviderId) -> bool {
        self.usability(id).is_usable()
    }

    /// Single mutation point for health state. Skipped candidates leave health untouched.
    pub fn record_outcome(&self, id: &ProviderId, record: &AttemptRecord) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        match record.outcome {
            AttemptOutcome::Success => entry.breaker.on_success(record.latency),
            AttemptOutcome::Failure | AttemptOutcome::Timeout => {
                if entry.breaker.on_failure() {
                    let cfg = entry.breaker.config();
                    warn!(
                        provider = %id,
                        failure_threshold = cfg.failure_threshold,
                        cooldown_ms = cfg.cooldown.as_millis() as u64,
                        "circuit opened"
                    );
                }
            }
            AttemptOutcome::SkippedNotConfigured | AttemptOutcome::SkippedCircuitOpen => {}
        }
    }

    /// Operator action: clear a provider's health back to defaults.
    pub fn reset_health(&self, id: &ProviderId) -> bool {
        match self.entry(id) {
            Some(entry) => {
                entry.breaker.reset();
                info!(provider = %id, "health reset");
                true
            }
            None => false,
        }
    }

    pub fn health(&self, id: &ProviderId) -> Option<HealthSnapshot> {
        self.entry(id).map(|e| e.breaker.snapshot())
    }

    /// Refresh runtime availability of every adapter concurrently.
    pub async fn probe_all(&self, timeout: Duration) -> Vec<(ProviderId, bool)> {
        let entries = self.entries.load_full();
        let mut ids: Vec<&ProviderId> = entries.keys().collect();
        ids.sort();
        let probes = ids.iter().map(|id| {
            let entry = Arc::clone(&entries[*id]);
            async move { entry.adapter.probe(timeout).await }
        });
        let results = join_all(probes).await;
        ids.into_iter().cloned().zip(results).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
