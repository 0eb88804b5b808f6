use arc_swap::ArcSwap;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::table::RoutingTable;
use crate::registry::{ProviderRegistry, Usability};
use crate::types::{ProviderId, TaskCategory};
use crate::Result;

/// One non-fallback candidate of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteCandidate {
    pub provider: ProviderId,
    /// Position in preference order (an override is rank 0).
    pub rank: usize,
    /// Usability observed when the plan was resolved.
    pub usability: Usability,
}

impl RouteCandidate {
    pub fn is_usable(&self) -> bool {
        self.usability.is_usable()
    }
}

/// Ordered attempt plan for one request: usable candidates by rank, then the deferred
/// unusable ones by rank, then the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutePlan {
    pub category: TaskCategory,
    pub candidates: Vec<RouteCandidate>,
    pub fallback: ProviderId,
}

impl RoutePlan {
    /// Provider ids in attempt order, fallback included.
    pub fn order(&self) -> Vec<ProviderId> {
        self.candidates
            .iter()
            .map(|c| c.provider.clone())
            .chain(std::iter::once(self.fallback.clone()))
            .collect()
    }
}

/// Resolves categories to attempt plans over an atomically swappable [`RoutingTable`].
///
/// Pure selection: no network calls, no health mutation.
#[derive(Debug)]
pub struct RoutingPolicy {
    table: ArcSwap<RoutingTable>,
}

impl RoutingPolicy {
    pub fn new(table: RoutingTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    /// Current table snapshot.
    pub fn table(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    /// Replace the whole table; in-flight requests keep the snapshot they resolved against.
    pub fn swap_table(&self, table: RoutingTable) -> Arc<RoutingTable> {
        self.table.swap(Arc::new(table))
    }

    /// Replace one category's preferences.
    pub fn set_task_preference(&self, category: TaskCategory, ids: Vec<ProviderId>) -> Result<()> {
        loop {
            let current = self.table.load_full();
            let next = Arc::new(current.with_preference(category, ids.clone())?);
            let previous = self.table.compare_and_swap(&current, next);
            if Arc::ptr_eq(&previous, &current) {
                debug!(category = %category, "task preference updated");
                return Ok(());
            }
        }
    }

    /// Attempt plan for `category`. Never fails: an override or table entry without a
    /// registered adapter becomes a [`Usability::Unknown`] candidate that the executor skips.
    pub fn resolve(
        &self,
        category: TaskCategory,
        provider_override: Option<&ProviderId>,
        registry: &ProviderRegistry,
    ) -> RoutePlan {
        let table = self.table.load();
        let fallback = table.fallback().clone();

        let mut ordered: Vec<&ProviderId> = Vec::new();
        if let Some(id) = provider_override {
            if id != &fallback && !registry.contains(id) {
                debug!(provider = %id, "override names no registered adapter");
            }
            ordered.push(id);
        }
        ordered.extend(
            table
                .preferences(category)
                .iter()
                .filter(|id| Some(*id) != provider_override),
        );

        // everything up to the first fallback occurrence; an override of the fallback ends the plan
        let (usable, deferred): (Vec<RouteCandidate>, Vec<RouteCandidate>) = ordered
            .into_iter()
            .take_while(|id| **id != fallback)
            .enumerate()
            .map(|(rank, id)| RouteCandidate {
                provider: id.clone(),
                rank,
                usability: registry.usability(id),
            })
            .partition(RouteCandidate::is_usable);

        let mut candidates = usable;
        candidates.extend(deferred);

        debug!(
            category = %category,
            provider_override = provider_override.map(ProviderId::as_str),
            order = ?candidates.iter().map(|c| c.provider.as_str()).collect::<Vec<_>>(),
            fallback = %fallback,
            "route resolved"
        );

        RoutePlan {
            category,
            candidates,
            fallback,
        }
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self::new(RoutingTable::default())
    }
}
