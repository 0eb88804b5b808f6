use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::types::{ProviderId, TaskCategory};
use crate::{Error, ErrorContext, Result};

/// Category → ordered provider preferences.
///
/// Every list ends with the fallback id, and the fallback appears nowhere else: a list is
/// cut at its first fallback entry, since the fallback always answers. Tables are immutable
/// values; a change builds a new table which is then swapped in whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingTable {
    fallback: ProviderId,
    routes: BTreeMap<TaskCategory, Vec<ProviderId>>,
}

/// Built-in preferences keyed by category.
pub fn default_routes() -> Vec<(TaskCategory, Vec<ProviderId>)> {
    let list = |ids: &[&str]| ids.iter().map(|id| ProviderId::from(*id)).collect::<Vec<_>>();
    vec![
        (TaskCategory::Chat, list(&["ollama", "groq", "anthropic", "simple"])),
        (
            TaskCategory::Translation,
            list(&["anthropic", "gemini", "ollama", "groq", "simple"]),
        ),
        (
            TaskCategory::GrammarAnalysis,
            list(&["anthropic", "gemini", "ollama", "simple"]),
        ),
        (TaskCategory::TextAnalysis, list(&["local", "ollama", "simple"])),
        (TaskCategory::QuickResponse, list(&["groq", "simple"])),
        (
            TaskCategory::CreativeWriting,
            list(&["ollama", "anthropic", "gemini", "groq", "simple"]),
        ),
    ]
}

impl RoutingTable {
    /// Build a table. Categories without an entry route straight to the fallback.
    pub fn new(
        fallback: impl Into<ProviderId>,
        routes: impl IntoIterator<Item = (TaskCategory, Vec<ProviderId>)>,
    ) -> Result<Self> {
        let fallback = fallback.into();
        if fallback.as_str().trim().is_empty() {
            return Err(Error::configuration_with_context(
                "fallback provider id is empty",
                ErrorContext::new()
                    .with_field_path("fallback_provider")
                    .with_source("routing_table"),
            ));
        }

        let mut table = BTreeMap::new();
        for (category, ids) in routes {
            table.insert(category, normalize(category, &fallback, ids)?);
        }
        for category in TaskCategory::ALL {
            table
                .entry(category)
                .or_insert_with(|| vec![fallback.clone()]);
        }
        Ok(Self {
            fallback,
            routes: table,
        })
    }

    /// Built-in routes with the given fallback id.
    pub fn with_default_routes(fallback: impl Into<ProviderId>) -> Result<Self> {
        Self::new(fallback, default_routes())
    }

    pub fn fallback(&self) -> &ProviderId {
        &self.fallback
    }

    /// Full preference list for `category`, fallback last. Never empty.
    pub fn preferences(&self, category: TaskCategory) -> &[ProviderId] {
        self.routes
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(std::slice::from_ref(&self.fallback))
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskCategory, &[ProviderId])> {
        self.routes.iter().map(|(c, ids)| (*c, ids.as_slice()))
    }

    /// Copy of this table with one category's preferences replaced.
    pub fn with_preference(&self, category: TaskCategory, ids: Vec<ProviderId>) -> Result<Self> {
        let mut next = self.clone();
        next.routes
            .insert(category, normalize(category, &self.fallback, ids)?);
        Ok(next)
    }

    /// Every id referenced anywhere in the table, sorted and deduplicated.
    pub fn referenced_ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self.routes.values().flatten().cloned().collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        let fallback = ProviderId::from(crate::provider::SimpleResponder::ID);
        let mut routes: BTreeMap<TaskCategory, Vec<ProviderId>> = default_routes().into_iter().collect();
        for category in TaskCategory::ALL {
            routes.entry(category).or_insert_with(|| vec![fallback.clone()]);
        }
        Self { fallback, routes }
    }
}

/// Reject blank ids, drop repeats (first occurrence wins) and end the list at the first
/// fallback entry, appending the fallback when the list has none.
fn normalize(
    category: TaskCategory,
    fallback: &ProviderId,
    ids: Vec<ProviderId>,
) -> Result<Vec<ProviderId>> {
    if let Some(blank) = ids.iter().position(|id| id.as_str().trim().is_empty()) {
        return Err(Error::configuration_with_context(
            format!("empty provider id in '{}' route", category),
            ErrorContext::new()
                .with_field_path(format!("routes.{}[{}]", category, blank))
                .with_source("routing_table"),
        ));
    }

    let mut out: Vec<ProviderId> = Vec::with_capacity(ids.len() + 1);
    let mut rest = ids.into_iter();
    for id in rest.by_ref() {
        if &id == fallback {
            break;
        }
        if !out.contains(&id) {
            out.push(id);
        }
    }
    let unreachable: Vec<ProviderId> = rest.filter(|id| id != fallback).collect();
    if !unreachable.is_empty() {
        warn!(
            category = %category,
            fallback = %fallback,
            unreachable = ?unreachable.iter().map(ProviderId::as_str).collect::<Vec<_>>(),
            "route entries after the fallback are never attempted"
        );
    }
    out.push(fallback.clone());
    Ok(out)
}
