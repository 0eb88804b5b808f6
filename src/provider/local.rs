//! Adapters over host-supplied collaborators: the Japanese tokenizer and the vocabulary
//! vector search. Neither is implemented here; the host plugs them in through
//! [`TextAnalyzer`] and [`VocabularySearch`]. Without one, the adapter reports itself
//! unconfigured and routing passes over it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use super::{FailureReason, ProviderAdapter};
use crate::types::{ProviderId, ProviderRequest, ProviderResponse};

/// Error type returned by host collaborators.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// One token as produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub surface: String,
    pub part_of_speech: String,
    #[serde(default)]
    pub reading: Option<String>,
}

#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<Vec<TokenInfo>, CollaboratorError>;
}

/// One ranked vocabulary hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub original: String,
    pub furigana: String,
    pub english: String,
    pub jlpt_level: String,
}

#[async_trait]
pub trait VocabularySearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        level: Option<&str>,
        limit: usize,
    ) -> Result<Vec<VocabularyEntry>, CollaboratorError>;
}

/// `local`: tokenizer-backed structural analysis, no model involved.
pub struct LocalAnalysisAdapter {
    id: ProviderId,
    analyzer: Option<Arc<dyn TextAnalyzer>>,
}

impl std::fmt::Debug for LocalAnalysisAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAnalysisAdapter")
            .field("id", &self.id)
            .field("analyzer", &self.analyzer.is_some())
            .finish()
    }
}

impl LocalAnalysisAdapter {
    pub fn new(analyzer: Option<Arc<dyn TextAnalyzer>>) -> Self {
        Self {
            id: ProviderId::from("local"),
            analyzer,
        }
    }

    fn render(tokens: &[TokenInfo]) -> String {
        let mut out = format!("Token breakdown ({} tokens):", tokens.len());
        for t in tokens {
            let _ = match &t.reading {
                Some(reading) if reading != &t.surface => {
                    write!(out, "\n- {} ({}) [{}]", t.surface, reading, t.part_of_speech)
                }
                _ => write!(out, "\n- {} [{}]", t.surface, t.part_of_speech),
            };
        }
        out
    }
}

#[async_trait]
impl ProviderAdapter for LocalAnalysisAdapter {
    fn identifier(&self) -> &ProviderId {
        &self.id
    }

    fn is_configured(&self) -> bool {
        self.analyzer.is_some()
    }

    async fn invoke(
        &self,
        request: &ProviderRequest,
        _timeout: Duration,
    ) -> Result<ProviderResponse, FailureReason> {
        let analyzer = self
            .analyzer
            .as_ref()
            .ok_or_else(|| FailureReason::not_configured("no tokenizer attached"))?;
        let tokens = analyzer
            .analyze(&request.text)
            .await
            .map_err(|e| FailureReason::transport(format!("tokenizer failed: {}", e)))?;
        if tokens.is_empty() {
            return Err(FailureReason::transport("tokenizer returned no tokens"));
        }
        Ok(ProviderResponse::new(Self::render(&tokens)).with_model("tokenizer"))
    }
}

/// Words dropped before a vocabulary lookup.
const STOP_WORDS: &[&str] = &[
    "what", "is", "the", "meaning", "of", "does", "mean", "how", "to", "say", "jlpt",
    "vocabulary", "word",
];

/// Pull lookup terms out of a free-form question.
///
/// Japanese words win when present (first two); otherwise the first three remaining words.
pub fn extract_search_terms(message: &str) -> String {
    let words: Vec<&str> = message
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()) && w.chars().count() > 1)
        .collect();

    let japanese: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| w.chars().any(|c| !c.is_ascii()))
        .collect();
    if !japanese.is_empty() {
        return japanese.into_iter().take(2).collect::<Vec<_>>().join(" ");
    }
    words.into_iter().take(3).collect::<Vec<_>>().join(" ")
}

/// `vocabulary`: JLPT vocabulary lookup through the host's vector search.
pub struct VocabularyAdapter {
    id: ProviderId,
    search: Option<Arc<dyn VocabularySearch>>,
    limit: usize,
}

impl std::fmt::Debug for VocabularyAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VocabularyAdapter")
            .field("id", &self.id)
            .field("search", &self.search.is_some())
            .field("limit", &self.limit)
            .finish()
    }
}

impl VocabularyAdapter {
    pub fn new(search: Option<Arc<dyn VocabularySearch>>) -> Self {
        Self {
            id: ProviderId::from("vocabulary"),
            search,
            limit: 5,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Explicit `n1`..`n5` level mentioned in the question, if any.
    fn level_filter(text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        ["n1", "n2", "n3", "n4", "n5"]
            .into_iter()
            .find(|lvl| lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == *lvl))
    }
}

#[async_trait]
impl ProviderAdapter for VocabularyAdapter {
    fn identifier(&self) -> &ProviderId {
        &self.id
    }

    fn is_configured(&self) -> bool {
        self.search.is_some()
    }

    async fn invoke(
        &self,
        request: &ProviderRequest,
        _timeout: Duration,
    ) -> Result<ProviderResponse, FailureReason> {
        let search = self
            .search
            .as_ref()
            .ok_or_else(|| FailureReason::not_configured("no vocabulary index attached"))?;

        let terms = extract_search_terms(&request.text);
        if terms.is_empty() {
            return Err(FailureReason::transport("no search terms in request"));
        }
        let level = Self::level_filter(&request.text).map(|l| l.to_uppercase());
        let hits = search
            .search(&terms, level.as_deref(), self.limit)
            .await
            .map_err(|e| FailureReason::transport(format!("vocabulary search failed: {}", e)))?;
        if hits.is_empty() {
            return Err(FailureReason::transport(format!("no vocabulary matches for '{}'", terms)));
        }

        let mut out = String::from("JLPT vocabulary:");
        for (i, e) in hits.iter().enumerate() {
            let _ = write!(
                out,
                "\n{}. {} ({}) - {} [JLPT {}]",
                i + 1,
                e.original,
                e.furigana,
                e.english,
                e.jlpt_level
            );
        }
        Ok(ProviderResponse::new(out).with_model("vector-search"))
    }
}
