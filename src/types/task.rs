use crate::{Error, ErrorContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of request categories used to pick a routing preference list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskCategory {
    #[serde(rename = "chat", alias = "CHAT")]
    Chat,
    #[serde(rename = "translation", alias = "TRANSLATION")]
    Translation,
    #[serde(rename = "grammar", alias = "GRAMMAR_ANALYSIS")]
    GrammarAnalysis,
    #[serde(rename = "analysis", alias = "TEXT_ANALYSIS")]
    TextAnalysis,
    #[serde(rename = "quick", alias = "QUICK_RESPONSE")]
    QuickResponse,
    #[serde(rename = "creative", alias = "CREATIVE_WRITING")]
    CreativeWriting,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 6] = [
        TaskCategory::Chat,
        TaskCategory::Translation,
        TaskCategory::GrammarAnalysis,
        TaskCategory::TextAnalysis,
        TaskCategory::QuickResponse,
        TaskCategory::CreativeWriting,
    ];

    /// Short wire name used in configuration files and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Chat => "chat",
            TaskCategory::Translation => "translation",
            TaskCategory::GrammarAnalysis => "grammar",
            TaskCategory::TextAnalysis => "analysis",
            TaskCategory::QuickResponse => "quick",
            TaskCategory::CreativeWriting => "creative",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "chat" => Ok(TaskCategory::Chat),
            "translation" | "translate" => Ok(TaskCategory::Translation),
            "grammar" | "grammar_analysis" => Ok(TaskCategory::GrammarAnalysis),
            "analysis" | "text_analysis" => Ok(TaskCategory::TextAnalysis),
            "quick" | "quick_response" => Ok(TaskCategory::QuickResponse),
            "creative" | "creative_writing" => Ok(TaskCategory::CreativeWriting),
            _ => Err(Error::validation_with_context(
                format!("unknown task category '{}'", s),
                ErrorContext::new()
                    .with_field_path("task")
                    .with_details("expected one of chat, translation, grammar, analysis, quick, creative")
                    .with_source("task_category"),
            )),
        }
    }
}

/// Stable key naming one provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ProviderId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ProviderId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
