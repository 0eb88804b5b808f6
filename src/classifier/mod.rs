//! Task classification.
//!
//! Maps the raw request text to one [`TaskCategory`] with an ordered rule list. Each rule is
//! a conjunction of keyword groups; a group matches when any of its keywords occurs as a
//! substring of the lower-cased text. First matching rule wins; nothing matching means chat.
//! Short questions fall through to [`TaskCategory::QuickResponse`] after the keyword rules.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::types::TaskCategory;
use crate::{Error, ErrorContext, Result};

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Keyword sets and thresholds driving [`TaskClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Vocabulary lookups need one of these *and* one of `vocabulary_search_verbs`.
    pub vocabulary_keywords: Vec<String>,
    pub vocabulary_search_verbs: Vec<String>,
    pub translation_keywords: Vec<String>,
    pub grammar_keywords: Vec<String>,
    pub analysis_keywords: Vec<String>,
    pub creative_keywords: Vec<String>,
    /// Texts shorter than this (in chars) containing a question mark are quick responses.
    pub quick_max_chars: usize,
    pub question_marks: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            vocabulary_keywords: words(&[
                "jlpt", "vocabulary", "vocab", "word", "kanji", "n1", "n2", "n3", "n4", "n5",
            ]),
            vocabulary_search_verbs: words(&["search", "find", "look for", "what is"]),
            translation_keywords: words(&["translate", "translation", "mean", "english"]),
            grammar_keywords: words(&["grammar", "particle", "explain", "why", "how"]),
            analysis_keywords: words(&["analyze", "analysis", "breakdown", "parse"]),
            creative_keywords: words(&["write", "create", "compose", "story", "essay"]),
            quick_max_chars: 50,
            question_marks: words(&["?", "？"]),
        }
    }
}

#[derive(Debug)]
struct Rule {
    category: TaskCategory,
    all_of: Vec<Regex>,
}

impl Rule {
    fn matches(&self, lowered: &str) -> bool {
        !self.all_of.is_empty() && self.all_of.iter().all(|re| re.is_match(lowered))
    }
}

/// Deterministic text → category mapper. Immutable once built; safe to share.
#[derive(Debug)]
pub struct TaskClassifier {
    rules: Vec<Rule>,
    quick_max_chars: usize,
    question: Option<Regex>,
    config: ClassifierConfig,
}

impl TaskClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(5);
        let mut push = |category: TaskCategory, groups: Vec<Option<Regex>>| {
            // an empty keyword group disables its rule
            if let Some(all_of) = groups.into_iter().collect::<Option<Vec<_>>>() {
                rules.push(Rule { category, all_of });
            }
        };
        push(
            TaskCategory::TextAnalysis,
            vec![
                compile_group("classifier.vocabulary_keywords", &config.vocabulary_keywords)?,
                compile_group("classifier.vocabulary_search_verbs", &config.vocabulary_search_verbs)?,
            ],
        );
        push(
            TaskCategory::Translation,
            vec![compile_group("classifier.translation_keywords", &config.translation_keywords)?],
        );
        push(
            TaskCategory::GrammarAnalysis,
            vec![compile_group("classifier.grammar_keywords", &config.grammar_keywords)?],
        );
        push(
            TaskCategory::TextAnalysis,
            vec![compile_group("classifier.analysis_keywords", &config.analysis_keywords)?],
        );
        push(
            TaskCategory::CreativeWriting,
            vec![compile_group("classifier.creative_keywords", &config.creative_keywords)?],
        );

        let question = compile_group("classifier.question_marks", &config.question_marks)?;

        Ok(Self {
            rules,
            quick_max_chars: config.quick_max_chars,
            question,
            config,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Pick the category for `text`. A present hint is returned unchanged.
    pub fn classify(&self, text: &str, hint: Option<TaskCategory>) -> TaskCategory {
        if let Some(category) = hint {
            return category;
        }
        let lowered = text.to_lowercase();
        if let Some(rule) = self.rules.iter().find(|r| r.matches(&lowered)) {
            return rule.category;
        }
        let is_question = self
            .question
            .as_ref()
            .map(|re| re.is_match(text))
            .unwrap_or(false);
        if is_question && text.chars().count() < self.quick_max_chars {
            return TaskCategory::QuickResponse;
        }
        TaskCategory::Chat
    }
}

/// One alternation of escaped literals; `None` when the group has no usable keyword.
fn compile_group(field: &str, keywords: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .map(|k| regex::escape(&k))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(&alternatives.join("|"))
        .build()
        .map(Some)
        .map_err(|e| {
            Error::configuration_with_context(
                format!("invalid keyword set: {}", e),
                ErrorContext::new()
                    .with_field_path(field)
                    .with_source("task_classifier"),
            )
        })
}
