//! Orchestrator configuration.
//!
//! Every field has a default, so an empty file (or no file) yields a working setup that
//! routes everything to the local fallback until API keys appear in the environment.
//! Files are YAML or JSON by extension; environment variables override file values.

mod watcher;

pub use watcher::{reload_routes, ConfigWatcher};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::classifier::ClassifierConfig;
use crate::metrics::DEFAULT_LATENCY_WINDOW;
use crate::provider::{SimpleResponder, DEFAULT_SYSTEM_PROMPT};
use crate::resilience::CircuitBreakerConfig;
use crate::routing::{default_routes, RoutingTable};
use crate::transport::api_key_from_env;
use crate::types::{ProviderId, TaskCategory};
use crate::{Error, ErrorContext, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub latency_window: usize,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            latency_window: DEFAULT_LATENCY_WINDOW,
        }
    }
}

/// Connection details of one remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl EndpointConfig {
    fn new(base_url: &str, model: &str, api_key_env: Option<&str>) -> Self {
        Self {
            enabled: true,
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key_env: api_key_env.map(str::to_string),
        }
    }

    /// Key read from the configured environment variable; blank counts as missing.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env.as_deref().and_then(api_key_from_env)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub ollama: EndpointConfig,
    pub anthropic: EndpointConfig,
    pub openai: EndpointConfig,
    pub groq: EndpointConfig,
    pub gemini: EndpointConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ollama: EndpointConfig::new("http://localhost:11434", "llama3.1", None),
            anthropic: EndpointConfig::new(
                "https://api.anthropic.com",
                "claude-3-haiku-20240307",
                Some("ANTHROPIC_API_KEY"),
            ),
            openai: EndpointConfig::new(
                "https://api.openai.com/v1",
                "gpt-4o-mini",
                Some("OPENAI_API_KEY"),
            ),
            groq: EndpointConfig::new(
                "https://api.groq.com/openai/v1",
                "llama-3.1-8b-instant",
                Some("GROQ_API_KEY"),
            ),
            gemini: EndpointConfig::new(
                "https://generativelanguage.googleapis.com/v1beta",
                "gemini-1.5-flash",
                Some("GEMINI_API_KEY"),
            ),
        }
    }
}

impl ProvidersConfig {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &EndpointConfig)> {
        [
            ("ollama", &self.ollama),
            ("anthropic", &self.anthropic),
            ("openai", &self.openai),
            ("groq", &self.groq),
            ("gemini", &self.gemini),
        ]
        .into_iter()
    }
}

fn default_route_map() -> BTreeMap<TaskCategory, Vec<ProviderId>> {
    default_routes().into_iter().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub fallback_provider: String,
    /// Per-attempt budget applied when a request carries no timeout of its own.
    pub attempt_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub circuit_breaker: BreakerSettings,
    pub routes: BTreeMap<TaskCategory, Vec<ProviderId>>,
    pub classifier: ClassifierConfig,
    pub providers: ProvidersConfig,
    pub metrics: MetricsSettings,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fallback_provider: SimpleResponder::ID.to_string(),
            attempt_timeout_ms: 30_000,
            probe_timeout_ms: 5_000,
            circuit_breaker: BreakerSettings::default(),
            routes: default_route_map(),
            classifier: ClassifierConfig::default(),
            providers: ProvidersConfig::default(),
            metrics: MetricsSettings::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

impl OrchestratorConfig {
    /// Parse without env overrides or validation.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Ok(cfg)
    }

    /// Read a file, apply env overrides, validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("failed to read config: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        let mut cfg = Self::parse(&content, ConfigFormat::from_path(path))?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// `path`, else `NIHONGO_CONFIG`, else built-in defaults (env overrides still apply).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::from_file(p);
        }
        if let Some(p) = std::env::var("NIHONGO_CONFIG").ok().filter(|s| !s.trim().is_empty()) {
            return Self::from_file(p);
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(ms) = std::env::var("NIHONGO_ATTEMPT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
        {
            self.attempt_timeout_ms = ms;
        }
        if let Some(n) = std::env::var("NIHONGO_BREAKER_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            self.circuit_breaker.failure_threshold = n;
        }
        if let Some(ms) = std::env::var("NIHONGO_BREAKER_COOLDOWN_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.circuit_breaker.cooldown_ms = ms;
        }
        if let Some(id) = std::env::var("NIHONGO_FALLBACK_PROVIDER")
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            self.fallback_provider = id.trim().to_string();
        }
        if let Some(host) = std::env::var("OLLAMA_HOST").ok().filter(|s| !s.trim().is_empty()) {
            let host = host.trim();
            self.providers.ollama.base_url = if host.contains("://") {
                host.to_string()
            } else {
                format!("http://{}", host)
            };
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, msg: String| {
            Error::configuration_with_context(
                msg,
                ErrorContext::new()
                    .with_field_path(field)
                    .with_source("config_validation"),
            )
        };
        if self.attempt_timeout_ms == 0 {
            return Err(invalid("attempt_timeout_ms", "must be greater than 0".into()));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(invalid(
                "circuit_breaker.failure_threshold",
                "must be at least 1".into(),
            ));
        }
        if self.metrics.latency_window == 0 {
            return Err(invalid("metrics.latency_window", "must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid(
                "temperature",
                format!("{} is outside 0.0..=2.0", self.temperature),
            ));
        }
        for (name, endpoint) in self.providers.iter() {
            if !endpoint.enabled {
                continue;
            }
            let parsed = url::Url::parse(&endpoint.base_url).map_err(|e| {
                invalid(
                    &format!("providers.{}.base_url", name),
                    format!("invalid url '{}': {}", endpoint.base_url, e),
                )
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(invalid(
                    &format!("providers.{}.base_url", name),
                    format!("unsupported scheme '{}'", parsed.scheme()),
                ));
            }
            if endpoint.model.trim().is_empty() {
                return Err(invalid(&format!("providers.{}.model", name), "empty model".into()));
            }
        }
        self.to_routing_table().map(|_| ())
    }

    pub fn to_routing_table(&self) -> Result<RoutingTable> {
        RoutingTable::new(
            self.fallback_provider.as_str(),
            self.routes.iter().map(|(c, ids)| (*c, ids.clone())),
        )
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.circuit_breaker.failure_threshold)
            .with_cooldown(Duration::from_millis(self.circuit_breaker.cooldown_ms))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = OrchestratorConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.fallback_provider, "simple");
        assert_eq!(cfg.attempt_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.breaker_config(), CircuitBreakerConfig::default());
        assert_eq!(cfg.to_routing_table().unwrap(), RoutingTable::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
attempt_timeout_ms: 1500
circuit_breaker:
  failure_threshold: 5
routes:
  chat: [groq, ollama]
providers:
  ollama:
    base_url: http://gpu-box:11434
    model: qwen2.5
"#;
        let cfg = OrchestratorConfig::parse(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.attempt_timeout_ms, 1500);
        assert_eq!(cfg.circuit_breaker.failure_threshold, 5);
        assert_eq!(cfg.circuit_breaker.cooldown_ms, 30_000);
        assert_eq!(cfg.providers.ollama.model, "qwen2.5");
        assert!(cfg.providers.ollama.enabled);
        assert_eq!(cfg.providers.anthropic.model, "claude-3-haiku-20240307");
        // an explicit routes map replaces the default map
        assert_eq!(cfg.routes.len(), 1);
        let table = cfg.to_routing_table().unwrap();
        assert_eq!(table.preferences(TaskCategory::Chat), ["groq", "ollama", "simple"].map(ProviderId::from));
        assert_eq!(table.preferences(TaskCategory::Translation), [ProviderId::from("simple")]);
    }

    #[test]
    fn test_json_and_upper_case_categories() {
        let json = r#"{ "routes": { "QUICK_RESPONSE": ["groq"] }, "max_tokens": 64 }"#;
        let cfg = OrchestratorConfig::parse(json, ConfigFormat::Json).unwrap();
        assert_eq!(cfg.max_tokens, 64);
        assert!(cfg.routes.contains_key(&TaskCategory::QuickResponse));
    }

    #[test]
    fn test_validation_errors() {
        let mut cfg = OrchestratorConfig::default();
        cfg.providers.groq.base_url = "not a url".into();
        let err = cfg.validate().unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("providers.groq.base_url")
        );

        let mut cfg = OrchestratorConfig::default();
        cfg.attempt_timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = OrchestratorConfig::default();
        cfg.routes.insert(TaskCategory::Chat, vec!["".into()]);
        assert!(cfg.validate().is_err());

        // disabled endpoints are not checked
        let mut cfg = OrchestratorConfig::default();
        cfg.providers.gemini.enabled = false;
        cfg.providers.gemini.base_url = "ftp:/x".into();
        cfg.validate().unwrap();
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/b.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a/b.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("router")), ConfigFormat::Yaml);
        assert!(OrchestratorConfig::parse("  \n", ConfigFormat::Json).is_ok());
    }
}
