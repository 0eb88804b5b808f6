//! Mock HTTP server setup for adapter integration tests

#![allow(dead_code)]

use ai_nihongo_router::config::EndpointConfig;
use ai_nihongo_router::transport::HttpTransport;
use ai_nihongo_router::OrchestratorConfig;
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Environment variable that no test run sets, used to leave remote providers unconfigured.
pub const UNSET_KEY_ENV: &str = "NIHONGO_ROUTER_TEST_KEY_THAT_IS_NEVER_SET";

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    pub fn transport() -> Arc<HttpTransport> {
        Arc::new(HttpTransport::new().expect("http transport"))
    }

    /// Create a mock for a JSON response
    pub async fn mock_json_response(&self, method: &str, path: &str, status: u16, body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock(method, path)
            .with_status(usize::from(status))
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Like `mock_json_response`, but only matches when `header` carries `value`.
    pub async fn mock_with_header(
        &self,
        path: &str,
        header: &str,
        value: &str,
        body: &str,
    ) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", path)
            .match_header(header, value)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Only matches POST bodies containing `partial` as a JSON subset.
    pub async fn mock_with_body(&self, path: &str, partial: serde_json::Value, body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", path)
            .match_body(Matcher::PartialJson(partial))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Config whose Ollama endpoint points here and whose remote providers have no key.
    pub fn ollama_only_config(&self) -> OrchestratorConfig {
        let mut cfg = OrchestratorConfig::default();
        cfg.providers.ollama = EndpointConfig {
            enabled: true,
            base_url: self.base_url.clone(),
            model: "llama3.1".into(),
            api_key_env: None,
        };
        for endpoint in [
            &mut cfg.providers.anthropic,
            &mut cfg.providers.openai,
            &mut cfg.providers.groq,
            &mut cfg.providers.gemini,
        ] {
            endpoint.api_key_env = Some(UNSET_KEY_ENV.into());
        }
        cfg
    }
}
