//! Ollama Service Implementation
//!
//! Talks to a local Ollama instance through its `/api/generate` endpoint in
//! JSON mode.
//!
//! # Features
//!
//! - Async HTTP communication with the Ollama API
//! - Configurable endpoint, model and temperature
//! - Separate connect and whole-request timeouts
//! - Transport errors classified into the domain taxonomy
//!
//! # Examples
//!
//! ```no_run
//! use pactum_llm::{OllamaConfig, OllamaService};
//!
//! let config = OllamaConfig {
//!     model: "qwen2.5:14b".to_string(),
//!     ..OllamaConfig::default()
//! };
//! let service = OllamaService::new(config).unwrap();
//! ```

use crate::LlmError;
use async_trait::async_trait;
use pactum_domain::{ReasoningError, ReasoningService, ServiceRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default model
pub const DEFAULT_MODEL: &str = "qwen2.5:14b";

/// Default connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default whole-request timeout (300 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

// Error bodies are cut to this many characters
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Connection settings for [`OllamaService`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// API endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// Connect phase timeout in seconds
    pub connect_timeout_secs: u64,

    /// Whole request timeout in seconds
    pub request_timeout_secs: u64,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            temperature: 0.1,
        }
    }
}

/// Ollama API client implementing [`ReasoningService`]
pub struct OllamaService {
    config: OllamaConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaService {
    /// Create a service from its configuration
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Client`] when the HTTP client cannot be built.
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Create a service against the default local endpoint
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(OllamaConfig {
            model: model.into(),
            ..OllamaConfig::default()
        })
    }

    /// Active configuration
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Send one generate request
    ///
    /// # Errors
    ///
    /// - [`LlmError::Timeout`] when the connect or request timeout elapses
    /// - [`LlmError::Communication`] when Ollama cannot be reached
    /// - [`LlmError::ModelNotAvailable`] on HTTP 404
    /// - [`LlmError::Http`] on any other non-success status
    /// - [`LlmError::InvalidResponse`] when the body is not a generate response
    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));

        let body = GenerateRequest {
            model: &self.config.model,
            system,
            prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("POST {} ({} prompt chars)", url, prompt.chars().count());

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.config.model.clone()));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Http {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let text = response.text().await.map_err(classify_transport)?;
        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        Ok(parsed.response)
    }
}

fn classify_transport(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() || err.is_body() {
        LlmError::Communication(err.to_string())
    } else if err.is_decode() {
        LlmError::InvalidResponse(err.to_string())
    } else {
        LlmError::Communication(format!("Request failed: {}", err))
    }
}

#[async_trait]
impl ReasoningService for OllamaService {
    async fn complete(&self, request: &ServiceRequest) -> Result<String, ReasoningError> {
        self.generate(&request.system, &request.prompt)
            .await
            .map_err(ReasoningError::from)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactum_domain::{ErrorClass, RequestKind};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer) -> OllamaService {
        OllamaService::new(OllamaConfig {
            endpoint: server.uri(),
            model: "test-model".to_string(),
            connect_timeout_secs: 2,
            request_timeout_secs: 5,
            temperature: 0.0,
        })
        .unwrap()
    }

    fn request() -> ServiceRequest {
        ServiceRequest::new(RequestKind::ExtractRecord, "system", "prompt")
    }

    #[test]
    fn test_ollama_service_creation() {
        let service = OllamaService::default_endpoint("mistral").unwrap();
        assert_eq!(service.config().endpoint, DEFAULT_ENDPOINT);
        assert_eq!(service.config().model, "mistral");
        assert_eq!(service.name(), "mistral");
    }

    #[test]
    fn test_ollama_config_from_partial_toml_uses_defaults() {
        let config: OllamaConfig = toml::from_str("model = \"llama3\"").unwrap();
        assert_eq!(config.model, "llama3");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn test_ollama_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "{\"inn\": \"1\"}", "done": true})),
            )
            .mount(&server)
            .await;

        let answer = service_for(&server).complete(&request()).await.unwrap();
        assert_eq!(answer, "{\"inn\": \"1\"}");
    }

    #[tokio::test]
    async fn test_ollama_model_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = service_for(&server).complete(&request()).await.unwrap_err();
        assert_eq!(err, ReasoningError::ModelNotAvailable("test-model".into()));
        assert_eq!(err.class(), ErrorClass::Other);
    }

    #[tokio::test]
    async fn test_ollama_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = service_for(&server).complete(&request()).await.unwrap_err();
        assert_eq!(err, ReasoningError::Service("HTTP 500: overloaded".into()));
    }

    #[tokio::test]
    async fn test_ollama_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = service_for(&server).complete(&request()).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::MalformedResponse);
    }

    #[tokio::test]
    async fn test_ollama_slow_response_is_connection_class() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "{}"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let service = OllamaService::new(OllamaConfig {
            endpoint: server.uri(),
            request_timeout_secs: 1,
            ..OllamaConfig::default()
        })
        .unwrap();

        let err = service.complete(&request()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::Timeout(_)));
        assert_eq!(err.class(), ErrorClass::Connection);
    }

    #[tokio::test]
    async fn test_ollama_unreachable_is_connection_class() {
        let service = OllamaService::new(OllamaConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            connect_timeout_secs: 2,
            request_timeout_secs: 2,
            ..OllamaConfig::default()
        })
        .unwrap();

        let err = service.complete(&request()).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Connection);
    }
}
