//! Pactum Reasoning Service Layer
//!
//! Implementations of the `ReasoningService` trait from `pactum-domain`.
//!
//! # Services
//!
//! - `MockService`: Scripted, deterministic double for tests and dry runs
//! - `OllamaService`: Local Ollama API integration
//!
//! Neither service retries internally. Retry and backoff belong to the
//! extractor's scheduler.
//!
//! # Examples
//!
//! ```
//! use pactum_domain::{ReasoningService, RequestKind, ServiceRequest};
//! use pactum_llm::MockService;
//!
//! # tokio_test::block_on(async {
//! let service = MockService::new(r#"{"inn": "7707083893"}"#);
//! let request = ServiceRequest::new(RequestKind::ExtractRecord, "system", "chunk text");
//! let answer = service.complete(&request).await.unwrap();
//! assert_eq!(answer, r#"{"inn": "7707083893"}"#);
//! assert_eq!(service.call_count(), 1);
//! # });
//! ```

#![warn(missing_docs)]

pub mod ollama;

use async_trait::async_trait;
use pactum_domain::{ReasoningError, ReasoningService, RequestKind, ServiceRequest};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

pub use ollama::{OllamaConfig, OllamaService};

/// Errors raised inside the HTTP client before they are mapped onto the domain taxonomy
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// The request or connect phase timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid response from the model
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// The client could not be constructed
    #[error("Client configuration error: {0}")]
    Client(String),
}

impl From<LlmError> for ReasoningError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Communication(msg) => ReasoningError::Connection(msg),
            LlmError::Timeout(msg) => ReasoningError::Timeout(msg),
            LlmError::InvalidResponse(msg) => ReasoningError::MalformedResponse(msg),
            LlmError::Http { status, body } => {
                ReasoningError::Service(format!("HTTP {}: {}", status, body))
            }
            LlmError::ModelNotAvailable(model) => ReasoningError::ModelNotAvailable(model),
            LlmError::Client(msg) => ReasoningError::Service(msg),
        }
    }
}

/// Which requests a scripted rule applies to
#[derive(Debug, Clone, Default)]
struct Matcher {
    kind: Option<RequestKind>,
    pattern: Option<String>,
}

impl Matcher {
    fn matches(&self, request: &ServiceRequest) -> bool {
        self.kind.is_none_or(|kind| kind == request.kind)
            && self
                .pattern
                .as_deref()
                .is_none_or(|pattern| request.prompt.contains(pattern))
    }
}

#[derive(Debug, Clone)]
struct ResponseRule {
    matcher: Matcher,
    response: String,
}

#[derive(Debug, Clone)]
struct FailureRule {
    matcher: Matcher,
    error: ReasoningError,
    // None fails forever
    remaining: Option<usize>,
}

#[derive(Debug, Clone)]
struct DelayRule {
    matcher: Matcher,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Script {
    responses: Vec<ResponseRule>,
    failures: Vec<FailureRule>,
    delays: Vec<DelayRule>,
    history: Vec<ServiceRequest>,
}

/// Mock reasoning service for deterministic testing
///
/// Returns pre-configured answers without any network calls. Rules are
/// matched against the request kind and a substring of the prompt; the
/// first matching rule wins, in insertion order. Clones share the script
/// and the call history.
///
/// # Examples
///
/// ```
/// use pactum_domain::{ReasoningError, RequestKind};
/// use pactum_llm::MockService;
///
/// let service = MockService::new("{}");
/// service.add_response("CHUNK-1", r#"{"inn": "1"}"#);
/// service.add_kind_response(RequestKind::MergeRecords, r#"{"inn": "merged"}"#);
/// service.add_error(Some(RequestKind::ExtractRecord), "CHUNK-3", ReasoningError::Timeout("slow".into()));
/// ```
#[derive(Debug, Clone)]
pub struct MockService {
    default_response: String,
    script: Arc<Mutex<Script>>,
}

impl MockService {
    /// Create a mock answering every request with `response`
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer prompts containing `pattern` with `response`
    pub fn add_response(&self, pattern: impl Into<String>, response: impl Into<String>) {
        self.push_response(None, Some(pattern.into()), response.into());
    }

    /// Answer every request of `kind` with `response`
    pub fn add_kind_response(&self, kind: RequestKind, response: impl Into<String>) {
        self.push_response(Some(kind), None, response.into());
    }

    /// Answer requests of `kind` whose prompt contains `pattern`
    pub fn add_response_for(
        &self,
        kind: RequestKind,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) {
        self.push_response(Some(kind), Some(pattern.into()), response.into());
    }

    fn push_response(&self, kind: Option<RequestKind>, pattern: Option<String>, response: String) {
        self.script().responses.push(ResponseRule {
            matcher: Matcher { kind, pattern },
            response,
        });
    }

    /// Fail every matching request with `error`
    ///
    /// An empty pattern matches every prompt.
    pub fn add_error(
        &self,
        kind: Option<RequestKind>,
        pattern: impl Into<String>,
        error: ReasoningError,
    ) {
        self.push_failure(kind, pattern.into(), error, None);
    }

    /// Fail the first `times` matching requests with `error`, then fall through
    pub fn add_transient_error(
        &self,
        kind: Option<RequestKind>,
        pattern: impl Into<String>,
        error: ReasoningError,
        times: usize,
    ) {
        self.push_failure(kind, pattern.into(), error, Some(times));
    }

    fn push_failure(
        &self,
        kind: Option<RequestKind>,
        pattern: String,
        error: ReasoningError,
        remaining: Option<usize>,
    ) {
        self.script().failures.push(FailureRule {
            matcher: Matcher {
                kind,
                pattern: (!pattern.is_empty()).then_some(pattern),
            },
            error,
            remaining,
        });
    }

    /// Sleep for `delay` before answering prompts containing `pattern`
    pub fn add_delay(&self, pattern: impl Into<String>, delay: Duration) {
        self.script().delays.push(DelayRule {
            matcher: Matcher {
                kind: None,
                pattern: Some(pattern.into()),
            },
            delay,
        });
    }

    /// Total number of requests received
    pub fn call_count(&self) -> usize {
        self.script().history.len()
    }

    /// Number of requests of the given kind
    pub fn calls_of(&self, kind: RequestKind) -> usize {
        self.script().history.iter().filter(|r| r.kind == kind).count()
    }

    /// Number of requests of the given kind whose prompt contains `pattern`
    pub fn calls_matching(&self, kind: RequestKind, pattern: &str) -> usize {
        self.script()
            .history
            .iter()
            .filter(|r| r.kind == kind && r.prompt.contains(pattern))
            .count()
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.script().history.clone()
    }

    /// Forget the call history
    pub fn reset_call_count(&self) {
        self.script().history.clear();
    }

    // Decides the outcome under the lock; the delay is awaited after release
    fn plan(&self, request: &ServiceRequest) -> (Option<Duration>, Result<String, ReasoningError>) {
        let mut script = self.script();
        script.history.push(request.clone());

        let delay = script
            .delays
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| rule.delay);

        let failure = script.failures.iter_mut().find(|rule| {
            rule.matcher.matches(request) && rule.remaining.is_none_or(|left| left > 0)
        });
        if let Some(rule) = failure {
            if let Some(left) = rule.remaining.as_mut() {
                *left -= 1;
            }
            return (delay, Err(rule.error.clone()));
        }

        let response = script
            .responses
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| rule.response.clone())
            .unwrap_or_else(|| self.default_response.clone());

        (delay, Ok(response))
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new("{}")
    }
}

#[async_trait]
impl ReasoningService for MockService {
    async fn complete(&self, request: &ServiceRequest) -> Result<String, ReasoningError> {
        let (delay, outcome) = self.plan(request);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: RequestKind, prompt: &str) -> ServiceRequest {
        ServiceRequest::new(kind, "system", prompt)
    }

    #[tokio::test]
    async fn test_mock_service_default() {
        let service = MockService::new("Test response");
        let result = service.complete(&request(RequestKind::ExtractRecord, "any")).await;
        assert_eq!(result.unwrap(), "Test response");
    }

    #[tokio::test]
    async fn test_mock_service_pattern_responses() {
        let service = MockService::default();
        service.add_response("hello", "world");
        service.add_response("foo", "bar");

        let kind = RequestKind::ExtractRecord;
        assert_eq!(service.complete(&request(kind, "say hello")).await.unwrap(), "world");
        assert_eq!(service.complete(&request(kind, "foo!")).await.unwrap(), "bar");
        assert_eq!(service.complete(&request(kind, "unknown")).await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_mock_service_kind_filter() {
        let service = MockService::new("extract");
        service.add_kind_response(RequestKind::MergeRecords, "merge");

        let merged = service.complete(&request(RequestKind::MergeRecords, "x")).await;
        let extracted = service.complete(&request(RequestKind::ExtractRecord, "x")).await;
        assert_eq!(merged.unwrap(), "merge");
        assert_eq!(extracted.unwrap(), "extract");
        assert_eq!(service.calls_of(RequestKind::MergeRecords), 1);
    }

    #[tokio::test]
    async fn test_mock_service_permanent_error() {
        let service = MockService::default();
        service.add_error(None, "bad", ReasoningError::Timeout("slow".into()));

        for _ in 0..3 {
            let result = service.complete(&request(RequestKind::ExtractRecord, "bad prompt")).await;
            assert!(matches!(result, Err(ReasoningError::Timeout(_))));
        }
        assert_eq!(service.calls_matching(RequestKind::ExtractRecord, "bad"), 3);
    }

    #[tokio::test]
    async fn test_mock_service_transient_error() {
        let service = MockService::new("ok");
        service.add_transient_error(
            Some(RequestKind::ExtractRecord),
            "",
            ReasoningError::Connection("reset".into()),
            2,
        );

        let kind = RequestKind::ExtractRecord;
        assert!(service.complete(&request(kind, "a")).await.is_err());
        assert!(service.complete(&request(kind, "b")).await.is_err());
        assert_eq!(service.complete(&request(kind, "c")).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_mock_service_error_scoped_to_kind() {
        let service = MockService::new("ok");
        service.add_error(
            Some(RequestKind::ExtractRecord),
            "CHUNK-3",
            ReasoningError::Service("boom".into()),
        );

        let merge = service.complete(&request(RequestKind::MergeRecords, "CHUNK-3 preview")).await;
        assert_eq!(merge.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_mock_service_delay() {
        let service = MockService::new("late");
        service.add_delay("slow", Duration::from_millis(20));

        let start = std::time::Instant::now();
        let result = service.complete(&request(RequestKind::ExtractRecord, "slow one")).await;
        assert_eq!(result.unwrap(), "late");
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_mock_service_clone_shares_history() {
        let service1 = MockService::new("test");
        let service2 = service1.clone();

        service1.complete(&request(RequestKind::ExtractRecord, "x")).await.unwrap();

        assert_eq!(service1.call_count(), 1);
        assert_eq!(service2.call_count(), 1);

        service2.reset_call_count();
        assert_eq!(service1.call_count(), 0);
    }

    #[test]
    fn test_llm_error_mapping() {
        let timeout: ReasoningError = LlmError::Timeout("t".into()).into();
        assert!(matches!(timeout, ReasoningError::Timeout(_)));

        let http: ReasoningError = LlmError::Http {
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert_eq!(http, ReasoningError::Service("HTTP 503: busy".into()));

        let invalid: ReasoningError = LlmError::InvalidResponse("x".into()).into();
        assert!(matches!(invalid, ReasoningError::MalformedResponse(_)));
    }
}
