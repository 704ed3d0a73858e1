//! Trait definitions for external interactions
//!
//! The reasoning service is the only external collaborator the pipeline
//! calls. Implementations live in `pactum-llm`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What a request asks the reasoning service to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Extract a partial contract record from one chunk
    ExtractRecord,
    /// Extract line items from one chunk
    ExtractLineItems,
    /// Merge several partial records into one
    MergeRecords,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::ExtractRecord => "extract_record",
            RequestKind::ExtractLineItems => "extract_line_items",
            RequestKind::MergeRecords => "merge_records",
        };
        f.write_str(name)
    }
}

/// A single request to the reasoning service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Request kind
    pub kind: RequestKind,

    /// System instruction
    pub system: String,

    /// User prompt carrying the document text or the records to merge
    pub prompt: String,
}

impl ServiceRequest {
    /// Create a request
    pub fn new(kind: RequestKind, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            system: system.into(),
            prompt: prompt.into(),
        }
    }
}

/// Coarse classification of a failure, used to size the retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Transport failure: timeout, refused, reset
    Connection,
    /// The service answered but the answer could not be used
    MalformedResponse,
    /// Anything else
    Other,
}

/// Errors a reasoning service can report
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReasoningError {
    /// The call did not finish in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The service could not be reached or dropped the connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// The service answered with something unusable
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The service reported an error, e.g. a non-success HTTP status
    #[error("Service error: {0}")]
    Service(String),

    /// The requested model is not loaded on the service
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),
}

impl ReasoningError {
    /// Classify the error for retry purposes
    pub fn class(&self) -> ErrorClass {
        match self {
            ReasoningError::Timeout(_) | ReasoningError::Connection(_) => ErrorClass::Connection,
            ReasoningError::MalformedResponse(_) => ErrorClass::MalformedResponse,
            ReasoningError::Service(_) | ReasoningError::ModelNotAvailable(_) => ErrorClass::Other,
        }
    }
}

/// The external text-reasoning backend
///
/// A fallible remote function: one request in, one raw text answer out.
/// Implementations must not retry internally; the caller owns retry policy.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Send one request and return the raw answer text
    async fn complete(&self, request: &ServiceRequest) -> Result<String, ReasoningError>;

    /// Short human-readable name for logs
    fn name(&self) -> &str {
        "reasoning-service"
    }
}

#[async_trait]
impl<S: ReasoningService + ?Sized> ReasoningService for std::sync::Arc<S> {
    async fn complete(&self, request: &ServiceRequest) -> Result<String, ReasoningError> {
        (**self).complete(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
