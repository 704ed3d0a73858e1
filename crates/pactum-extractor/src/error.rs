//! Error types for the Extractor

use crate::retry::CallTimeout;
use pactum_domain::{ErrorClass, ReasoningError};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// Reasoning service error
    #[error("Service error: {0}")]
    Service(#[from] ReasoningError),

    /// The answer parsed as JSON but has the wrong shape
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    /// The answer is not JSON
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// The per-call timeout elapsed
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    /// No elements, or elements with no content
    #[error("Document is empty")]
    EmptyDocument,

    /// Document exceeds the configured maximum size
    #[error("Document too large: {0} chars (max: {1})")]
    DocumentTooLarge(usize, usize),

    /// Every chunk failed, nothing to reconcile
    #[error("All {0} chunks failed extraction")]
    ZeroChunksSucceeded(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExtractorError {
    /// Classify the error for retry purposes
    pub fn class(&self) -> ErrorClass {
        match self {
            ExtractorError::Service(e) => e.class(),
            ExtractorError::Timeout(_) => ErrorClass::Connection,
            ExtractorError::InvalidFormat(_) | ExtractorError::JsonParse(_) => {
                ErrorClass::MalformedResponse
            }
            _ => ErrorClass::Other,
        }
    }
}

impl From<CallTimeout> for ExtractorError {
    fn from(timeout: CallTimeout) -> Self {
        ExtractorError::Timeout(timeout.0)
    }
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}
