//! Configuration for the Extractor

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Extractor
///
/// Sizes are expressed in tokens and converted to characters with
/// `chars_per_token`, since the segmenter measures characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Budget for a chunk holding only prose (tokens)
    pub max_chunk_tokens: usize,

    /// Budget for a chunk holding a table (tokens)
    pub max_table_chunk_tokens: usize,

    /// Characters per token used for budget conversion
    pub chars_per_token: usize,

    /// Prose carried from one chunk into the next (characters)
    pub overlap_chars: usize,

    /// Maximum simultaneous service calls
    pub concurrency_limit: usize,

    /// Tasks per batch; batches run one after another
    pub batch_size: usize,

    /// Attempts per chunk before giving up
    pub default_attempts: u32,

    /// Attempts per chunk when the failures are connection-class
    pub connection_attempts: u32,

    /// Attempts for the merge request
    pub merge_attempts: u32,

    /// First backoff delay (milliseconds)
    pub base_delay_ms: u64,

    /// Backoff ceiling (seconds)
    pub max_delay_secs: u64,

    /// Jitter as a fraction of the computed delay
    pub jitter_fraction: f64,

    /// Timeout for a single service call (seconds)
    pub request_timeout_secs: u64,

    /// Source text preview attached to each record in the merge request (characters)
    pub preview_chars: usize,

    /// Largest document accepted (characters)
    pub max_document_chars: usize,

    /// Attach a running context summary to the merge request
    pub include_running_context: bool,
}

impl ExtractorConfig {
    /// Prose chunk budget in characters
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_tokens * self.chars_per_token
    }

    /// Table chunk budget in characters
    pub fn max_table_chunk_size(&self) -> usize {
        self.max_table_chunk_tokens * self.chars_per_token
    }

    /// Per-call timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry policy for chunk extraction calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            default_attempts: self.default_attempts,
            connection_attempts: self.connection_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            jitter_fraction: self.jitter_fraction,
        }
    }

    /// Retry policy for the merge request: same backoff, no budget extension
    pub fn merge_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            default_attempts: self.merge_attempts,
            connection_attempts: self.merge_attempts,
            ..self.retry_policy()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chunk_tokens == 0 {
            return Err("max_chunk_tokens must be greater than 0".to_string());
        }
        if self.chars_per_token == 0 {
            return Err("chars_per_token must be greater than 0".to_string());
        }
        if self.max_table_chunk_tokens < self.max_chunk_tokens {
            return Err("max_table_chunk_tokens cannot be smaller than max_chunk_tokens".to_string());
        }
        if self.overlap_chars >= self.max_chunk_size() {
            return Err("overlap_chars must be smaller than the chunk size".to_string());
        }
        if self.concurrency_limit == 0 {
            return Err("concurrency_limit must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        if self.default_attempts == 0 || self.merge_attempts == 0 {
            return Err("attempt budgets must be greater than 0".to_string());
        }
        if self.connection_attempts < self.default_attempts {
            return Err("connection_attempts cannot be smaller than default_attempts".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err("jitter_fraction must be between 0.0 and 1.0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }
        if self.max_document_chars == 0 {
            return Err("max_document_chars must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_chunk_tokens: 8_000,
            max_table_chunk_tokens: 12_000,
            chars_per_token: 4,
            overlap_chars: 200,
            concurrency_limit: 3,
            batch_size: 50,
            default_attempts: 3,
            connection_attempts: 5,
            merge_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_secs: 60,
            jitter_fraction: 0.3,
            request_timeout_secs: 300,
            preview_chars: 1_000,
            max_document_chars: 2_000_000,
            include_running_context: true,
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: smaller chunks, more parallelism, shorter timeouts
    pub fn aggressive() -> Self {
        Self {
            max_chunk_tokens: 4_000,
            max_table_chunk_tokens: 6_000,
            concurrency_limit: 6,
            default_attempts: 2,
            connection_attempts: 3,
            merge_attempts: 2,
            base_delay_ms: 500,
            max_delay_secs: 15,
            request_timeout_secs: 120,
            ..Self::default()
        }
    }

    /// Lenient preset: larger chunks, fewer parallel calls, patient retries
    pub fn lenient() -> Self {
        Self {
            max_chunk_tokens: 12_000,
            max_table_chunk_tokens: 16_000,
            overlap_chars: 400,
            concurrency_limit: 2,
            connection_attempts: 6,
            base_delay_ms: 2_000,
            request_timeout_secs: 600,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
