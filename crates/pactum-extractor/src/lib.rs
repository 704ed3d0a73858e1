//! Pactum Extractor
//!
//! Reassembles one structured contract record from a long document that a
//! size-limited reasoning service can only see piece by piece.
//!
//! # Architecture
//!
//! ```text
//! Elements → Segmenter → TaskScheduler → RecordReconciler → ContractRecord
//!                              │
//!                              └──────→ LineItemAggregator → Vec<LineItem>
//! ```
//!
//! - [`Segmenter`] packs ordered elements into chunks under a character
//!   budget, splitting oversized tables by whole rows and carrying a short
//!   text overlap between neighbouring chunks.
//! - [`TaskScheduler`] sends chunks to the service in batches, with
//!   exponential backoff and a [`ConcurrencyLimiter`] capping calls in flight.
//! - [`RecordReconciler`] merges per-chunk records through the service and
//!   falls back to [`fallback_merge`] when that request keeps failing.
//! - [`LineItemAggregator`] concatenates and deduplicates line items locally.
//!
//! # Example Usage
//!
//! ```no_run
//! use pactum_domain::DocumentElement;
//! use pactum_extractor::{Extractor, ExtractorConfig};
//! use pactum_llm::MockService;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Arc::new(MockService::new(r#"{"contract_number": "15/24"}"#));
//! let extractor = Extractor::new(service, ExtractorConfig::default())?;
//!
//! let elements = vec![DocumentElement::text("Contract No. 15/24 ...")];
//! let outcome = extractor.extract_record(&elements).await?;
//!
//! println!("Contract: {:?}", outcome.record.contract_number);
//! println!("Failed chunks: {}", outcome.failures.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
mod limiter;
mod line_items;
mod metrics;
mod parser;
mod prompt;
mod reconciler;
mod retry;
mod scheduler;
mod segmenter;
mod types;


pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub use extractor::Extractor;
pub use limiter::ConcurrencyLimiter;
pub use line_items::LineItemAggregator;
pub use metrics::RunMetrics;
pub use parser::{parse_line_items, parse_merge, parse_record};
pub use prompt::{preview, MergeEntry, PromptBuilder, RunningContext};
pub use reconciler::{fallback_merge, merge_keyed, Reconciled, RecordReconciler};
pub use retry::{
    retry_call, CallTimeout, RetryDecision, RetryOutcome, RetryPolicy, RetryState, RetryTracker,
};
pub use scheduler::{ProgressSink, TaskScheduler};
pub use segmenter::{segment, Chunk, PartMarker, Segmenter};
pub use types::{
    ChunkFailure, ExtractionResult, ExtractionTask, LineItemOutcome, MergeStrategy, RecordOutcome,
};
