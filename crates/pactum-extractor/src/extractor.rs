//! Extractor facade wiring segmentation, scheduling and reconciliation

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::limiter::ConcurrencyLimiter;
use crate::line_items::LineItemAggregator;
use crate::parser::{parse_line_items, parse_record};
use crate::prompt::{PromptBuilder, RunningContext};
use crate::reconciler::{fallback_merge, RecordReconciler};
use crate::scheduler::{ProgressSink, TaskScheduler};
use crate::segmenter::{Chunk, Segmenter};
use crate::types::{ChunkFailure, ExtractionTask, LineItemOutcome, RecordOutcome};
use pactum_domain::{ContractRecord, DocumentElement, ReasoningService};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Turns a document's elements into a canonical record or a line item list
///
/// Both pipelines draw service permits from the same limiter, so running
/// them concurrently never exceeds `concurrency_limit` calls in flight.
pub struct Extractor<S: ?Sized> {
    service: Arc<S>,
    limiter: ConcurrencyLimiter,
    config: ExtractorConfig,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl<S> Extractor<S>
where
    S: ReasoningService + ?Sized,
{
    /// Create an extractor with its own limiter
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::Config`] when the configuration is invalid.
    pub fn new(service: Arc<S>, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        let limiter = ConcurrencyLimiter::new(config.concurrency_limit);
        Self::with_limiter(service, limiter, config)
    }

    /// Create an extractor drawing permits from an existing limiter
    pub fn with_limiter(
        service: Arc<S>,
        limiter: ConcurrencyLimiter,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        Ok(Self {
            service,
            limiter,
            config,
            progress: None,
        })
    }

    /// Report progress of every extraction run to `sink`
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Limiter shared by both pipelines
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Validate the document and split it into chunks
    pub fn segment(&self, elements: &[DocumentElement]) -> Result<Vec<Chunk>, ExtractorError> {
        let total: usize = elements.iter().map(DocumentElement::size).sum();
        if elements.iter().all(|e| e.content.trim().is_empty()) {
            return Err(ExtractorError::EmptyDocument);
        }
        if total > self.config.max_document_chars {
            return Err(ExtractorError::DocumentTooLarge(
                total,
                self.config.max_document_chars,
            ));
        }

        let segmenter = Segmenter::new(
            self.config.max_chunk_size(),
            self.config.max_table_chunk_size(),
            self.config.overlap_chars,
        );
        let chunks = segmenter.segment(elements);
        info!(
            "Document of {} elements ({} chars) split into {} chunks",
            elements.len(),
            total,
            chunks.len()
        );
        Ok(chunks)
    }

    /// Extract the canonical contract record
    ///
    /// # Errors
    ///
    /// Fails for an empty or oversized document, or when every chunk fails.
    /// Individual chunk failures are reported in the outcome instead.
    pub async fn extract_record(
        &self,
        elements: &[DocumentElement],
    ) -> Result<RecordOutcome, ExtractorError> {
        let chunks = self.segment(elements)?;
        let tasks = ExtractionTask::from_chunks(chunks.iter().map(|c| c.text.as_str()));
        let chunk_count = tasks.len();

        let service = &self.service;
        let (results, metrics) = self
            .scheduler()
            .run_with_metrics(
                tasks.clone(),
                move |index, text| async move {
                    let request = PromptBuilder::extract_record(index, &text);
                    let answer = service.complete(&request).await?;
                    debug!("Chunk {} answered with {} chars", index, answer.len());
                    parse_record(&answer)
                },
                ExtractorError::class,
            )
            .await;

        let failures = ChunkFailure::collect(&results);
        if metrics.succeeded == 0 {
            error!("All {} chunks failed record extraction", chunk_count);
        }

        let running_context = if self.config.include_running_context {
            let records: Vec<&ContractRecord> =
                results.iter().filter_map(|r| r.value.as_ref()).collect();
            Some(RunningContext::render(&fallback_merge(&records)))
        } else {
            None
        };

        let reconciler =
            RecordReconciler::new(Arc::clone(&self.service), self.limiter.clone(), &self.config);
        let reconciled = reconciler
            .reconcile(&results, &tasks, running_context.as_deref())
            .await?;

        info!(
            "Record extracted from {}/{} chunks ({} merge)",
            chunk_count - failures.len(),
            chunk_count,
            reconciled.strategy
        );

        Ok(RecordOutcome {
            record: reconciled.record,
            strategy: reconciled.strategy,
            chunk_count,
            failures,
            metrics,
        })
    }

    /// Extract the deduplicated line item list
    ///
    /// # Errors
    ///
    /// Fails for an empty or oversized document, or when every chunk fails.
    pub async fn extract_line_items(
        &self,
        elements: &[DocumentElement],
    ) -> Result<LineItemOutcome, ExtractorError> {
        let chunks = self.segment(elements)?;
        let tasks = ExtractionTask::from_chunks(chunks.iter().map(|c| c.text.as_str()));
        let chunk_count = tasks.len();

        let service = &self.service;
        let (results, metrics) = self
            .scheduler()
            .run_with_metrics(
                tasks,
                move |index, text| async move {
                    let request = PromptBuilder::extract_line_items(index, &text);
                    let answer = service.complete(&request).await?;
                    parse_line_items(&answer)
                },
                ExtractorError::class,
            )
            .await;

        if metrics.succeeded == 0 {
            error!("All {} chunks failed line item extraction", chunk_count);
            return Err(ExtractorError::ZeroChunksSucceeded(chunk_count));
        }

        let failures = ChunkFailure::collect(&results);
        let items = LineItemAggregator::aggregate(results.into_iter().filter_map(|r| r.value));

        info!(
            "Extracted {} line items from {}/{} chunks",
            items.len(),
            metrics.succeeded,
            chunk_count
        );

        Ok(LineItemOutcome {
            items,
            chunk_count,
            failures,
            metrics,
        })
    }

    fn scheduler(&self) -> TaskScheduler {
        let scheduler = TaskScheduler::new(
            self.limiter.clone(),
            self.config.batch_size,
            self.config.retry_policy(),
            self.config.request_timeout(),
        );
        match &self.progress {
            Some(sink) => scheduler.with_progress(Arc::clone(sink)),
            None => scheduler,
        }
    }
}
