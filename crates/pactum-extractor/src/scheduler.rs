//! Bounded-concurrency execution of extraction tasks
//!
//! Tasks run in sequential batches. Inside a batch every task is polled
//! cooperatively on the current task via `join_all`; the shared
//! [`ConcurrencyLimiter`] caps how many service calls are in flight.

use crate::limiter::ConcurrencyLimiter;
use crate::metrics::RunMetrics;
use crate::retry::{retry_call, CallTimeout, RetryPolicy};
use crate::types::{ExtractionResult, ExtractionTask};
use futures::future::join_all;
use pactum_domain::ErrorClass;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Receives progress notifications; purely observational
pub trait ProgressSink: Send + Sync {
    /// Called after each task reaches a terminal state
    fn on_progress(&self, processed: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, processed: usize, total: usize) {
        self(processed, total)
    }
}

/// Runs extraction tasks with retry, batching and a concurrency ceiling
#[derive(Clone)]
pub struct TaskScheduler {
    limiter: ConcurrencyLimiter,
    batch_size: usize,
    policy: RetryPolicy,
    call_timeout: Duration,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl TaskScheduler {
    /// Create a scheduler drawing permits from `limiter`
    pub fn new(
        limiter: ConcurrencyLimiter,
        batch_size: usize,
        policy: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            limiter,
            batch_size: batch_size.max(1),
            policy,
            call_timeout,
            progress: None,
        }
    }

    /// Attach a progress observer
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Limiter shared by this scheduler
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Run every task and return results ordered by `chunk_index`
    ///
    /// A task that exhausts its retry budget yields a failed result; it
    /// never aborts the batch.
    pub async fn run<T, E, F, Fut, C>(
        &self,
        tasks: Vec<ExtractionTask>,
        op: F,
        classify: C,
    ) -> Vec<ExtractionResult<T>>
    where
        F: Fn(usize, Arc<str>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
        E: Display + From<CallTimeout>,
    {
        self.run_with_metrics(tasks, op, classify).await.0
    }

    /// Like [`TaskScheduler::run`], also returning run counters
    pub async fn run_with_metrics<T, E, F, Fut, C>(
        &self,
        tasks: Vec<ExtractionTask>,
        op: F,
        classify: C,
    ) -> (Vec<ExtractionResult<T>>, RunMetrics)
    where
        F: Fn(usize, Arc<str>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
        E: Display + From<CallTimeout>,
    {
        let started = Instant::now();
        let total = tasks.len();
        let processed = AtomicUsize::new(0);
        let mut metrics = RunMetrics {
            tasks: total,
            ..RunMetrics::default()
        };
        let mut results = Vec::with_capacity(total);

        info!(
            "Scheduling {} tasks (concurrency {}, batch size {})",
            total,
            self.limiter.limit(),
            self.batch_size
        );

        for (batch_no, batch) in tasks.chunks(self.batch_size).enumerate() {
            debug!("Starting batch {} with {} tasks", batch_no + 1, batch.len());
            metrics.batches += 1;

            let batch_results = join_all(
                batch
                    .iter()
                    .map(|task| self.run_task(task, &op, &classify, &processed, total)),
            )
            .await;

            for (result, extended) in batch_results {
                if result.is_success() {
                    metrics.record_success(result.attempts, extended);
                } else {
                    metrics.record_failure(result.attempts, extended);
                }
                results.push(result);
            }
        }

        results.sort_by_key(|r| r.chunk_index);
        metrics.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            "Scheduler finished: {}/{} tasks succeeded, {} retries",
            metrics.succeeded, total, metrics.retries
        );
        (results, metrics)
    }

    async fn run_task<T, E, F, Fut, C>(
        &self,
        task: &ExtractionTask,
        op: &F,
        classify: &C,
        processed: &AtomicUsize,
        total: usize,
    ) -> (ExtractionResult<T>, bool)
    where
        F: Fn(usize, Arc<str>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
        E: Display + From<CallTimeout>,
    {
        let label = format!("Chunk {}", task.chunk_index);
        let outcome = retry_call(
            &self.policy,
            &self.limiter,
            self.call_timeout,
            &label,
            || op(task.chunk_index, Arc::clone(&task.chunk_text)),
            classify,
        )
        .await;

        let result = match outcome.result {
            Ok(value) => {
                debug!("Chunk {} succeeded after {} attempts", task.chunk_index, outcome.attempts);
                ExtractionResult::success(task.chunk_index, value, outcome.attempts)
            }
            Err(e) => ExtractionResult::failure(task.chunk_index, e.to_string(), outcome.attempts),
        };

        let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(sink) = &self.progress {
            sink.on_progress(done, total);
        }

        (result, outcome.extended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Refused,
        Garbage,
        TimedOut,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl From<CallTimeout> for TestError {
        fn from(_: CallTimeout) -> Self {
            TestError::TimedOut
        }
    }

    fn classify(e: &TestError) -> ErrorClass {
        match e {
            TestError::Refused | TestError::TimedOut => ErrorClass::Connection,
            TestError::Garbage => ErrorClass::MalformedResponse,
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            ..RetryPolicy::default()
        }
    }

    fn scheduler(limit: usize, batch_size: usize) -> TaskScheduler {
        TaskScheduler::new(
            ConcurrencyLimiter::new(limit),
            batch_size,
            fast_policy(),
            Duration::from_secs(2),
        )
    }

    fn tasks(n: usize) -> Vec<ExtractionTask> {
        ExtractionTask::from_chunks((1..=n).map(|i| format!("chunk {}", i)))
    }

    #[tokio::test]
    async fn test_results_sorted_despite_completion_order() {
        let results = scheduler(3, 50)
            .run(
                tasks(4),
                |index, _text| async move {
                    // Earlier chunks finish later
                    tokio::time::sleep(Duration::from_millis(((5 - index) * 10) as u64)).await;
                    Ok::<_, TestError>(index * 100)
                },
                classify,
            )
            .await;

        let indices: Vec<usize> = results.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert_eq!(results[2].value, Some(300));
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = scheduler(2, 50)
            .run(
                tasks(8),
                |index, _text| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, TestError>(index)
                    }
                },
                classify,
            )
            .await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_failed_task_does_not_abort_batch() {
        let (results, metrics) = scheduler(3, 50)
            .run_with_metrics(
                tasks(3),
                |index, _text| async move {
                    if index == 2 {
                        Err(TestError::Garbage)
                    } else {
                        Ok(index)
                    }
                },
                classify,
            )
            .await;

        assert!(results[0].is_success());
        assert_eq!(results[1].value, None);
        assert_eq!(results[1].error.as_deref(), Some("Garbage"));
        assert_eq!(results[1].attempts, 3);
        assert!(results[2].is_success());
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.total_attempts, 5);
    }

    #[tokio::test]
    async fn test_connection_failures_use_extended_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (results, metrics) = scheduler(1, 50)
            .run_with_metrics(
                tasks(1),
                |_index, _text| {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(TestError::Refused)
                    }
                },
                classify,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(results[0].attempts, 5);
        assert_eq!(metrics.extensions, 1);
    }

    #[tokio::test]
    async fn test_call_timeout_is_retried() {
        let scheduler = TaskScheduler::new(
            ConcurrencyLimiter::new(2),
            50,
            fast_policy(),
            Duration::from_millis(10),
        );
        let results = scheduler
            .run(
                tasks(2),
                |index, _text| async move {
                    if index == 1 {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Ok::<_, TestError>(index)
                },
                classify,
            )
            .await;

        assert_eq!(results[0].error.as_deref(), Some("TimedOut"));
        assert_eq!(results[0].attempts, 5);
        assert_eq!(results[1].value, Some(2));
    }

    #[tokio::test]
    async fn test_batches_keep_global_indices_and_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let scheduler = scheduler(2, 2).with_progress(Arc::new(move |done: usize, total: usize| {
            sink_seen.lock().unwrap().push((done, total));
        }));

        let (results, metrics) = scheduler
            .run_with_metrics(
                tasks(5),
                |index, text| async move { Ok::<_, TestError>(format!("{}:{}", index, text)) },
                classify,
            )
            .await;

        assert_eq!(metrics.batches, 3);
        assert_eq!(results[4].value.as_deref(), Some("5:chunk 5"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last(), Some(&(5, 5)));
        assert!(seen.iter().all(|(_, total)| *total == 5));
    }

    #[tokio::test]
    async fn test_independent_limiters() {
        let a = scheduler(1, 50);
        let b = scheduler(1, 50);
        let (ra, rb) = tokio::join!(
            a.run(tasks(2), |i, _| async move { Ok::<_, TestError>(i) }, classify),
            b.run(tasks(2), |i, _| async move { Ok::<_, TestError>(i) }, classify),
        );
        assert_eq!(ra.len(), 2);
        assert_eq!(rb.len(), 2);
        assert_eq!(a.limiter().available(), 1);
    }
}
