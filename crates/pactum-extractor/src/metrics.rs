//! Metrics collected while scheduling extraction tasks

use serde::Serialize;

/// Counters for one scheduler run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Tasks submitted
    pub tasks: usize,

    /// Tasks that produced a value
    pub succeeded: usize,

    /// Tasks that exhausted their budget
    pub failed: usize,

    /// Service calls made, retries included
    pub total_attempts: u64,

    /// Attempts beyond the first, summed over tasks
    pub retries: u64,

    /// Tasks granted the connection budget extension
    pub extensions: usize,

    /// Batches executed
    pub batches: usize,

    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

impl RunMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a task that succeeded after `attempts` calls
    pub fn record_success(&mut self, attempts: u32, extended: bool) {
        self.succeeded += 1;
        self.record_attempts(attempts, extended);
    }

    /// Record a task that failed after `attempts` calls
    pub fn record_failure(&mut self, attempts: u32, extended: bool) {
        self.failed += 1;
        self.record_attempts(attempts, extended);
    }

    fn record_attempts(&mut self, attempts: u32, extended: bool) {
        self.total_attempts += u64::from(attempts);
        self.retries += u64::from(attempts.saturating_sub(1));
        if extended {
            self.extensions += 1;
        }
    }

    /// Fraction of tasks that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.tasks == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.tasks as f64
    }

    /// Fold another run into this one
    pub fn merge(&mut self, other: &RunMetrics) {
        self.tasks += other.tasks;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.total_attempts += other.total_attempts;
        self.retries += other.retries;
        self.extensions += other.extensions;
        self.batches += other.batches;
        self.elapsed_ms += other.elapsed_ms;
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Extraction Run Summary".to_string(),
            "======================".to_string(),
            format!("Tasks: {} in {} batches", self.tasks, self.batches),
            format!(
                "Succeeded: {} ({:.0}%)",
                self.succeeded,
                self.success_rate() * 100.0
            ),
            format!("Failed: {}", self.failed),
            format!("Service calls: {}", self.total_attempts),
        ];

        if self.retries > 0 {
            lines.push(format!("Retries: {}", self.retries));
        }
        if self.extensions > 0 {
            lines.push(format!("Extended budgets: {}", self.extensions));
        }
        lines.push(format!("Elapsed: {}ms", self.elapsed_ms));

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = RunMetrics::new();
        assert_eq!(metrics.tasks, 0);
        assert_eq!(metrics.success_rate(), 0.0);
    }

    #[test]
    fn test_record_attempts() {
        let mut metrics = RunMetrics::new();
        metrics.tasks = 3;
        metrics.record_success(1, false);
        metrics.record_success(2, false);
        metrics.record_failure(5, true);

        assert_eq!(metrics.succeeded, 2);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.total_attempts, 8);
        assert_eq!(metrics.retries, 5);
        assert_eq!(metrics.extensions, 1);
    }

    #[test]
    fn test_merge() {
        let mut a = RunMetrics::new();
        a.tasks = 2;
        a.record_success(1, false);
        let mut b = RunMetrics::new();
        b.tasks = 1;
        b.record_failure(3, false);

        a.merge(&b);
        assert_eq!(a.tasks, 3);
        assert_eq!(a.failed, 1);
        assert_eq!(a.total_attempts, 4);
    }

    #[test]
    fn test_summary() {
        let mut metrics = RunMetrics::new();
        metrics.tasks = 4;
        metrics.batches = 1;
        metrics.record_success(1, false);
        metrics.record_success(1, false);
        metrics.record_success(2, false);
        metrics.record_failure(5, true);

        let summary = metrics.summary();
        assert!(summary.contains("Tasks: 4 in 1 batches"));
        assert!(summary.contains("Succeeded: 3 (75%)"));
        assert!(summary.contains("Retries: 5"));
        assert!(summary.contains("Extended budgets: 1"));
    }
}
