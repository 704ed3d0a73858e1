//! Retry state machine and exponential backoff
//!
//! A call moves `Pending → Retrying(n) → Succeeded | Failed`. The attempt
//! budget is extended once when the last regular attempt failed for a
//! connection-class reason.

use crate::limiter::ConcurrencyLimiter;
use pactum_domain::ErrorClass;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Largest exponent used for backoff, far beyond any realistic ceiling
const MAX_BACKOFF_EXPONENT: u32 = 20;

/// Attempt budgets and backoff shape
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts before giving up
    pub default_attempts: u32,

    /// Budget after a one-time extension for connection-class failures
    pub connection_attempts: u32,

    /// Delay after the first failed attempt
    pub base_delay: Duration,

    /// Backoff ceiling
    pub max_delay: Duration,

    /// Upper bound of the jitter, as a fraction of the computed delay
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            default_attempts: 3,
            connection_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_fraction: 0.3,
        }
    }
}

impl RetryPolicy {
    /// Same backoff, fixed budget with no extension
    pub fn fixed(attempts: u32) -> Self {
        Self {
            default_attempts: attempts,
            connection_attempts: attempts,
            ..Self::default()
        }
    }

    /// Backoff after the failure of zero-based attempt `failed_attempt`
    ///
    /// `jitter` is a sample from `[0, 1)`; it is scaled by `jitter_fraction`
    /// and the computed delay.
    ///
    /// # Examples
    ///
    /// ```
    /// use pactum_domain::ErrorClass;
    /// use pactum_extractor::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff_delay(0, ErrorClass::Other, 0.0), Duration::from_secs(1));
    /// assert_eq!(policy.backoff_delay(2, ErrorClass::Other, 0.0), Duration::from_secs(4));
    /// assert_eq!(policy.backoff_delay(2, ErrorClass::Connection, 0.0), Duration::from_secs(8));
    /// assert_eq!(policy.backoff_delay(10, ErrorClass::Other, 0.0), Duration::from_secs(60));
    /// ```
    pub fn backoff_delay(&self, failed_attempt: u32, class: ErrorClass, jitter: f64) -> Duration {
        let exponent = failed_attempt.min(MAX_BACKOFF_EXPONENT);
        let mut base = self.base_delay.saturating_mul(1u32 << exponent);
        if class == ErrorClass::Connection {
            base = base.saturating_mul(2);
        }
        let jitter = base.mul_f64(self.jitter_fraction * jitter.clamp(0.0, 1.0));
        base.saturating_add(jitter).min(self.max_delay)
    }

    /// Backoff with a random jitter sample
    pub fn delay_for(&self, failed_attempt: u32, class: ErrorClass) -> Duration {
        let sample: f64 = rand::thread_rng().gen();
        self.backoff_delay(failed_attempt, class, sample)
    }
}

/// Lifecycle of a retried call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// No attempt finished yet
    Pending,
    /// The given number of attempts failed, another one is due
    Retrying(u32),
    /// An attempt succeeded
    Succeeded,
    /// The budget is exhausted
    Failed,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then try again
    Retry(Duration),
    /// Stop; the last error is final
    GiveUp,
}

/// Tracks attempts for one call against a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryTracker {
    policy: RetryPolicy,
    state: RetryState,
    attempts: u32,
    budget: u32,
    extended: bool,
    last_error: Option<String>,
}

impl RetryTracker {
    /// Start tracking a new call
    pub fn new(policy: RetryPolicy) -> Self {
        let budget = policy.default_attempts.max(1);
        Self {
            policy,
            state: RetryState::Pending,
            attempts: 0,
            budget,
            extended: false,
            last_error: None,
        }
    }

    /// Current state
    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Attempts finished so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Current attempt budget
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Whether the connection extension was granted
    pub fn extended(&self) -> bool {
        self.extended
    }

    /// Message of the most recent failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record a successful attempt
    pub fn on_success(&mut self) {
        self.attempts += 1;
        self.state = RetryState::Succeeded;
    }

    /// Record a failed attempt and decide whether to try again
    pub fn on_failure(&mut self, class: ErrorClass, message: impl Into<String>) -> RetryDecision {
        let failed_attempt = self.attempts;
        self.attempts += 1;
        self.last_error = Some(message.into());

        if self.attempts >= self.budget {
            let can_extend = class == ErrorClass::Connection
                && !self.extended
                && self.policy.connection_attempts > self.budget;
            if !can_extend {
                self.state = RetryState::Failed;
                return RetryDecision::GiveUp;
            }
            debug!(
                "Extending retry budget from {} to {} after connection failure",
                self.budget, self.policy.connection_attempts
            );
            self.budget = self.policy.connection_attempts;
            self.extended = true;
        }

        self.state = RetryState::Retrying(self.attempts);
        RetryDecision::Retry(self.policy.delay_for(failed_attempt, class))
    }
}

/// A per-call timeout elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeout(pub Duration);

impl Display for CallTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call timed out after {:?}", self.0)
    }
}

/// Final result of a retried call
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Value of the successful attempt, or the last error
    pub result: Result<T, E>,

    /// Attempts made
    pub attempts: u32,

    /// Whether the connection extension was granted
    pub extended: bool,
}

/// Run `op` under the limiter and a per-call timeout, retrying per `policy`
///
/// The permit is held only while a call is in flight, never during backoff.
pub async fn retry_call<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    limiter: &ConcurrencyLimiter,
    call_timeout: Duration,
    label: &str,
    mut op: F,
    classify: C,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorClass,
    E: Display + From<CallTimeout>,
{
    let mut tracker = RetryTracker::new(policy.clone());

    loop {
        let outcome = {
            let _permit = limiter.acquire().await;
            match tokio::time::timeout(call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(E::from(CallTimeout(call_timeout))),
            }
        };

        match outcome {
            Ok(value) => {
                tracker.on_success();
                return RetryOutcome {
                    result: Ok(value),
                    attempts: tracker.attempts(),
                    extended: tracker.extended(),
                };
            }
            Err(e) => match tracker.on_failure(classify(&e), e.to_string()) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        label,
                        tracker.attempts(),
                        tracker.budget(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    warn!("{} failed after {} attempts: {}", label, tracker.attempts(), e);
                    return RetryOutcome {
                        result: Err(e),
                        attempts: tracker.attempts(),
                        extended: tracker.extended(),
                    };
                }
            },
        }
    }
}
