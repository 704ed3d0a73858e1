//! Counting permit pool that bounds simultaneous service calls

use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::warn;

/// Shared ceiling on in-flight reasoning service calls
///
/// Cloning yields a handle to the same pool. Pass one limiter to every
/// pipeline that should share the ceiling; create separate limiters for
/// independent pipelines.
///
/// # Examples
///
/// ```
/// use pactum_extractor::ConcurrencyLimiter;
///
/// let limiter = ConcurrencyLimiter::new(3);
/// let shared = limiter.clone();
/// assert_eq!(shared.limit(), 3);
/// assert_eq!(limiter.available(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    /// Create a pool with `limit` permits; zero is raised to one
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Configured number of permits
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a permit; it is returned to the pool when dropped
    ///
    /// The pool is never closed, so `None` is only seen if that invariant is
    /// broken; the call then proceeds unbounded.
    pub async fn acquire(&self) -> Option<SemaphorePermit<'_>> {
        match self.semaphore.acquire().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                warn!("Concurrency limiter unavailable: {}", e);
                None
            }
        }
    }
}
