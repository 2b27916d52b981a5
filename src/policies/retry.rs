//! # Retry policy for vendor calls.
//!
//! [`RetryPolicy`] wraps a fallible async operation and re-runs it after a
//! fixed delay. It is parameterized by:
//! - [`RetryPolicy::retries`] how many times a failure may be retried (default 5);
//! - [`RetryPolicy::delay`] the fixed pause between attempts (default 1s);
//! - [`RetryPolicy::jitter`] optional randomization of that pause;
//! - a skip predicate that stops retrying immediately. By default every error
//!   whose [`ErrorKind`](crate::ErrorKind) is not `Retryable` is skipped:
//!   HTTP 401/403 (left to the token broker), fatal and canceled errors.
//!
//! ```text
//! attempt 1 ──► Err(502) ──► sleep(delay) ──► attempt 2 ──► Err(401) ──► skip, return Err(401)
//!                                         └─► ...        ──► Err(502) after `retries` retries
//!                                                                  ──► return last Err
//! ```
//!
//! The policy holds no state between calls; one instance may wrap any number of
//! concurrent operations.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use facebridge::{BridgeError, RetryPolicy};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let policy = RetryPolicy::new(3, Duration::from_millis(1));
//! let res: Result<u32, BridgeError> = policy.run(|| async { Ok(7) }).await;
//! assert_eq!(res.unwrap(), 7);
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::error::{BridgeError, ErrorKind};
use crate::events::{Bus, Event, EventKind};
use crate::policies::jitter::JitterPolicy;

/// Predicate deciding that an error must not be retried.
pub type SkipPredicate = Arc<dyn Fn(&BridgeError) -> bool + Send + Sync>;

/// Default number of retries after the first failure.
pub const RETRY_COUNT: u32 = 5;
/// Default pause between attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Bounded retry with fixed delay and a skip predicate.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first failure.
    pub retries: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
    /// Randomization applied to `delay`.
    pub jitter: JitterPolicy,
    skip: SkipPredicate,
}

/// What happened after a failed attempt.
enum RetryStep<'a> {
    Scheduled {
        attempt: u32,
        delay: Duration,
        error: &'a BridgeError,
    },
    Skipped {
        attempt: u32,
        error: &'a BridgeError,
    },
    Exhausted {
        attempt: u32,
        error: &'a BridgeError,
    },
}

impl RetryStep<'_> {
    fn to_event(&self, name: &str) -> Event {
        match self {
            RetryStep::Scheduled {
                attempt,
                delay,
                error,
            } => Event::new(EventKind::RetryScheduled)
                .with_subject(name)
                .with_attempt(*attempt)
                .with_delay(*delay)
                .with_reason(error.to_string()),
            RetryStep::Skipped { attempt, error } => Event::new(EventKind::RetrySkipped)
                .with_subject(name)
                .with_attempt(*attempt)
                .with_reason(error.to_string()),
            RetryStep::Exhausted { attempt, error } => Event::new(EventKind::RetryExhausted)
                .with_subject(name)
                .with_attempt(*attempt)
                .with_reason(error.to_string()),
        }
    }
}

impl Default for RetryPolicy {
    /// Returns a policy with:
    /// - `retries = 5`;
    /// - `delay = 1s`;
    /// - `jitter = None`;
    /// - skip everything but [`ErrorKind::Retryable`].
    fn default() -> Self {
        Self::new(RETRY_COUNT, RETRY_DELAY)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retries", &self.retries)
            .field("delay", &self.delay)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Creates a policy that retries only [`ErrorKind::Retryable`] errors.
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self {
            retries,
            delay,
            jitter: JitterPolicy::None,
            skip: Arc::new(|e: &BridgeError| e.kind() != ErrorKind::Retryable),
        }
    }

    /// Replaces the skip predicate.
    pub fn with_skip<P>(mut self, skip: P) -> Self
    where
        P: Fn(&BridgeError) -> bool + Send + Sync + 'static,
    {
        self.skip = Arc::new(skip);
        self
    }

    /// Sets the jitter policy.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// True if `err` must propagate without retry.
    pub fn should_skip(&self, err: &BridgeError) -> bool {
        (self.skip)(err)
    }

    /// Runs `op` until it succeeds, hits the skip predicate, or runs out of retries.
    ///
    /// On exhaustion the last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, BridgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        self.drive(op, |_| {}).await
    }

    /// Same as [`run`](Self::run), publishing retry events for `name` to `bus`.
    pub async fn run_reported<T, F, Fut>(
        &self,
        name: &str,
        bus: &Bus,
        op: F,
    ) -> Result<T, BridgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        self.drive(op, |step| bus.publish(step.to_event(name))).await
    }

    async fn drive<T, F, Fut, R>(&self, mut op: F, mut report: R) -> Result<T, BridgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
        R: FnMut(RetryStep<'_>),
    {
        let mut attempts_left = self.retries;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if self.should_skip(&error) {
                report(RetryStep::Skipped {
                    attempt,
                    error: &error,
                });
                return Err(error);
            }
            if attempts_left == 0 {
                report(RetryStep::Exhausted {
                    attempt,
                    error: &error,
                });
                return Err(error);
            }
            attempts_left -= 1;

            let delay = self.jitter.apply(self.delay);
            report(RetryStep::Scheduled {
                attempt,
                delay,
                error: &error,
            });
            time::sleep(delay).await;
        }
    }
}
