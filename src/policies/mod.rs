//! Retry policies.
//!
//! ## Contents
//! - [`RetryPolicy`] how many times and how often a failed vendor call is re-run
//! - [`JitterPolicy`] randomization of the retry delay
//!
//! ## Quick wiring
//! ```text
//! ExecPool::submit(job)
//!      └─► job = RetryPolicy::run_reported(name, bus, || vendor_call(token))
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 5 retries, 1s fixed delay, no jitter, retry only `ErrorKind::Retryable`.

mod jitter;
mod retry;

pub use jitter::JitterPolicy;
pub use retry::{RetryPolicy, SkipPredicate, RETRY_COUNT, RETRY_DELAY};
