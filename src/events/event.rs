//! # Events emitted by the execution layer and the capture pipeline.
//!
//! The [`EventKind`] enum classifies event types across the components:
//! - **Pool events**: admission control (queued, admitted, cancelled)
//! - **Retry events**: retry scheduling, skip-predicate hits, exhaustion
//! - **Auth events**: login lifecycle and token invalidation
//! - **Capture events**: video pipeline state transitions
//! - **Request events**: terminal outcome of a public operation
//!
//! The [`Event`] struct carries metadata such as timestamps, the subject
//! (pool / operation / cache name), request id, camera id and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use facebridge::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_subject("detect_face")
//!     .with_reason("status 502")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(1));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.subject.as_deref(), Some("detect_face"));
//! assert_eq!(ev.delay_ms, Some(1000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `subject` (subscriber name), `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `subject` (subscriber name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // === Pool events ===
    /// Job could not run immediately and joined the pool queue.
    ///
    /// Sets: `subject` (pool key), `queued` (queue length after push).
    JobQueued,

    /// Queued job received a slot.
    ///
    /// Sets: `subject` (pool key), `delay_ms` (time spent queued).
    JobAdmitted,

    /// Queued job was abandoned before admission.
    ///
    /// Sets: `subject` (pool key).
    JobCancelled,

    // === Retry events ===
    /// Operation failed and will be retried after a delay.
    ///
    /// Sets: `subject` (operation), `attempt` (failed attempt, 1-based),
    /// `delay_ms`, `reason`.
    RetryScheduled,

    /// Error matched the skip predicate; no retry.
    ///
    /// Sets: `subject`, `attempt`, `reason`.
    RetrySkipped,

    /// Retry budget exhausted; last error propagated.
    ///
    /// Sets: `subject`, `attempt`, `reason`.
    RetryExhausted,

    // === Auth events ===
    /// A login request was sent to the vendor (singleflight leader only).
    LoginStarted,

    /// Login succeeded.
    LoginSucceeded,

    /// Login failed; broker state cleared.
    ///
    /// Sets: `reason`.
    LoginFailed,

    /// Best-effort offline session cleanup failed (login still succeeds).
    ///
    /// Sets: `reason`.
    SessionCleanupFailed,

    /// Cached token dropped after an auth failure.
    TokenInvalidated,

    /// Operation is re-run with a fresh token after 401/403.
    ///
    /// Sets: `subject` (operation), `attempt` (next auth attempt).
    AuthRetry,

    // === Cache events ===
    /// Memoized entry forcibly evicted.
    ///
    /// Sets: `subject` (cache name), `reason` (key).
    CacheEvicted,

    // === Capture events ===
    /// Pipeline entered `Capturing`.
    ///
    /// Sets: `camera`, `timeout_ms` (hard deadline).
    CaptureStarted,

    /// One frame pushed into the encoder.
    ///
    /// Sets: `camera`, `attempt` (frame index, 0-based), `bytes`.
    FrameCaptured,

    /// All frames submitted; pipeline entered `Encoding`.
    ///
    /// Sets: `camera`.
    CaptureEncoding,

    /// Clip produced.
    ///
    /// Sets: `camera`, `bytes`.
    CaptureDone,

    /// Pipeline failed (frame error, encoder error or deadline).
    ///
    /// Sets: `camera`, `reason`.
    CaptureFailed,

    // === Request events ===
    /// Public operation returned `Reply::ok`.
    ///
    /// Sets: `subject` (operation), `request`.
    RequestSucceeded,

    /// Public operation returned `Reply::error`.
    ///
    /// Sets: `subject` (operation), `request`, `reason`.
    RequestFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Pool key, operation name or cache name.
    pub subject: Option<Arc<str>>,
    /// Correlation id of the originating request.
    pub request: Option<Arc<str>>,
    /// Camera the event refers to.
    pub camera: Option<u32>,
    /// Attempt / frame counter.
    pub attempt: Option<u32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Queue length observed when the event was published.
    pub queued: Option<u32>,
    /// Payload size in bytes.
    pub bytes: Option<u64>,
    /// Human-readable reason (errors, keys, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            subject: None,
            request: None,
            camera: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            queued: None,
            bytes: None,
            reason: None,
        }
    }

    /// Attaches a subject (pool key / operation / cache name).
    #[inline]
    pub fn with_subject(mut self, subject: impl Into<Arc<str>>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attaches a request correlation id.
    #[inline]
    pub fn with_request(mut self, request: impl Into<Arc<str>>) -> Self {
        self.request = Some(request.into());
        self
    }

    /// Attaches a camera id.
    #[inline]
    pub fn with_camera(mut self, camera: u32) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Attaches an attempt (or frame) counter.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches the observed queue length.
    #[inline]
    pub fn with_queued(mut self, n: usize) -> Self {
        self.queued = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches a payload size.
    #[inline]
    pub fn with_bytes(mut self, n: usize) -> Self {
        self.bytes = Some(n as u64);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_subject(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_subject(subscriber)
            .with_reason(info)
    }
}

fn clamp_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
