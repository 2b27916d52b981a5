//! # LogWriter: renders events through `tracing`
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  job queued pool="capture" queued=3
//! WARN  retry scheduled op="capture_screenshot" attempt=1 delay_ms=1000 reason="... status 502 ..."
//! INFO  token invalidated
//! ERROR capture failed camera=2 reason="... status 500 ..."
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let subject = e.subject.as_deref().unwrap_or("-");
        let request = e.request.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::JobQueued => {
                tracing::debug!(seq = e.seq, pool = subject, queued = ?e.queued, "job queued");
            }
            EventKind::JobAdmitted => {
                tracing::debug!(
                    seq = e.seq,
                    pool = subject,
                    waited_ms = ?e.delay_ms,
                    "job admitted"
                );
            }
            EventKind::JobCancelled => {
                tracing::info!(seq = e.seq, pool = subject, "queued job cancelled");
            }
            EventKind::RetryScheduled => {
                tracing::warn!(
                    seq = e.seq,
                    op = subject,
                    attempt = ?e.attempt,
                    delay_ms = ?e.delay_ms,
                    reason,
                    "retry scheduled"
                );
            }
            EventKind::RetrySkipped => {
                tracing::info!(seq = e.seq, op = subject, reason, "retry skipped by predicate");
            }
            EventKind::RetryExhausted => {
                tracing::warn!(
                    seq = e.seq,
                    op = subject,
                    attempt = ?e.attempt,
                    reason,
                    "retry exhausted"
                );
            }
            EventKind::LoginStarted => {
                tracing::info!(seq = e.seq, request, "vendor login started");
            }
            EventKind::LoginSucceeded => {
                tracing::info!(seq = e.seq, request, "vendor login ok");
            }
            EventKind::LoginFailed => {
                tracing::error!(seq = e.seq, request, reason, "vendor login failed");
            }
            EventKind::SessionCleanupFailed => {
                tracing::warn!(seq = e.seq, request, reason, "offline session cleanup failed");
            }
            EventKind::TokenInvalidated => {
                tracing::info!(seq = e.seq, "token invalidated");
            }
            EventKind::AuthRetry => {
                tracing::info!(
                    seq = e.seq,
                    op = subject,
                    request,
                    attempt = ?e.attempt,
                    "auth rejected, retrying with fresh token"
                );
            }
            EventKind::CacheEvicted => {
                tracing::debug!(seq = e.seq, cache = subject, key = reason, "cache entry evicted");
            }
            EventKind::CaptureStarted => {
                tracing::info!(
                    seq = e.seq,
                    camera = ?e.camera,
                    timeout_ms = ?e.timeout_ms,
                    "video capture started"
                );
            }
            EventKind::FrameCaptured => {
                tracing::debug!(
                    seq = e.seq,
                    camera = ?e.camera,
                    frame = ?e.attempt,
                    bytes = ?e.bytes,
                    "frame captured"
                );
            }
            EventKind::CaptureEncoding => {
                tracing::debug!(seq = e.seq, camera = ?e.camera, "all frames submitted, encoding");
            }
            EventKind::CaptureDone => {
                tracing::info!(
                    seq = e.seq,
                    camera = ?e.camera,
                    bytes = ?e.bytes,
                    "video capture done"
                );
            }
            EventKind::CaptureFailed => {
                tracing::error!(seq = e.seq, camera = ?e.camera, reason, "video capture failed");
            }
            EventKind::RequestSucceeded => {
                tracing::info!(seq = e.seq, op = subject, request, "request ok");
            }
            EventKind::RequestFailed => {
                tracing::error!(seq = e.seq, op = subject, request, reason, "request failed");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(
                    seq = e.seq,
                    subscriber = subject,
                    reason,
                    kind = ?e.kind,
                    "subscriber problem"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
