//! Error types used by the execution layer and the capture pipeline.
//!
//! This module defines two error enums:
//!
//! - [`BridgeError`]: failures of a vendor call, an object-store access or a capture run.
//! - [`ConfigError`]: failures while reading [`Config`](crate::Config) from the environment.
//!
//! Every [`BridgeError`] is classified into an [`ErrorKind`], which drives the
//! execution layer:
//!
//! ```text
//! ErrorKind::Auth      (401/403)      → token invalidated, bounded auth retry
//! ErrorKind::Retryable (5xx, network) → RetryPolicy, fixed delay
//! ErrorKind::Fatal     (store, encoder, timeout) → surfaced as Reply::error
//! ErrorKind::Canceled                 → surfaced as Reply::error("operation canceled")
//! ```
//!
//! `BridgeError` is `Clone`: a memoized or singleflight computation hands the
//! same error to every waiter.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification used by retry and auth loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Vendor rejected the token (HTTP 401/403).
    Auth,
    /// Transport failure or non-auth error status; safe to retry.
    Retryable,
    /// Not worth retrying.
    Fatal,
    /// Work abandoned before it ran.
    Canceled,
}

/// # Errors produced by vendor calls and the capture pipeline.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// Vendor answered with a non-success status code.
    #[error("{name}: vendor responded with status {status}: {body}")]
    Status {
        /// Request name (for logs).
        name: Arc<str>,
        /// HTTP status code.
        status: u16,
        /// Response body, if it could be read.
        body: Arc<str>,
    },

    /// Request never produced a response (connect, TLS, read, decode).
    #[error("{name}: transport failure: {error}")]
    Transport {
        /// Request name (for logs).
        name: Arc<str>,
        /// Underlying error message.
        error: Arc<str>,
    },

    /// Object store failure.
    #[error("object store: {error}")]
    Store {
        /// Underlying error message.
        error: Arc<str>,
    },

    /// Video encoder failed or exited without producing a clip.
    #[error("encoder failed: {error}")]
    Encoder {
        /// Underlying error message.
        error: Arc<str>,
    },

    /// Operation exceeded its hard deadline.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// Operation was abandoned before it was admitted.
    #[error("operation canceled")]
    Canceled,
}

impl BridgeError {
    /// Builds a [`BridgeError::Status`].
    pub fn status(name: impl Into<Arc<str>>, status: u16, body: impl Into<Arc<str>>) -> Self {
        BridgeError::Status {
            name: name.into(),
            status,
            body: body.into(),
        }
    }

    /// Builds a [`BridgeError::Transport`].
    pub fn transport(name: impl Into<Arc<str>>, error: impl ToString) -> Self {
        BridgeError::Transport {
            name: name.into(),
            error: error.to_string().into(),
        }
    }

    /// Builds a [`BridgeError::Encoder`].
    pub fn encoder(error: impl ToString) -> Self {
        BridgeError::Encoder {
            error: error.to_string().into(),
        }
    }

    /// Builds a [`BridgeError::Store`].
    pub fn store(error: impl ToString) -> Self {
        BridgeError::Store {
            error: error.to_string().into(),
        }
    }

    /// HTTP status of the failed call, `0` when there was no response.
    pub fn status_code(&self) -> u16 {
        match self {
            BridgeError::Status { status, .. } => *status,
            _ => 0,
        }
    }

    /// True for 401/403 responses.
    ///
    /// # Example
    /// ```
    /// use facebridge::BridgeError;
    ///
    /// assert!(BridgeError::status("login", 401, "").is_auth());
    /// assert!(BridgeError::status("login", 403, "").is_auth());
    /// assert!(!BridgeError::status("login", 500, "").is_auth());
    /// ```
    pub fn is_auth(&self) -> bool {
        matches!(self.status_code(), 401 | 403)
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Status { status: 401 | 403, .. } => ErrorKind::Auth,
            BridgeError::Status { .. } | BridgeError::Transport { .. } => ErrorKind::Retryable,
            BridgeError::Store { .. }
            | BridgeError::Encoder { .. }
            | BridgeError::Timeout { .. } => ErrorKind::Fatal,
            BridgeError::Canceled => ErrorKind::Canceled,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use facebridge::BridgeError;
    ///
    /// assert_eq!(BridgeError::Canceled.as_label(), "canceled");
    /// assert_eq!(BridgeError::status("detect", 403, "").as_label(), "vendor_auth");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BridgeError::Status { status: 401 | 403, .. } => "vendor_auth",
            BridgeError::Status { .. } => "vendor_status",
            BridgeError::Transport { .. } => "vendor_transport",
            BridgeError::Store { .. } => "store_failed",
            BridgeError::Encoder { .. } => "encoder_failed",
            BridgeError::Timeout { .. } => "timeout",
            BridgeError::Canceled => "canceled",
        }
    }
}

/// Errors raised while loading configuration from the environment.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Environment variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },
}
