//! # facebridge
//!
//! **facebridge** is the resilient execution layer between internal callers and
//! a biometric vendor REST API (detection, identity cards, camera capture) plus
//! an object store.
//!
//! It provides bounded-concurrency pools, a fixed-delay retry policy, per-key
//! memoization with expiry, a singleflight token broker with an auth-aware
//! retry loop, and a pipeline turning camera screenshots into a short video
//! clip under a hard deadline.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller ──► Bridge::{call, capture_screenshot, capture_video, store_object, ...}
//!                 │
//!                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  AuthGuard (attempt loop, MAX_AUTH_ATTEMPTS = 3)                   │
//! │    └─ TokenBroker (cached token, SingleFlight login)               │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  PoolSet ─► ExecPool per operation / "capture" / "store"           │
//! │            (max_concurrent, FIFO queue, admission_delay, cancel)   │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  RetryPolicy (N retries, fixed delay, retryable errors only)       │
//! └──────┬──────────────────────┬─────────────────────────────────────┘
//!        ▼                      ▼                     ▼
//!    vendor call        Screenshots (TtlMemo)     ObjectStore (pool only)
//!                               ▲
//!                       CapturePipeline ──frames──► Encoder (ffmpeg) ──► clip
//!
//!   every layer ── publish(Event) ──► Bus ──► listener ──► SubscriberSet ──► LogWriter, ...
//! ```
//!
//! ### Reply envelope
//! Operations never return `Err` or panic past the [`Bridge`]: they return a
//! [`Reply`] tagged `"ok"` (with `data`) or `"error"` (with a message), keyed
//! by the caller's [`RequestContext`].
//!
//! ## Features
//! | Area              | Description                                             | Key types / traits                          |
//! |-------------------|---------------------------------------------------------|---------------------------------------------|
//! | **Pools**         | Bounded concurrency with FIFO admission and cancel.     | [`ExecPool`], [`PoolSet`], [`Outcome`]      |
//! | **Retry**         | Fixed-delay retry with a skip predicate.                | [`RetryPolicy`], [`JitterPolicy`]           |
//! | **Memoization**   | Per-key results with expiry; shared in-flight work.     | [`TtlMemo`], [`SingleFlight`]               |
//! | **Auth**          | Singleflight login, re-auth on 401/403.                 | [`TokenBroker`], [`AuthGuard`]              |
//! | **Capture**       | Screenshot cache and screenshot-to-clip pipeline.       | [`Screenshots`], [`CapturePipeline`], [`Encoder`] |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, alerts).    | [`Subscribe`], [`Event`]                    |
//! | **Configuration** | Defaults plus `CC_FINDFACE_*` environment overrides.    | [`Config`], [`CaptureConfig`]               |
//!
//! ## Optional features
//! - `logging` (default): exports the [`LogWriter`] subscriber and [`init_logging`].
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use facebridge::{Bridge, Config, RequestContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     facebridge::init_logging("info")?;
//!
//!     let bridge = Bridge::builder(Config::from_env()?)
//!         .with_subscribers(vec![Arc::new(facebridge::LogWriter::new()) as Arc<dyn facebridge::Subscribe>])
//!         .build()?;
//!
//!     let ctx = RequestContext::new("capture", "client-1", "user-1", "req-1");
//!     let reply = bridge.capture_video(&ctx, 2, &bridge.cancel_token()).await;
//!     println!("{}", serde_json::to_string(&reply.map(|clip| clip.len()))?);
//!
//!     bridge.shutdown().await;
//!     Ok(())
//! }
//! ```

mod auth;
mod bridge;
mod capture;
mod config;
mod error;
mod events;
mod memo;
mod policies;
mod pool;
mod reply;
mod subscribers;
mod vendor;

#[cfg(feature = "logging")]
mod logging;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use auth::{AuthGuard, TokenBroker, MAX_AUTH_ATTEMPTS};
pub use bridge::{Bridge, BridgeBuilder};
pub use capture::{
    CapturePipeline, CaptureSession, CaptureState, Encoder, EncoderSession, FfmpegEncoder,
    Screenshots, VideoSettings,
};
pub use config::{CaptureConfig, Config, POOL_CAPTURE, POOL_STORE};
pub use error::{BridgeError, ConfigError, ErrorKind};
pub use events::{Bus, Event, EventKind};
pub use memo::{SingleFlight, TtlMemo};
pub use policies::{JitterPolicy, RetryPolicy, SkipPredicate, RETRY_COUNT, RETRY_DELAY};
pub use pool::{ExecPool, Outcome, PoolConfig, PoolSet, PoolStats};
pub use reply::{Reply, ReplyBody, RequestContext};
pub use subscribers::{Subscribe, SubscriberSet};
pub use vendor::{
    AuthApi, Blob, CameraApi, CameraId, Credentials, HttpVendor, MemoryStore, ObjectStore, Token,
};

// Built-in tracing subscriber and logging setup.
// Enabled by default via the `logging` feature.
#[cfg(feature = "logging")]
pub use logging::init_logging;
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
