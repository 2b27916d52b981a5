//! # Event subscribers.
//!
//! ```text
//! Component ── publish(Event) ──► Bus ──► Bridge listener ──► SubscriberSet
//!                                                                 │
//!                                                       ┌─────────┼─────────┐
//!                                                       ▼         ▼         ▼
//!                                                   LogWriter  Metrics   Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use facebridge::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct AuthAlerts;
//!
//! #[async_trait]
//! impl Subscribe for AuthAlerts {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::LoginFailed {
//!             // page someone
//!         }
//!     }
//!     fn name(&self) -> &'static str { "auth-alerts" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
