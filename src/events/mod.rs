//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ExecPool`, `RetryPolicy::run_reported`, `TokenBroker`,
//!   `AuthGuard`, `TtlMemo::clear`, `CapturePipeline`, `SubscriberSet` workers.
//! - **Consumers**: the `Bridge` listener, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
