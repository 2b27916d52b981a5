//! Vendor authentication.
//!
//! - [`TokenBroker`] holds the session token and logs in at most once at a time.
//! - [`AuthGuard`] runs an operation with that token and re-authenticates on 401/403.

mod broker;
mod guard;

pub use broker::TokenBroker;
pub use guard::{AuthGuard, MAX_AUTH_ATTEMPTS};
