//! Composition root and public operations.

mod builder;
mod service;

pub use builder::BridgeBuilder;
pub use service::Bridge;
