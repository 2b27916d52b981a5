//! Execution pools.
//!
//! ## Contents
//! - [`ExecPool`] bounded concurrency with a FIFO admission queue
//! - [`PoolSet`] named pools created on first use
//! - [`PoolConfig`] capacity and admission delay
//! - [`Outcome`] result of a submitted job (`Done` / `Cancelled`)
//!
//! Every vendor call, frame fetch and object-store access passes through a
//! pool; the pool is the only place where concurrency toward the upstream is
//! limited.

mod config;
mod core;
mod outcome;
mod set;

pub use config::PoolConfig;
pub use self::core::{ExecPool, PoolStats};
pub use outcome::Outcome;
pub use set::PoolSet;
