//! Call coalescing.
//!
//! - [`TtlMemo`] keeps each key's result for a fixed time and shares pending computations.
//! - [`SingleFlight`] shares one pending computation and keeps nothing afterwards.

mod single;
mod ttl;

pub use single::SingleFlight;
pub use ttl::TtlMemo;
