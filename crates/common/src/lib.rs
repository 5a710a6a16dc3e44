//! Helpers shared by every crate: digests, env checks, logging and metrics.

pub mod digest;
pub mod env;
pub mod metrics;
pub mod utils;
