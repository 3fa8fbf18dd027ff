//! Tracing subscriber setup for devhub migrations
//!
//! Migration steps emit structured `tracing` events; this crate decides
//! where they go and in which format.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
