//! Monitoring Module
//!
//! Logging setup for the CLI.

pub mod logging;

pub use logging::{init_tracing, LogFormat};
