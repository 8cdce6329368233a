//! Workflow orchestration core: a dependency-aware, resumable, partially concurrent task runner
//! with persistent state, retries, cancellation, notifications, and cache-aware skipping.
pub mod cli;
pub mod core;
pub mod logging;

/// Current crate version string exposed for CLI and tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type Result<T> = std::result::Result<T, anyhow::Error>;
