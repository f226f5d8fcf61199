//! Error types for spawnwatch.
//!
//! These cover setup only. A transition itself never fails: every decision
//! that cannot be made resolves to a pass-through [`Outcome`](crate::Outcome).

use spawnwatch_sys::CheckError;
use thiserror::Error;

/// Error during hook configuration or lifecycle.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("host check: {0}")]
    HostCheck(#[from] CheckError),

    #[error("isolation engine: {0}")]
    Isolation(String),
}

/// Result type for spawnwatch setup operations.
pub type Result<T> = std::result::Result<T, HookError>;
