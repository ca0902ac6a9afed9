//! Error types used by the engine.
//!
//! - [`ExecuteError`]: why a native call produced no usable result.
//! - [`EngineError`]: lifecycle and configuration errors.
//!
//! Neither ever reaches subscribers: accessor failures degrade to default
//! values and the polling cycle skips the affected group.

use std::time::Duration;
use thiserror::Error;

/// Reasons a native call yielded no result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    /// The call did not finish in time; it keeps running in the background.
    #[error("native call timed out after {0:?}")]
    Timeout(Duration),

    /// The backend reported an error.
    #[error("native call failed: {0}")]
    Failed(String),

    /// The backend panicked.
    #[error("native call panicked")]
    Panicked,
}

impl ExecuteError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecuteError::Timeout(_) => "execute_timeout",
            ExecuteError::Failed(_) => "execute_failed",
            ExecuteError::Panicked => "execute_panicked",
        }
    }
}

/// Errors produced by engine lifecycle and configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine has been disposed and cannot be restarted.
    #[error("engine has been disposed")]
    Disposed,

    /// Configuration failed to load or validate.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}
