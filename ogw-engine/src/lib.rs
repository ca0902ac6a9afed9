//! OpenGpuWatch Engine Library
//!
//! Polls a vendor GPU backend on two timers and publishes a change event
//! each time a watched feature group transitions. Every native call is
//! serialized, bounded by a timeout and gated while the engine is stopped.

pub mod config;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod events;
pub mod execute;

pub use config::EngineConfig;
pub use engine::AdapterEngine;
pub use error::{EngineError, ExecuteError};
pub use events::ListenerHandle;
