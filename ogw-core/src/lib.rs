//! OpenGpuWatch Core Library
//!
//! This crate provides the backend capability trait and the change-event
//! model shared by the polling engine and every vendor backend.

pub mod backend;
pub mod model;
pub mod units;

pub use backend::{AdapterInfo, GpuBackend, NullBackend, Vendor};
pub use model::GpuEvent;
