//! Type-safe wrappers for telemetry scalars
//!
//! Backends report raw `f32` readings; the engine wraps them before they reach
//! subscribers so a clock can never be mistaken for a wattage.
//!
//! All unit types serialize with 4 decimal places to reduce JSON payload size.

use serde::{Deserialize, Serialize};

/// Round f32 to 4 decimal places for compact JSON serialization
fn round4<S: serde::Serializer>(val: &f32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f32((*val * 10000.0).round() / 10000.0)
}

/// Core (shader) clock frequency
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Megahertz(#[serde(serialize_with = "round4")] pub f32);

impl Megahertz {
    /// Convert a frequency reported in hertz
    pub fn from_hz(hz: u64) -> Self {
        Self((hz as f64 / 1_000_000.0) as f32)
    }
}

/// Board power draw
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Watts(#[serde(serialize_with = "round4")] pub f32);

impl Watts {
    /// Convert a power reading reported in microwatts (hwmon convention)
    pub fn from_microwatts(uw: u64) -> Self {
        Self((uw as f64 / 1_000_000.0) as f32)
    }
}

/// Celsius
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Celsius(#[serde(serialize_with = "round4")] pub f32);

impl Celsius {
    /// Convert a temperature reported in millidegrees (hwmon convention)
    pub fn from_millidegrees(mdeg: i64) -> Self {
        Self(mdeg as f32 / 1000.0)
    }
}

/// Percentage (0.0 to 100.0)
///
/// GPU load is conventionally reported on a 0-100 scale, unlike a ratio.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Percentage(#[serde(serialize_with = "round4")] pub f32);

impl Percentage {
    /// Create a new percentage, clamping to [0.0, 100.0]
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 100.0))
    }
}

/// Megabytes (video memory)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Megabytes(#[serde(serialize_with = "round4")] pub f32);

impl Megabytes {
    /// Convert a byte count
    pub fn from_bytes(bytes: u64) -> Self {
        Self((bytes / 1024 / 1024) as f32)
    }
}
