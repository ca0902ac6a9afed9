//! Change-event data model
//!
//! Defines the per-group states the engine compares between polls and the
//! events it publishes to subscribers. A group is the set of facets reported
//! together in one notification.

use crate::units::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sharpness / mode value reported when the backend could not tell
pub const UNKNOWN_LEVEL: i32 = -1;

/// GPU scaling group: support, enabled, scaling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuScalingState {
    pub supported: bool,
    pub enabled: bool,
    /// Vendor scaling mode (0 when scaling modes are unsupported)
    pub mode: i32,
}

/// Radeon Super Resolution group: support, enabled, sharpness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsrState {
    pub supported: bool,
    pub enabled: bool,
    pub sharpness: i32,
}

impl RsrState {
    /// State reported when the backend never confirmed RSR support
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            enabled: false,
            sharpness: UNKNOWN_LEVEL,
        }
    }
}

/// Integer scaling group: support, enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerScalingState {
    pub supported: bool,
    pub enabled: bool,
}

/// Image sharpening group: enabled, sharpness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSharpeningState {
    pub enabled: bool,
    pub sharpness: i32,
}

/// One telemetry reading
///
/// Telemetry is continuous; samples are published on every telemetry tick
/// without change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Timestamp when this sample was captured
    pub timestamp: DateTime<Utc>,
    pub clock: Megahertz,
    pub load: Percentage,
    pub power: Watts,
    pub temperature: Celsius,
    pub vram_usage: Megabytes,
}

/// Event delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GpuEvent {
    GpuScalingChanged(GpuScalingState),
    RsrChanged(RsrState),
    IntegerScalingChanged(IntegerScalingState),
    ImageSharpeningChanged(ImageSharpeningState),
    Telemetry(TelemetrySample),
}

impl GpuEvent {
    /// Short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            GpuEvent::GpuScalingChanged(_) => "gpu_scaling_changed",
            GpuEvent::RsrChanged(_) => "rsr_changed",
            GpuEvent::IntegerScalingChanged(_) => "integer_scaling_changed",
            GpuEvent::ImageSharpeningChanged(_) => "image_sharpening_changed",
            GpuEvent::Telemetry(_) => "telemetry",
        }
    }

    /// Whether this event reports a state transition (as opposed to a telemetry reading)
    pub fn is_change(&self) -> bool {
        !matches!(self, GpuEvent::Telemetry(_))
    }
}
