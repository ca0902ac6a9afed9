//! GPU backend capability trait definition

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// GPU vendor behind an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    Amd,
    Intel,
    Nvidia,
    Unknown,
}

impl Vendor {
    /// Map a PCI vendor id to a vendor
    pub fn from_pci_id(id: u16) -> Self {
        match id {
            0x1002 | 0x1022 => Vendor::Amd,
            0x8086 => Vendor::Intel,
            0x10de => Vendor::Nvidia,
            _ => Vendor::Unknown,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Vendor::Amd => "amd",
            Vendor::Intel => "intel",
            Vendor::Nvidia => "nvidia",
            Vendor::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown vendor: {0}")]
pub struct ParseVendorError(pub String);

impl FromStr for Vendor {
    type Err = ParseVendorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amd" | "ati" => Ok(Vendor::Amd),
            "intel" => Ok(Vendor::Intel),
            "nvidia" => Ok(Vendor::Nvidia),
            "unknown" => Ok(Vendor::Unknown),
            other => Err(ParseVendorError(other.to_string())),
        }
    }
}

/// Identity of one physical adapter
///
/// Set once when the engine is constructed and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterInfo {
    /// Index the vendor backend uses to address this device
    pub device_index: u32,
    /// Index of the display driven by this adapter, if known
    pub display_index: Option<u32>,
    /// Human readable adapter name
    pub name: String,
    pub vendor: Vendor,
}

impl AdapterInfo {
    pub fn new(device_index: u32, name: impl Into<String>, vendor: Vendor) -> Self {
        Self {
            device_index,
            display_index: None,
            name: name.into(),
            vendor,
        }
    }
}

/// Trait for vendor-specific GPU control backends
///
/// Every method is one native capability. Calls are synchronous and may be
/// slow, fail, or panic; the engine only ever invokes them through its
/// serialized, timeout-bounded wrapper, so implementations need not be
/// reentrant.
///
/// Each method has a default that reports the facet as unsupported
/// (`false`, `0`, `0.0`). A backend overrides exactly the facets its vendor
/// library supports.
pub trait GpuBackend: Send + Sync {
    /// Get the name of this backend (e.g., "ADLX", "sysfs")
    fn name(&self) -> &str;

    // === GPU scaling ===

    fn has_gpu_scaling_support(&self, _device: u32) -> Result<bool> {
        Ok(false)
    }

    fn gpu_scaling(&self, _device: u32) -> Result<bool> {
        Ok(false)
    }

    fn set_gpu_scaling(&self, _device: u32, _enabled: bool) -> Result<bool> {
        Ok(false)
    }

    fn has_scaling_mode_support(&self, _device: u32) -> Result<bool> {
        Ok(false)
    }

    fn scaling_mode(&self, _device: u32) -> Result<i32> {
        Ok(0)
    }

    fn set_scaling_mode(&self, _device: u32, _mode: i32) -> Result<bool> {
        Ok(false)
    }

    // === Radeon Super Resolution ===

    fn has_rsr_support(&self, _device: u32) -> Result<bool> {
        Ok(false)
    }

    fn rsr(&self, _device: u32) -> Result<bool> {
        Ok(false)
    }

    fn set_rsr(&self, _device: u32, _enabled: bool) -> Result<bool> {
        Ok(false)
    }

    fn rsr_sharpness(&self, _device: u32) -> Result<i32> {
        Ok(0)
    }

    fn set_rsr_sharpness(&self, _device: u32, _sharpness: i32) -> Result<bool> {
        Ok(false)
    }

    // === Integer scaling ===

    fn has_integer_scaling_support(&self, _device: u32) -> Result<bool> {
        Ok(false)
    }

    fn integer_scaling(&self, _device: u32) -> Result<bool> {
        Ok(false)
    }

    fn set_integer_scaling(&self, _device: u32, _enabled: bool) -> Result<bool> {
        Ok(false)
    }

    // === Image sharpening ===

    fn has_image_sharpening_support(&self, _device: u32) -> Result<bool> {
        Ok(false)
    }

    fn image_sharpening(&self, _device: u32) -> Result<bool> {
        Ok(false)
    }

    fn set_image_sharpening(&self, _device: u32, _enabled: bool) -> Result<bool> {
        Ok(false)
    }

    fn image_sharpening_sharpness(&self, _device: u32) -> Result<i32> {
        Ok(0)
    }

    fn set_image_sharpening_sharpness(&self, _device: u32, _sharpness: i32) -> Result<bool> {
        Ok(false)
    }

    // === Telemetry ===

    /// Core clock in MHz
    fn clock(&self, _device: u32) -> Result<f32> {
        Ok(0.0)
    }

    /// Load in percent (0-100)
    fn load(&self, _device: u32) -> Result<f32> {
        Ok(0.0)
    }

    /// Board power in watts
    fn power(&self, _device: u32) -> Result<f32> {
        Ok(0.0)
    }

    /// Temperature in degrees Celsius
    fn temperature(&self, _device: u32) -> Result<f32> {
        Ok(0.0)
    }

    /// Used video memory in megabytes
    fn vram_usage(&self, _device: u32) -> Result<f32> {
        Ok(0.0)
    }
}

/// Backend with no capabilities at all
///
/// Every facet reports the trait default. Useful for adapters whose vendor
/// library is missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl GpuBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }
}
