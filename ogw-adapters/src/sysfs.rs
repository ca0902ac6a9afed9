//! Linux DRM sysfs backend
//!
//! Reads telemetry straight from `/sys/class/drm/card<N>/device` and its
//! hwmon directory. The kernel exposes no scaling or sharpening controls
//! there, so this backend leaves every feature facet at its unsupported
//! default. Only available on Linux.

#[cfg(target_os = "linux")]
mod linux_impl {
    use anyhow::{anyhow, Context, Result};
    use ogw_core::backend::{AdapterInfo, GpuBackend, Vendor};
    use ogw_core::units::{Celsius, Megabytes, Megahertz, Watts};
    use std::fs;
    use std::path::{Path, PathBuf};

    const DRM_ROOT: &str = "/sys/class/drm";

    pub struct SysfsBackend {
        root: PathBuf,
    }

    impl SysfsBackend {
        pub fn new() -> Self {
            Self::with_root(DRM_ROOT)
        }

        /// Use a different DRM class directory (tests point this at a fixture tree)
        pub fn with_root(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        /// List every DRM card under the root
        ///
        /// Connector entries such as `card0-eDP-1` are skipped.
        pub fn enumerate(&self) -> Vec<AdapterInfo> {
            let entries = match fs::read_dir(&self.root) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::debug!("Cannot list {}: {}", self.root.display(), e);
                    return Vec::new();
                }
            };

            let mut adapters: Vec<AdapterInfo> = entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let index = name.strip_prefix("card")?.parse::<u32>().ok()?;
                    let vendor = read_string(&self.device_dir(index).join("vendor"))
                        .ok()
                        .and_then(|v| u16::from_str_radix(v.trim_start_matches("0x"), 16).ok())
                        .map(Vendor::from_pci_id)
                        .unwrap_or(Vendor::Unknown);
                    Some(AdapterInfo::new(index, name, vendor))
                })
                .collect();

            adapters.sort_by_key(|a| a.device_index);
            adapters
        }

        fn device_dir(&self, device: u32) -> PathBuf {
            self.root.join(format!("card{}", device)).join("device")
        }

        /// First hwmon directory of the device
        fn hwmon_dir(&self, device: u32) -> Result<PathBuf> {
            let dir = self.device_dir(device).join("hwmon");
            let mut entries: Vec<PathBuf> = fs::read_dir(&dir)
                .with_context(|| format!("reading {}", dir.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .collect();
            entries.sort();
            entries
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no hwmon entry under {}", dir.display()))
        }
    }

    impl Default for SysfsBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    fn read_string(path: &Path) -> Result<String> {
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Ok(raw.trim().to_string())
    }

    fn read_u64(path: &Path) -> Result<u64> {
        let raw = read_string(path)?;
        raw.parse::<u64>()
            .with_context(|| format!("parsing {:?} from {}", raw, path.display()))
    }

    fn read_i64(path: &Path) -> Result<i64> {
        let raw = read_string(path)?;
        raw.parse::<i64>()
            .with_context(|| format!("parsing {:?} from {}", raw, path.display()))
    }

    impl GpuBackend for SysfsBackend {
        fn name(&self) -> &str {
            "sysfs"
        }

        fn clock(&self, device: u32) -> Result<f32> {
            let hz = read_u64(&self.hwmon_dir(device)?.join("freq1_input"))?;
            Ok(Megahertz::from_hz(hz).0)
        }

        fn load(&self, device: u32) -> Result<f32> {
            let busy = read_u64(&self.device_dir(device).join("gpu_busy_percent"))?;
            Ok(busy.min(100) as f32)
        }

        fn power(&self, device: u32) -> Result<f32> {
            // Older kernels only have power1_average, newer APUs only power1_input
            let hwmon = self.hwmon_dir(device)?;
            let uw = read_u64(&hwmon.join("power1_average"))
                .or_else(|_| read_u64(&hwmon.join("power1_input")))?;
            Ok(Watts::from_microwatts(uw).0)
        }

        fn temperature(&self, device: u32) -> Result<f32> {
            let mdeg = read_i64(&self.hwmon_dir(device)?.join("temp1_input"))?;
            Ok(Celsius::from_millidegrees(mdeg).0)
        }

        fn vram_usage(&self, device: u32) -> Result<f32> {
            let bytes = read_u64(&self.device_dir(device).join("mem_info_vram_used"))?;
            Ok(Megabytes::from_bytes(bytes).0)
        }
    }
}

// Re-export for Linux
#[cfg(target_os = "linux")]
pub use linux_impl::SysfsBackend;

// Stub implementation for non-Linux platforms
#[cfg(not(target_os = "linux"))]
#[derive(Default)]
pub struct SysfsBackend;

#[cfg(not(target_os = "linux"))]
impl SysfsBackend {
    pub fn new() -> Self {
        Self
    }

    pub fn enumerate(&self) -> Vec<ogw_core::backend::AdapterInfo> {
        Vec::new()
    }
}

#[cfg(not(target_os = "linux"))]
impl ogw_core::backend::GpuBackend for SysfsBackend {
    fn name(&self) -> &str {
        "sysfs (Linux only)"
    }
}
