//! Vendor-specific GPU backends for OpenGpuWatch

pub mod demo;
pub mod sysfs;

pub use demo::DemoBackend;
pub use sysfs::SysfsBackend;
