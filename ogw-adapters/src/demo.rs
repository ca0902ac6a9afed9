//! Demo backend that simulates an AMD-style control library
//!
//! Implements every facet in memory, including RSR, and produces
//! realistic-looking telemetry without requiring an actual GPU. It can also
//! simulate a driver layer that only comes up some time after the backend is
//! created, as happens after system resume.

use anyhow::{anyhow, Result};
use ogw_core::backend::GpuBackend;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

const MIN_SHARPNESS: i32 = 0;
const MAX_SHARPNESS: i32 = 100;

/// Scaling modes understood by the simulated driver
const SCALING_MODES: [i32; 3] = [0, 1, 2]; // preserve aspect, full panel, centered

// =============================================================================
// Synthetic telemetry
// =============================================================================

/// Simple deterministic noise from a seed
fn noise(seed: f32) -> f32 {
    let x = (seed * 12.9898 + 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Small jitter centered around 0
fn jitter(seed: f32, amplitude: f32) -> f32 {
    (noise(seed) - 0.5) * 2.0 * amplitude
}

/// Load follows a slow wave between light desktop use and a game scene
fn load_at(t: f32) -> f32 {
    let wave = (t / 20.0 * std::f32::consts::TAU).sin() * 0.5 + 0.5;
    (15.0 + wave * 75.0).clamp(0.0, 100.0)
}

// =============================================================================
// DemoBackend
// =============================================================================

#[derive(Debug)]
struct DemoState {
    gpu_scaling: bool,
    scaling_mode: i32,
    rsr: bool,
    rsr_sharpness: i32,
    integer_scaling: bool,
    image_sharpening: bool,
    image_sharpening_sharpness: i32,
    samples: u64,
}

impl Default for DemoState {
    fn default() -> Self {
        Self {
            gpu_scaling: true,
            scaling_mode: 0,
            rsr: false,
            rsr_sharpness: 80,
            integer_scaling: false,
            image_sharpening: false,
            image_sharpening_sharpness: 50,
            samples: 0,
        }
    }
}

#[derive(Debug)]
pub struct DemoBackend {
    created: Instant,
    driver_delay: Duration,
    state: Mutex<DemoState>,
}

impl DemoBackend {
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            driver_delay: Duration::ZERO,
            state: Mutex::new(DemoState::default()),
        }
    }

    /// Simulate a driver layer that reports no support until `delay` has
    /// elapsed since construction
    pub fn with_driver_delay(mut self, delay: Duration) -> Self {
        self.driver_delay = delay;
        self
    }

    fn driver_ready(&self) -> bool {
        self.created.elapsed() >= self.driver_delay
    }

    fn state(&self) -> Result<MutexGuard<'_, DemoState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("demo driver state poisoned"))
    }

    /// Run a write against the simulated driver, reporting `false` when the
    /// driver is not up yet
    fn write(&self, f: impl FnOnce(&mut DemoState) -> bool) -> Result<bool> {
        if !self.driver_ready() {
            return Ok(false);
        }
        let mut state = self.state()?;
        Ok(f(&mut state))
    }

    fn elapsed_secs(&self) -> f32 {
        self.created.elapsed().as_secs_f32()
    }

    fn next_seed(&self) -> Result<f32> {
        let mut state = self.state()?;
        state.samples += 1;
        Ok(state.samples as f32)
    }
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DemoBackend {
    fn name(&self) -> &str {
        "Demo"
    }

    fn has_gpu_scaling_support(&self, _device: u32) -> Result<bool> {
        Ok(self.driver_ready())
    }

    fn gpu_scaling(&self, _device: u32) -> Result<bool> {
        Ok(self.state()?.gpu_scaling)
    }

    fn set_gpu_scaling(&self, _device: u32, enabled: bool) -> Result<bool> {
        self.write(|s| {
            s.gpu_scaling = enabled;
            true
        })
    }

    fn has_scaling_mode_support(&self, _device: u32) -> Result<bool> {
        Ok(self.driver_ready())
    }

    fn scaling_mode(&self, _device: u32) -> Result<i32> {
        Ok(self.state()?.scaling_mode)
    }

    fn set_scaling_mode(&self, _device: u32, mode: i32) -> Result<bool> {
        if !SCALING_MODES.contains(&mode) {
            return Ok(false);
        }
        self.write(|s| {
            s.scaling_mode = mode;
            true
        })
    }

    fn has_rsr_support(&self, _device: u32) -> Result<bool> {
        Ok(self.driver_ready())
    }

    fn rsr(&self, _device: u32) -> Result<bool> {
        Ok(self.state()?.rsr)
    }

    fn set_rsr(&self, _device: u32, enabled: bool) -> Result<bool> {
        self.write(|s| {
            s.rsr = enabled;
            true
        })
    }

    fn rsr_sharpness(&self, _device: u32) -> Result<i32> {
        Ok(self.state()?.rsr_sharpness)
    }

    fn set_rsr_sharpness(&self, _device: u32, sharpness: i32) -> Result<bool> {
        self.write(|s| {
            s.rsr_sharpness = sharpness.clamp(MIN_SHARPNESS, MAX_SHARPNESS);
            true
        })
    }

    fn has_integer_scaling_support(&self, _device: u32) -> Result<bool> {
        Ok(self.driver_ready())
    }

    fn integer_scaling(&self, _device: u32) -> Result<bool> {
        Ok(self.state()?.integer_scaling)
    }

    fn set_integer_scaling(&self, _device: u32, enabled: bool) -> Result<bool> {
        self.write(|s| {
            s.integer_scaling = enabled;
            true
        })
    }

    fn has_image_sharpening_support(&self, _device: u32) -> Result<bool> {
        Ok(self.driver_ready())
    }

    fn image_sharpening(&self, _device: u32) -> Result<bool> {
        Ok(self.state()?.image_sharpening)
    }

    fn set_image_sharpening(&self, _device: u32, enabled: bool) -> Result<bool> {
        self.write(|s| {
            s.image_sharpening = enabled;
            true
        })
    }

    fn image_sharpening_sharpness(&self, _device: u32) -> Result<i32> {
        Ok(self.state()?.image_sharpening_sharpness)
    }

    fn set_image_sharpening_sharpness(&self, _device: u32, sharpness: i32) -> Result<bool> {
        self.write(|s| {
            s.image_sharpening_sharpness = sharpness.clamp(MIN_SHARPNESS, MAX_SHARPNESS);
            true
        })
    }

    fn clock(&self, _device: u32) -> Result<f32> {
        let n = self.next_seed()?;
        let load = load_at(self.elapsed_secs());
        Ok(500.0 + load * 17.0 + jitter(n, 15.0))
    }

    fn load(&self, _device: u32) -> Result<f32> {
        let n = self.next_seed()?;
        Ok((load_at(self.elapsed_secs()) + jitter(n * 1.1, 2.0)).clamp(0.0, 100.0))
    }

    fn power(&self, _device: u32) -> Result<f32> {
        let n = self.next_seed()?;
        let load = load_at(self.elapsed_secs());
        Ok(4.0 + load * 0.22 + jitter(n * 1.2, 0.5))
    }

    fn temperature(&self, _device: u32) -> Result<f32> {
        let n = self.next_seed()?;
        let load = load_at(self.elapsed_secs());
        Ok(42.0 + load * 0.35 + jitter(n * 1.3, 0.4))
    }

    fn vram_usage(&self, _device: u32) -> Result<f32> {
        let n = self.next_seed()?;
        let load = load_at(self.elapsed_secs());
        Ok(600.0 + load * 28.0 + jitter(n * 1.4, 8.0))
    }
}
