//! Shared test helpers: a scripted backend whose answers can change between polls

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use ogw_core::backend::{AdapterInfo, GpuBackend, Vendor};
use ogw_core::model::GpuEvent;
use ogw_engine::{AdapterEngine, EngineConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers the scripted backend gives
#[derive(Debug, Clone)]
pub struct Script {
    pub gpu_scaling_supported: bool,
    pub gpu_scaling: bool,
    pub scaling_mode_supported: bool,
    pub scaling_mode: i32,
    pub rsr_supported: bool,
    pub rsr: bool,
    pub rsr_sharpness: i32,
    pub integer_scaling_supported: bool,
    pub integer_scaling: bool,
    pub image_sharpening: bool,
    pub image_sharpening_sharpness: i32,
    pub clock: f32,
    pub load: f32,
    pub power: f32,
    pub temperature: f32,
    pub vram_usage: f32,
    /// RSR reads return an error
    pub fail_rsr: bool,
    /// Integer scaling reads panic
    pub panic_integer_scaling: bool,
    /// Image sharpening reads sleep this long first
    pub sharpening_delay: Duration,
    /// Every call sleeps this long first
    pub call_delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            gpu_scaling_supported: true,
            gpu_scaling: true,
            scaling_mode_supported: true,
            scaling_mode: 1,
            rsr_supported: true,
            rsr: false,
            rsr_sharpness: 80,
            integer_scaling_supported: true,
            integer_scaling: false,
            image_sharpening: true,
            image_sharpening_sharpness: 40,
            clock: 1800.0,
            load: 55.0,
            power: 14.5,
            temperature: 61.0,
            vram_usage: 2048.0,
            fail_rsr: false,
            panic_integer_scaling: false,
            sharpening_delay: Duration::ZERO,
            call_delay: Duration::ZERO,
        }
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub rsr_probes: AtomicUsize,
    cycles_open: AtomicUsize,
    pub max_cycles_open: AtomicUsize,
    writes: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            ..Default::default()
        })
    }

    pub fn edit(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn script(&self) -> Script {
        self.script.lock().unwrap().clone()
    }

    /// Writes in the order the backend received them
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn call<T>(&self, f: impl FnOnce(&mut Script) -> Result<T>) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.script.lock().unwrap().call_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let result = f(&mut self.script.lock().unwrap());

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn write(&self, what: String, f: impl FnOnce(&mut Script)) -> Result<bool> {
        self.call(|s| {
            f(s);
            Ok(true)
        })?;
        self.writes.lock().unwrap().push(what);
        Ok(true)
    }
}

impl GpuBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn has_gpu_scaling_support(&self, _device: u32) -> Result<bool> {
        // First call of every feature cycle
        let open = self.cycles_open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_cycles_open.fetch_max(open, Ordering::SeqCst);
        self.call(|s| Ok(s.gpu_scaling_supported))
    }

    fn gpu_scaling(&self, _device: u32) -> Result<bool> {
        self.call(|s| Ok(s.gpu_scaling))
    }

    fn set_gpu_scaling(&self, _device: u32, enabled: bool) -> Result<bool> {
        self.write(format!("set_gpu_scaling({})", enabled), |s| s.gpu_scaling = enabled)
    }

    fn has_scaling_mode_support(&self, _device: u32) -> Result<bool> {
        self.call(|s| Ok(s.scaling_mode_supported))
    }

    fn scaling_mode(&self, _device: u32) -> Result<i32> {
        self.call(|s| Ok(s.scaling_mode))
    }

    fn has_rsr_support(&self, _device: u32) -> Result<bool> {
        self.rsr_probes.fetch_add(1, Ordering::SeqCst);
        self.call(|s| Ok(s.rsr_supported))
    }

    fn rsr(&self, _device: u32) -> Result<bool> {
        self.call(|s| {
            if s.fail_rsr {
                return Err(anyhow!("ADLX_FAIL"));
            }
            Ok(s.rsr)
        })
    }

    fn set_rsr(&self, _device: u32, enabled: bool) -> Result<bool> {
        self.write(format!("set_rsr({})", enabled), |s| s.rsr = enabled)
    }

    fn rsr_sharpness(&self, _device: u32) -> Result<i32> {
        self.call(|s| {
            if s.fail_rsr {
                return Err(anyhow!("ADLX_FAIL"));
            }
            Ok(s.rsr_sharpness)
        })
    }

    fn has_integer_scaling_support(&self, _device: u32) -> Result<bool> {
        self.call(|s| Ok(s.integer_scaling_supported))
    }

    fn integer_scaling(&self, _device: u32) -> Result<bool> {
        let panic = self.script.lock().unwrap().panic_integer_scaling;
        if panic {
            panic!("access violation in native library");
        }
        self.call(|s| Ok(s.integer_scaling))
    }

    fn set_integer_scaling(&self, _device: u32, enabled: bool) -> Result<bool> {
        self.write(format!("set_integer_scaling({})", enabled), |s| {
            s.integer_scaling = enabled
        })
    }

    fn image_sharpening(&self, _device: u32) -> Result<bool> {
        let delay = self.script.lock().unwrap().sharpening_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.call(|s| Ok(s.image_sharpening))
    }

    fn set_image_sharpening(&self, _device: u32, enabled: bool) -> Result<bool> {
        self.write(format!("set_image_sharpening({})", enabled), |s| {
            s.image_sharpening = enabled
        })
    }

    fn image_sharpening_sharpness(&self, _device: u32) -> Result<i32> {
        // Last call of every feature cycle
        let result = self.call(|s| Ok(s.image_sharpening_sharpness));
        self.cycles_open.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn clock(&self, _device: u32) -> Result<f32> {
        self.call(|s| Ok(s.clock))
    }

    fn load(&self, _device: u32) -> Result<f32> {
        self.call(|s| Ok(s.load))
    }

    fn power(&self, _device: u32) -> Result<f32> {
        self.call(|s| Ok(s.power))
    }

    fn temperature(&self, _device: u32) -> Result<f32> {
        self.call(|s| Ok(s.temperature))
    }

    fn vram_usage(&self, _device: u32) -> Result<f32> {
        self.call(|s| Ok(s.vram_usage))
    }
}

/// Short timings so tests run in milliseconds
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        update_interval: Duration::from_millis(100),
        telemetry_interval: Duration::from_millis(50),
        execute_timeout: Duration::from_millis(500),
        probe_interval: Duration::from_millis(10),
        probe_window: Duration::from_millis(60),
    }
}

pub fn adapter() -> AdapterInfo {
    AdapterInfo::new(0, "Test GPU", Vendor::Amd)
}

/// Helper: engine over a scripted backend
pub fn engine_with(script: Script, config: EngineConfig) -> (AdapterEngine, Arc<ScriptedBackend>) {
    let backend = ScriptedBackend::new(script);
    let engine = AdapterEngine::new(adapter(), backend.clone(), config);
    (engine, backend)
}

/// Helper: record every event published by the engine
pub fn record(engine: &AdapterEngine) -> Arc<Mutex<Vec<GpuEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.listen(move |e| sink.lock().unwrap().push(e.clone()));
    seen
}

/// Only the change events, telemetry dropped
pub fn changes(seen: &Arc<Mutex<Vec<GpuEvent>>>) -> Vec<GpuEvent> {
    seen.lock()
        .unwrap()
        .iter()
        .filter(|e| e.is_change())
        .cloned()
        .collect()
}
