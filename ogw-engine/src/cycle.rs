//! Polling cycles and edge-triggered change detection
//!
//! The feature cycle reads each group, compares it with the last state
//! delivered to subscribers and publishes only on a transition. Groups are
//! independent: a group whose reads fail is skipped for this tick and its
//! cached state is left alone, so a timeout can never masquerade as a change.
//!
//! The telemetry cycle has no change detection and publishes every tick.

use crate::engine::EngineInner;
use crate::error::ExecuteError;
use chrono::Utc;
use ogw_core::backend::GpuBackend;
use ogw_core::model::*;
use ogw_core::units::*;
use tokio::time::Instant;
use tracing::debug;

/// Last published value of one group
///
/// Starts out unobserved, so the first evaluated state always counts as a
/// transition regardless of its value.
#[derive(Debug)]
pub struct Slot<T> {
    previous: Option<T>,
}

impl<T: Copy + PartialEq> Slot<T> {
    pub fn new() -> Self {
        Self { previous: None }
    }

    /// Record `current`; returns it if it differs from the last published state
    pub fn transition(&mut self, current: T) -> Option<T> {
        if self.previous == Some(current) {
            return None;
        }
        self.previous = Some(current);
        Some(current)
    }

    pub fn previous(&self) -> Option<T> {
        self.previous
    }
}

impl<T: Copy + PartialEq> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-engine cache of published group states
///
/// Lives behind the feature cycle lock and is only touched by the cycle.
#[derive(Debug, Default)]
pub struct FacetCache {
    pub gpu_scaling: Slot<GpuScalingState>,
    pub rsr: Slot<RsrState>,
    pub integer_scaling: Slot<IntegerScalingState>,
    pub image_sharpening: Slot<ImageSharpeningState>,
}

impl EngineInner {
    /// One tick of the feature cycle
    pub(crate) async fn update_cycle(&self) {
        let mut cache = self.update_lock.lock().await;

        match self.read_gpu_scaling().await {
            Ok(state) => {
                if let Some(state) = cache.gpu_scaling.transition(state) {
                    self.announce(GpuEvent::GpuScalingChanged(state));
                }
            }
            Err(e) => self.skip("gpu scaling", &e),
        }

        match self.read_rsr().await {
            Ok(state) => {
                if let Some(state) = cache.rsr.transition(state) {
                    self.announce(GpuEvent::RsrChanged(state));
                }
            }
            Err(e) => self.skip("rsr", &e),
        }

        match self.read_integer_scaling().await {
            Ok(state) => {
                if let Some(state) = cache.integer_scaling.transition(state) {
                    self.announce(GpuEvent::IntegerScalingChanged(state));
                }
            }
            Err(e) => self.skip("integer scaling", &e),
        }

        match self.read_image_sharpening().await {
            Ok(state) => {
                if let Some(state) = cache.image_sharpening.transition(state) {
                    self.announce(GpuEvent::ImageSharpeningChanged(state));
                }
            }
            Err(e) => self.skip("image sharpening", &e),
        }
    }

    /// One tick of the telemetry cycle
    ///
    /// Failed readings fall back to zero; the sample is published anyway.
    pub(crate) async fn telemetry_cycle(&self) {
        let _guard = self.telemetry_lock.lock().await;
        let ex = &self.executor;

        let clock = ex.execute(|b, d| b.clock(d), 0.0).await;
        let load = ex.execute(|b, d| b.load(d), 0.0).await;
        let power = ex.execute(|b, d| b.power(d), 0.0).await;
        let temperature = ex.execute(|b, d| b.temperature(d), 0.0).await;
        let vram_usage = ex.execute(|b, d| b.vram_usage(d), 0.0).await;

        let sample = TelemetrySample {
            timestamp: Utc::now(),
            clock: Megahertz(clock),
            load: Percentage::new(load),
            power: Watts(power),
            temperature: Celsius(temperature),
            vram_usage: Megabytes(vram_usage),
        };

        self.store_telemetry(sample.clone());
        self.events.publish(GpuEvent::Telemetry(sample));
    }

    async fn read_gpu_scaling(&self) -> Result<GpuScalingState, ExecuteError> {
        let ex = &self.executor;

        let supported = ex.try_execute(|b, d| b.has_gpu_scaling_support(d)).await?;
        let enabled = if supported {
            ex.try_execute(|b, d| b.gpu_scaling(d)).await?
        } else {
            false
        };

        let mode = if ex.try_execute(|b, d| b.has_scaling_mode_support(d)).await? {
            ex.try_execute(|b, d| b.scaling_mode(d)).await?
        } else {
            0
        };

        Ok(GpuScalingState {
            supported,
            enabled,
            mode,
        })
    }

    async fn read_rsr(&self) -> Result<RsrState, ExecuteError> {
        if !self.probe_support(|b, d| b.has_rsr_support(d)).await? {
            return Ok(RsrState::unsupported());
        }

        let ex = &self.executor;
        let enabled = ex.try_execute(|b, d| b.rsr(d)).await?;
        let sharpness = ex.try_execute(|b, d| b.rsr_sharpness(d)).await?;

        Ok(RsrState {
            supported: true,
            enabled,
            sharpness,
        })
    }

    async fn read_integer_scaling(&self) -> Result<IntegerScalingState, ExecuteError> {
        let supported = self
            .probe_support(|b, d| b.has_integer_scaling_support(d))
            .await?;
        let enabled = if supported {
            self.executor.try_execute(|b, d| b.integer_scaling(d)).await?
        } else {
            false
        };

        Ok(IntegerScalingState { supported, enabled })
    }

    async fn read_image_sharpening(&self) -> Result<ImageSharpeningState, ExecuteError> {
        let ex = &self.executor;
        let enabled = ex.try_execute(|b, d| b.image_sharpening(d)).await?;
        let sharpness = ex.try_execute(|b, d| b.image_sharpening_sharpness(d)).await?;

        Ok(ImageSharpeningState { enabled, sharpness })
    }

    /// Ask for support repeatedly until it is reported or the probe window closes
    ///
    /// Some drivers finish initialising only after the first ticks following a
    /// resume. Returns the last outcome once the window is exhausted.
    async fn probe_support<F>(&self, probe: F) -> Result<bool, ExecuteError>
    where
        F: Fn(&dyn GpuBackend, u32) -> anyhow::Result<bool> + Clone + Send + 'static,
    {
        let interval = self.config.probe_interval;
        let deadline = Instant::now() + self.config.probe_window;

        loop {
            let outcome = self.executor.try_execute(probe.clone()).await;
            if matches!(outcome, Ok(true)) || Instant::now() + interval > deadline {
                return outcome;
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn announce(&self, event: GpuEvent) {
        debug!("{}: {:?}", self.adapter.name, event);
        self.events.publish(event);
    }

    fn skip(&self, group: &str, error: &ExecuteError) {
        debug!(
            "{}: skipping {} this tick ({})",
            self.adapter.name,
            group,
            error.as_label()
        );
    }
}
