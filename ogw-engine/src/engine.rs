//! Per-adapter polling engine
//!
//! This module handles:
//! - Starting/stopping the feature and telemetry timers
//! - Gating native access while the engine is halted
//! - Facet accessors, all routed through the serialized [`Executor`]
//! - Subscriber registration for the change events

use crate::config::EngineConfig;
use crate::cycle::FacetCache;
use crate::error::EngineError;
use crate::events::{EventHub, ListenerHandle};
use crate::execute::Executor;
use ogw_core::backend::{AdapterInfo, GpuBackend};
use ogw_core::model::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// State shared between the engine handle and its timer tasks
pub(crate) struct EngineInner {
    pub(crate) adapter: AdapterInfo,
    pub(crate) config: EngineConfig,
    pub(crate) executor: Executor,
    pub(crate) events: EventHub,
    /// Held for the whole feature cycle; guards the published-state cache
    pub(crate) update_lock: tokio::sync::Mutex<FacetCache>,
    /// Held for the whole telemetry cycle
    pub(crate) telemetry_lock: tokio::sync::Mutex<()>,
    latest_telemetry: Mutex<Option<TelemetrySample>>,
}

impl EngineInner {
    pub(crate) fn store_telemetry(&self, sample: TelemetrySample) {
        *self
            .latest_telemetry
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sample);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Features,
    Telemetry,
}

/// Running timer tasks
struct Timers {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Polling and change-notification engine for one physical adapter
pub struct AdapterEngine {
    inner: Arc<EngineInner>,
    timers: Mutex<Option<Timers>>,
    disposed: AtomicBool,
}

impl AdapterEngine {
    pub fn new(adapter: AdapterInfo, backend: Arc<dyn GpuBackend>, config: EngineConfig) -> Self {
        let executor = Executor::new(backend, adapter.device_index, config.execute_timeout);
        Self {
            inner: Arc::new(EngineInner {
                adapter,
                config,
                executor,
                events: EventHub::new(),
                update_lock: tokio::sync::Mutex::new(FacetCache::default()),
                telemetry_lock: tokio::sync::Mutex::new(()),
                latest_telemetry: Mutex::new(None),
            }),
            timers: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn adapter(&self) -> &AdapterInfo {
        &self.inner.adapter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn backend_name(&self) -> &str {
        self.inner.executor.backend_name()
    }

    /// Whether the timers are armed
    pub fn is_running(&self) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Whether either polling cycle is currently in progress
    pub fn is_busy(&self) -> bool {
        self.inner.update_lock.try_lock().is_err() || self.inner.telemetry_lock.try_lock().is_err()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Open the halt gate and arm both timers
    ///
    /// Calling `start` on a running engine only re-opens the gate.
    pub async fn start(&self) -> Result<(), EngineError> {
        if self.is_disposed() {
            return Err(EngineError::Disposed);
        }

        // Release halted callers before the first tick can queue behind them.
        self.inner.executor.resume();

        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        if timers.is_some() {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let tasks = [Cycle::Features, Cycle::Telemetry]
            .into_iter()
            .map(|cycle| {
                tokio::spawn(run_timer(
                    Arc::clone(&self.inner),
                    cycle,
                    cancel.clone(),
                ))
            })
            .collect();
        *timers = Some(Timers { cancel, tasks });

        info!(
            "Engine for {} ({}) started",
            self.inner.adapter.name,
            self.backend_name()
        );
        Ok(())
    }

    /// Disarm both timers and close the halt gate
    ///
    /// Returns once no tick is running and the native call holding the lock,
    /// if any, has finished or timed out. Accessor calls made afterwards block
    /// until the next [`start`](Self::start).
    pub async fn stop(&self) {
        let timers = self.take_timers();
        self.inner.executor.halt().await;

        if let Some(timers) = timers {
            join_timers(timers).await;
            info!("Engine for {} stopped", self.inner.adapter.name);
        }
    }

    /// Release the timers for good
    ///
    /// Safe to call after [`stop`](Self::stop) and more than once. The halt
    /// gate is left as it is.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(timers) = self.take_timers() {
            join_timers(timers).await;
        }
        info!("Engine for {} disposed", self.inner.adapter.name);
    }

    fn take_timers(&self) -> Option<Timers> {
        let timers = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ref t) = timers {
            t.cancel.cancel();
        }
        timers
    }

    /// Run one feature cycle now
    pub async fn poll_features(&self) {
        self.inner.update_cycle().await;
    }

    /// Run one telemetry cycle now
    pub async fn poll_telemetry(&self) {
        self.inner.telemetry_cycle().await;
    }

    /// Most recent telemetry sample, if a telemetry cycle has completed
    pub fn latest_telemetry(&self) -> Option<TelemetrySample> {
        self.inner
            .latest_telemetry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // === Subscriptions ===

    /// Subscribe to every event over a broadcast channel
    pub fn subscribe(&self) -> broadcast::Receiver<GpuEvent> {
        self.inner.events.subscribe()
    }

    /// Register a callback for every event
    pub fn listen<F>(&self, f: F) -> ListenerHandle
    where
        F: Fn(&GpuEvent) + Send + Sync + 'static,
    {
        self.inner.events.listen(f)
    }

    pub fn unlisten(&self, handle: ListenerHandle) -> bool {
        self.inner.events.unlisten(handle)
    }

    pub fn on_gpu_scaling_changed<F>(&self, f: F) -> ListenerHandle
    where
        F: Fn(GpuScalingState) + Send + Sync + 'static,
    {
        self.listen(move |e| {
            if let GpuEvent::GpuScalingChanged(state) = e {
                f(*state)
            }
        })
    }

    pub fn on_rsr_changed<F>(&self, f: F) -> ListenerHandle
    where
        F: Fn(RsrState) + Send + Sync + 'static,
    {
        self.listen(move |e| {
            if let GpuEvent::RsrChanged(state) = e {
                f(*state)
            }
        })
    }

    pub fn on_integer_scaling_changed<F>(&self, f: F) -> ListenerHandle
    where
        F: Fn(IntegerScalingState) + Send + Sync + 'static,
    {
        self.listen(move |e| {
            if let GpuEvent::IntegerScalingChanged(state) = e {
                f(*state)
            }
        })
    }

    pub fn on_image_sharpening_changed<F>(&self, f: F) -> ListenerHandle
    where
        F: Fn(ImageSharpeningState) + Send + Sync + 'static,
    {
        self.listen(move |e| {
            if let GpuEvent::ImageSharpeningChanged(state) = e {
                f(*state)
            }
        })
    }

    pub fn on_telemetry<F>(&self, f: F) -> ListenerHandle
    where
        F: Fn(&TelemetrySample) + Send + Sync + 'static,
    {
        self.listen(move |e| {
            if let GpuEvent::Telemetry(sample) = e {
                f(sample)
            }
        })
    }

    // === Support queries ===

    pub async fn has_gpu_scaling_support(&self) -> bool {
        self.inner
            .executor
            .execute(|b, d| b.has_gpu_scaling_support(d), false)
            .await
    }

    pub async fn has_scaling_mode_support(&self) -> bool {
        self.inner
            .executor
            .execute(|b, d| b.has_scaling_mode_support(d), false)
            .await
    }

    pub async fn has_rsr_support(&self) -> bool {
        self.inner
            .executor
            .execute(|b, d| b.has_rsr_support(d), false)
            .await
    }

    pub async fn has_integer_scaling_support(&self) -> bool {
        self.inner
            .executor
            .execute(|b, d| b.has_integer_scaling_support(d), false)
            .await
    }

    pub async fn has_image_sharpening_support(&self) -> bool {
        self.inner
            .executor
            .execute(|b, d| b.has_image_sharpening_support(d), false)
            .await
    }

    // === Reads ===

    pub async fn gpu_scaling(&self) -> bool {
        self.inner.executor.execute(|b, d| b.gpu_scaling(d), false).await
    }

    /// Current scaling mode, `-1` if unknown
    pub async fn scaling_mode(&self) -> i32 {
        self.inner
            .executor
            .execute(|b, d| b.scaling_mode(d), UNKNOWN_LEVEL)
            .await
    }

    pub async fn rsr(&self) -> bool {
        self.inner.executor.execute(|b, d| b.rsr(d), false).await
    }

    /// Current RSR sharpness, `-1` if unknown
    pub async fn rsr_sharpness(&self) -> i32 {
        self.inner
            .executor
            .execute(|b, d| b.rsr_sharpness(d), UNKNOWN_LEVEL)
            .await
    }

    pub async fn integer_scaling(&self) -> bool {
        self.inner
            .executor
            .execute(|b, d| b.integer_scaling(d), false)
            .await
    }

    pub async fn image_sharpening(&self) -> bool {
        self.inner
            .executor
            .execute(|b, d| b.image_sharpening(d), false)
            .await
    }

    /// Current image sharpening sharpness, `-1` if unknown
    pub async fn image_sharpening_sharpness(&self) -> i32 {
        self.inner
            .executor
            .execute(|b, d| b.image_sharpening_sharpness(d), UNKNOWN_LEVEL)
            .await
    }

    pub async fn clock(&self) -> f32 {
        self.inner.executor.execute(|b, d| b.clock(d), 0.0).await
    }

    pub async fn load(&self) -> f32 {
        self.inner.executor.execute(|b, d| b.load(d), 0.0).await
    }

    pub async fn power(&self) -> f32 {
        self.inner.executor.execute(|b, d| b.power(d), 0.0).await
    }

    pub async fn temperature(&self) -> f32 {
        self.inner
            .executor
            .execute(|b, d| b.temperature(d), 0.0)
            .await
    }

    pub async fn vram_usage(&self) -> f32 {
        self.inner
            .executor
            .execute(|b, d| b.vram_usage(d), 0.0)
            .await
    }

    // === Writes ===

    pub async fn set_gpu_scaling(&self, enabled: bool) -> bool {
        self.inner
            .executor
            .execute(move |b, d| b.set_gpu_scaling(d, enabled), false)
            .await
    }

    pub async fn set_scaling_mode(&self, mode: i32) -> bool {
        self.inner
            .executor
            .execute(move |b, d| b.set_scaling_mode(d, mode), false)
            .await
    }

    /// Enable or disable integer scaling
    ///
    /// Integer scaling and RSR are mutually exclusive: enabling integer
    /// scaling first turns RSR off. Both steps run as one native call.
    pub async fn set_integer_scaling(&self, enabled: bool) -> bool {
        self.inner
            .executor
            .execute(
                move |b, d| {
                    if enabled && b.rsr(d)? {
                        b.set_rsr(d, false)?;
                    }
                    b.set_integer_scaling(d, enabled)
                },
                false,
            )
            .await
    }

    /// Enable or disable RSR
    ///
    /// Enabling RSR first turns off integer scaling and image sharpening.
    pub async fn set_rsr(&self, enabled: bool) -> bool {
        self.inner
            .executor
            .execute(
                move |b, d| {
                    if enabled {
                        if b.integer_scaling(d)? {
                            b.set_integer_scaling(d, false)?;
                        }
                        if b.image_sharpening(d)? {
                            b.set_image_sharpening(d, false)?;
                        }
                    }
                    b.set_rsr(d, enabled)
                },
                false,
            )
            .await
    }

    pub async fn set_rsr_sharpness(&self, sharpness: i32) -> bool {
        self.inner
            .executor
            .execute(move |b, d| b.set_rsr_sharpness(d, sharpness), false)
            .await
    }

    pub async fn set_image_sharpening(&self, enabled: bool) -> bool {
        self.inner
            .executor
            .execute(move |b, d| b.set_image_sharpening(d, enabled), false)
            .await
    }

    pub async fn set_image_sharpening_sharpness(&self, sharpness: i32) -> bool {
        self.inner
            .executor
            .execute(
                move |b, d| b.set_image_sharpening_sharpness(d, sharpness),
                false,
            )
            .await
    }
}

impl Drop for AdapterEngine {
    fn drop(&mut self) {
        // Timer tasks exit at their next await point.
        let _ = self.take_timers();
    }
}

async fn join_timers(timers: Timers) {
    for task in timers.tasks {
        if let Err(e) = task.await {
            warn!("Timer task ended abnormally: {}", e);
        }
    }
}

/// Timer loop for one cycle
///
/// Ticks of the same cycle never overlap: the next tick is only awaited once
/// the previous cycle has finished, and a late tick is delayed rather than
/// bunched up. Cancellation interrupts a cycle at its next await point, never
/// between publishing a group and recording it. A native call in flight at
/// that moment keeps the executor lock until it finishes or times out.
async fn run_timer(inner: Arc<EngineInner>, cycle: Cycle, cancel: CancellationToken) {
    let period = match cycle {
        Cycle::Features => inner.config.update_interval,
        Cycle::Telemetry => inner.config.telemetry_interval,
    };
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let body = async {
            match cycle {
                Cycle::Features => inner.update_cycle().await,
                Cycle::Telemetry => inner.telemetry_cycle().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = body => {}
        }
    }
}
