//! Serialized, timeout-bounded native calls
//!
//! Every call into a vendor backend goes through [`Executor`]. Calls run on
//! tokio's blocking pool under the executor's lock, so at most one native call
//! per engine is in flight (an abandoned call that timed out may still be
//! running in the background). The lock is owned by a supervising task rather
//! than the caller: a caller that is cancelled mid-call leaves the lock held
//! until the native call finishes or times out. The [`HaltGate`] blocks new
//! calls while the engine is stopped.
//!
//! ```text
//! caller ──► wait for gate open ──► lock ──► spawn(supervisor) ──► result / default
//!                  ▲                  │              │
//!                  └── gate closed ◄──┘   spawn_blocking(op), timeout, unlock
//! ```

use crate::error::ExecuteError;
use ogw_core::backend::GpuBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// Two-state gate: open while the engine operates, closed while halted
pub struct HaltGate {
    state: watch::Sender<bool>,
}

impl HaltGate {
    pub fn new(open: bool) -> Self {
        let (state, _) = watch::channel(open);
        Self { state }
    }

    pub fn open(&self) {
        self.state.send_replace(true);
    }

    pub fn close(&self) {
        self.state.send_replace(false);
    }

    pub fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// Wait until the gate is open; returns immediately if it already is
    pub async fn wait_open(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// Runs native calls against one device of one backend
pub struct Executor {
    backend: Arc<dyn GpuBackend>,
    device: u32,
    timeout: Duration,
    lock: Arc<Mutex<()>>,
    gate: HaltGate,
}

impl Executor {
    pub fn new(backend: Arc<dyn GpuBackend>, device: u32, timeout: Duration) -> Self {
        Self {
            backend,
            device,
            timeout,
            lock: Arc::new(Mutex::new(())),
            gate: HaltGate::new(true),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_halted(&self) -> bool {
        !self.gate.is_open()
    }

    /// Run `op`, returning `default` on timeout, error or panic
    pub async fn execute<T, F>(&self, op: F, default: T) -> T
    where
        T: Send + 'static,
        F: FnOnce(&dyn GpuBackend, u32) -> anyhow::Result<T> + Send + 'static,
    {
        self.try_execute(op).await.unwrap_or(default)
    }

    /// Run `op`, reporting why no value was produced
    pub async fn try_execute<T, F>(&self, op: F) -> Result<T, ExecuteError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn GpuBackend, u32) -> anyhow::Result<T> + Send + 'static,
    {
        let guard = self.acquire().await;

        let backend = Arc::clone(&self.backend);
        let device = self.device;
        let timeout = self.timeout;
        let supervisor = tokio::spawn(async move {
            let task = tokio::task::spawn_blocking(move || op(backend.as_ref(), device));
            // Dropping the join handle on timeout detaches the call.
            let outcome = tokio::time::timeout(timeout, task).await;
            drop(guard);
            outcome
        });

        let result = match supervisor.await {
            Ok(Ok(Ok(Ok(value)))) => Ok(value),
            Ok(Ok(Ok(Err(e)))) => Err(ExecuteError::Failed(format!("{:#}", e))),
            Ok(Ok(Err(_))) | Err(_) => Err(ExecuteError::Panicked),
            Ok(Err(_)) => Err(ExecuteError::Timeout(timeout)),
        };

        if let Err(ref e) = result {
            match e {
                ExecuteError::Failed(msg) => {
                    debug!("{} call on device {} failed: {}", self.backend.name(), device, msg)
                }
                _ => warn!("{} call on device {}: {}", self.backend.name(), device, e),
            }
        }
        result
    }

    /// Close the gate and wait for the call currently holding the lock, if any
    ///
    /// A call whose caller was cancelled still counts until its native
    /// invocation finishes or times out.
    pub async fn halt(&self) {
        self.gate.close();
        drop(self.lock.lock().await);
    }

    /// Open the gate; callers blocked on it proceed
    pub fn resume(&self) {
        self.gate.open();
    }

    /// Hold the call lock with the gate open
    ///
    /// The gate is re-checked under the lock so nothing that queued before a
    /// halt slips through after it.
    async fn acquire(&self) -> OwnedMutexGuard<()> {
        loop {
            self.gate.wait_open().await;
            let guard = Arc::clone(&self.lock).lock_owned().await;
            if self.gate.is_open() {
                return guard;
            }
        }
    }

    /// Whether a native call currently holds the lock
    pub fn is_calling(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
