//! Subscriber registration and event dispatch
//!
//! Two ways to receive events:
//! - Callbacks registered with [`EventHub::listen`], invoked synchronously on
//!   the polling task that produced the event.
//! - A tokio broadcast channel ([`EventHub::subscribe`]) for async consumers.
//!   Slow receivers lag and miss events; the engine never waits for them.

use ogw_core::model::GpuEvent;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::warn;

/// Capacity of the broadcast channel
const CHANNEL_CAPACITY: usize = 64;

/// Callback invoked for every published event
pub type Listener = Arc<dyn Fn(&GpuEvent) + Send + Sync>;

/// Identifies a registered listener so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

pub struct EventHub {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerHandle, Listener)>>,
    tx: broadcast::Sender<GpuEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Register a callback for every event
    pub fn listen<F>(&self, f: F) -> ListenerHandle
    where
        F: Fn(&GpuEvent) + Send + Sync + 'static,
    {
        let handle = ListenerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((handle, Arc::new(f)));
        handle
    }

    /// Remove a callback; returns false if it was not registered
    pub fn unlisten(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(h, _)| *h != handle);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Subscribe to events over a broadcast channel
    pub fn subscribe(&self) -> broadcast::Receiver<GpuEvent> {
        self.tx.subscribe()
    }

    /// Deliver an event to every listener, then to the broadcast channel
    ///
    /// Listeners are snapshotted first, so a callback may register or remove
    /// listeners. A panicking listener is logged and skipped.
    pub fn publish(&self, event: GpuEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                warn!("Listener panicked while handling {}", event.as_label());
            }
        }

        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
