//! OpenGpuWatch monitor
//!
//! Starts one engine per adapter and prints every event as a line of JSON on
//! stdout until interrupted. Logs go to stderr.
//!
//! Usage: `ogw-monitor [config.json]`, backend chosen with
//! `OGW_BACKEND=demo|sysfs`.

use anyhow::{bail, Result};
use ogw_adapters::{DemoBackend, SysfsBackend};
use ogw_core::backend::{AdapterInfo, GpuBackend, Vendor};
use ogw_engine::{AdapterEngine, EngineConfig};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Pick the backend and the adapters it drives
fn select_backend() -> Result<(Arc<dyn GpuBackend>, Vec<AdapterInfo>)> {
    let requested = std::env::var("OGW_BACKEND").ok();
    let sysfs = SysfsBackend::new();

    match requested.as_deref() {
        Some("demo") => Ok(demo()),
        Some("sysfs") => {
            let adapters = sysfs.enumerate();
            if adapters.is_empty() {
                bail!("OGW_BACKEND=sysfs but no DRM card was found");
            }
            Ok((Arc::new(sysfs), adapters))
        }
        Some(other) => bail!("unknown backend {:?} (expected demo or sysfs)", other),
        None => {
            let adapters = sysfs.enumerate();
            if adapters.is_empty() {
                info!("No DRM card found, using demo backend");
                Ok(demo())
            } else {
                Ok((Arc::new(sysfs), adapters))
            }
        }
    }
}

fn demo() -> (Arc<dyn GpuBackend>, Vec<AdapterInfo>) {
    (
        Arc::new(DemoBackend::new()),
        vec![AdapterInfo::new(0, "Demo GPU", Vendor::Amd)],
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting OpenGpuWatch monitor");

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(Path::new(&path))?,
        None => EngineConfig::default(),
    };

    let (backend, adapters) = select_backend()?;
    info!("Using {} backend for {} adapter(s)", backend.name(), adapters.len());

    let mut engines = Vec::new();
    for adapter in adapters {
        let engine = AdapterEngine::new(adapter, Arc::clone(&backend), config.clone());

        // Print events as NDJSON
        let mut rx = engine.subscribe();
        let name = engine.adapter().name.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_value(&event) {
                        Ok(mut json) => {
                            json["adapter"] = serde_json::Value::String(name.clone());
                            println!("{}", json);
                        }
                        Err(e) => warn!("Cannot serialize {}: {}", event.as_label(), e),
                    },
                    Err(RecvError::Lagged(n)) => warn!("Output lagged, {} events dropped", n),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        engine.start().await?;
        engines.push(engine);
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    for engine in &engines {
        engine.stop().await;
        engine.dispose().await;
    }

    Ok(())
}
