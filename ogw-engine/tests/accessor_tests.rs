//! Facet accessor tests: defaults, exclusivity and call serialization

mod common;

use common::*;
use ogw_adapters::DemoBackend;
use ogw_core::backend::NullBackend;
use ogw_core::model::*;
use ogw_engine::{AdapterEngine, EngineConfig};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_accessors_pass_through_backend_values() {
    let (engine, _backend) = engine_with(Script::default(), fast_config());

    assert!(engine.has_gpu_scaling_support().await);
    assert!(engine.has_rsr_support().await);
    assert!(engine.gpu_scaling().await);
    assert_eq!(engine.scaling_mode().await, 1);
    assert_eq!(engine.rsr_sharpness().await, 80);
    assert_eq!(engine.image_sharpening_sharpness().await, 40);
    assert_eq!(engine.clock().await, 1800.0);
    assert_eq!(engine.temperature().await, 61.0);
}

#[tokio::test]
async fn test_null_backend_accessors_return_safe_defaults() {
    let engine = AdapterEngine::new(adapter(), Arc::new(NullBackend), fast_config());

    assert!(!engine.has_gpu_scaling_support().await);
    assert!(!engine.has_scaling_mode_support().await);
    assert!(!engine.has_rsr_support().await);
    assert!(!engine.has_integer_scaling_support().await);
    assert!(!engine.has_image_sharpening_support().await);
    assert!(!engine.rsr().await);
    assert!(!engine.set_rsr(true).await);
    assert!(!engine.set_integer_scaling(true).await);
    assert!(!engine.set_scaling_mode(2).await);
    assert_eq!(engine.power().await, 0.0);
    assert_eq!(engine.vram_usage().await, 0.0);
}

#[tokio::test]
async fn test_failed_reads_return_unknown_sentinel() {
    let script = Script {
        fail_rsr: true,
        ..Default::default()
    };
    let (engine, _backend) = engine_with(script, fast_config());

    assert!(!engine.rsr().await);
    assert_eq!(engine.rsr_sharpness().await, UNKNOWN_LEVEL);
}

#[tokio::test]
async fn test_panicking_read_returns_default() {
    let script = Script {
        integer_scaling: true,
        panic_integer_scaling: true,
        ..Default::default()
    };
    let (engine, _backend) = engine_with(script, fast_config());

    assert!(!engine.integer_scaling().await);
    // The engine is still usable afterwards.
    assert!(engine.gpu_scaling().await);
}

#[tokio::test]
async fn test_slow_read_times_out_with_default() {
    let config = EngineConfig {
        execute_timeout: Duration::from_millis(50),
        ..fast_config()
    };
    let script = Script {
        call_delay: Duration::from_millis(300),
        ..Default::default()
    };
    let (engine, _backend) = engine_with(script, config);

    let started = Instant::now();
    let mode = engine.scaling_mode().await;
    let elapsed = started.elapsed();

    assert_eq!(mode, UNKNOWN_LEVEL);
    assert!(elapsed < Duration::from_millis(250), "blocked for {:?}", elapsed);
}

#[tokio::test]
async fn test_enabling_integer_scaling_disables_rsr_first() {
    let script = Script {
        rsr: true,
        integer_scaling: false,
        ..Default::default()
    };
    let (engine, backend) = engine_with(script, fast_config());

    assert!(engine.set_integer_scaling(true).await);

    let state = backend.script();
    assert!(!state.rsr);
    assert!(state.integer_scaling);
    assert_eq!(
        backend.writes(),
        vec!["set_rsr(false)".to_string(), "set_integer_scaling(true)".to_string()]
    );
}

#[tokio::test]
async fn test_enabling_rsr_disables_integer_scaling_and_sharpening() {
    let script = Script {
        rsr: false,
        integer_scaling: true,
        image_sharpening: true,
        ..Default::default()
    };
    let (engine, backend) = engine_with(script, fast_config());

    assert!(engine.set_rsr(true).await);

    let state = backend.script();
    assert!(state.rsr);
    assert!(!state.integer_scaling);
    assert!(!state.image_sharpening);
    assert_eq!(
        backend.writes(),
        vec![
            "set_integer_scaling(false)".to_string(),
            "set_image_sharpening(false)".to_string(),
            "set_rsr(true)".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_disabling_leaves_other_facets_alone() {
    let script = Script {
        rsr: true,
        integer_scaling: true,
        ..Default::default()
    };
    let (engine, backend) = engine_with(script, fast_config());

    assert!(engine.set_integer_scaling(false).await);
    assert!(engine.set_rsr(false).await);

    assert_eq!(
        backend.writes(),
        vec!["set_integer_scaling(false)".to_string(), "set_rsr(false)".to_string()]
    );
}

#[tokio::test]
async fn test_enabling_when_nothing_conflicts_writes_once() {
    let (engine, backend) = engine_with(Script::default(), fast_config());

    assert!(engine.set_integer_scaling(true).await);
    assert_eq!(backend.writes(), vec!["set_integer_scaling(true)".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_never_overlap_natively() {
    let script = Script {
        call_delay: Duration::from_millis(20),
        ..Default::default()
    };
    let (engine, backend) = engine_with(script, fast_config());
    let engine = Arc::new(engine);

    let mut calls = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&engine);
        calls.push(tokio::spawn(async move {
            if i % 2 == 0 {
                engine.gpu_scaling().await;
            } else {
                engine.set_scaling_mode(2).await;
            }
        }));
    }
    for call in calls {
        call.await.unwrap();
    }

    assert_eq!(backend.calls.load(Ordering::SeqCst), 8);
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_exclusive_write_then_poll_reports_both_groups() {
    let script = Script {
        rsr: true,
        ..Default::default()
    };
    let (engine, _backend) = engine_with(script, fast_config());
    let seen = record(&engine);

    engine.poll_features().await;
    engine.set_integer_scaling(true).await;
    engine.poll_features().await;

    let events = changes(&seen);
    assert_eq!(events.len(), 6);
    assert!(events[4..].contains(&GpuEvent::RsrChanged(RsrState {
        supported: true,
        enabled: false,
        sharpness: 80,
    })));
    assert!(events[4..].contains(&GpuEvent::IntegerScalingChanged(IntegerScalingState {
        supported: true,
        enabled: true,
    })));
}

#[tokio::test]
async fn test_demo_backend_end_to_end() {
    let backend = Arc::new(DemoBackend::new().with_driver_delay(Duration::from_millis(40)));
    let config = EngineConfig {
        probe_window: Duration::from_millis(400),
        ..fast_config()
    };
    let engine = AdapterEngine::new(adapter(), backend, config);
    let seen = record(&engine);

    engine.poll_features().await;

    let events = changes(&seen);
    assert!(events.iter().any(|e| matches!(
        e,
        GpuEvent::RsrChanged(RsrState { supported: true, .. })
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        GpuEvent::IntegerScalingChanged(IntegerScalingState { supported: true, .. })
    )));

    assert!(engine.set_rsr(true).await);
    assert!(engine.set_integer_scaling(true).await);
    assert!(!engine.rsr().await);
    assert_eq!(engine.backend_name(), "Demo");
}
