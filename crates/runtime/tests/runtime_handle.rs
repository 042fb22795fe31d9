use std::time::Duration;

use netmod_content::ContentFactory;
use netmod_core::{ModConfig, ModRegistry, Placement, StatKind, TargetKind, Tick};
use netmod_runtime::{Runtime, RuntimeConfig, RuntimeError};

fn registry() -> ModRegistry {
    ContentFactory::builtin()
        .load_registry()
        .expect("builtin catalog should load")
}

#[tokio::test]
async fn test_build_requires_registry() {
    let result = Runtime::builder().build().await;
    assert!(matches!(result, Err(RuntimeError::MissingRegistry)));
}

/// Drives a full session through the async handle: spawn a vehicle, attach a
/// modifier locally, let a peer remove it, and shut down.
#[tokio::test]
async fn test_handle_session() {
    let registry = registry();
    let quick_reload = registry.index_of("quick_reload").expect("defined");
    let runtime = Runtime::builder()
        .registry(registry)
        .build()
        .await
        .expect("runtime should start");
    let handle = runtime.handle();

    let tank = handle
        .spawn_target(TargetKind::Vehicle, 0, Placement::default())
        .await
        .expect("spawn");
    let address = handle
        .attach(tank, quick_reload, 0)
        .await
        .expect("attach");

    let report = handle.step(1).await.expect("step");
    assert_eq!(report.tick, Tick::ZERO);
    assert_eq!(report.dispatched, 1);
    assert_eq!(
        handle
            .effective(tank, StatKind::ReloadTime, 1.0)
            .await
            .expect("query"),
        Some(0.5)
    );

    runtime
        .remote()
        .request_remove(address)
        .expect("remote channel open");
    let report = handle.step(1).await.expect("step");
    assert_eq!(report.remote_applied, 1);
    assert_eq!(report.torn_down, 1);
    assert_eq!(
        handle
            .effective(tank, StatKind::ReloadTime, 1.0)
            .await
            .expect("query"),
        Some(1.0)
    );
    assert!(handle.records(tank).await.expect("query").is_empty());
    assert_eq!(handle.current_tick().await.expect("query"), Tick(1));

    drop(handle);
    runtime.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn test_errors_cross_the_worker_boundary() {
    let registry = registry();
    let speed_cap = registry.index_of("speed_cap").expect("defined");
    let runtime = Runtime::builder()
        .registry(registry)
        .build()
        .await
        .expect("runtime should start");
    let handle = runtime.handle();

    let pilot = handle
        .spawn_target(TargetKind::Character, 0, Placement::default())
        .await
        .expect("spawn");
    let err = handle
        .attach(pilot, speed_cap, 0)
        .await
        .expect_err("speed_cap only applies to vehicles");
    assert!(matches!(err, RuntimeError::RejectedTarget { .. }));

    assert!(handle.destroy_target(pilot).await.expect("destroy"));
    handle.step(1).await.expect("step");
    assert!(handle.target(pilot).await.expect("query").is_none());

    drop(handle);
    runtime.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn test_auto_tick_advances_without_requests() {
    let config = RuntimeConfig {
        mod_config: ModConfig::with_tick_rate(1000),
        auto_tick: true,
        ..RuntimeConfig::default()
    };
    let runtime = Runtime::builder()
        .config(config)
        .registry(registry())
        .build()
        .await
        .expect("runtime should start");
    let handle = runtime.handle();

    let mut advanced = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if handle.current_tick().await.expect("query") > Tick(2) {
            advanced = true;
            break;
        }
    }
    assert!(advanced, "auto tick should advance the clock");

    drop(handle);
    runtime.shutdown().await.expect("clean shutdown");
}

#[test]
fn test_config_defaults() {
    let config = RuntimeConfig::default();
    assert_eq!(config.command_buffer_size, 32);
    assert!(!config.auto_tick);
    assert_eq!(config.mod_config.tick_rate, ModConfig::DEFAULT_TICK_RATE);
}
