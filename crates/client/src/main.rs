//! Modifier sandbox binary.
//!
//! Composition root that loads the mod catalog, starts a [`Runtime`] and plays
//! a short scripted session: local attaches, a peer's remote add and remove,
//! an upgrade purchase and a turret firing projectiles. Effective stats are
//! printed after each phase.
//!
//! # Environment
//!
//! - `MOD_DATA_DIR` - directory holding `mods.ron` and `config.toml` (default: builtin data)
//! - `MOD_TICK_RATE`, `MOD_COMMAND_BUFFER`, `MOD_AUTO_TICK` - see [`RuntimeConfig::from_env`]
//! - `RUST_LOG` - tracing filter (default: info)
//!
//! ```bash
//! RUST_LOG=runtime=debug cargo run -p netmod-sandbox
//! ```

use anyhow::{Context, Result};
use strum::IntoEnumIterator;

use netmod_content::ContentFactory;
use netmod_core::{
    BehaviorIndex, EntityId, ModRegistry, Placement, Record, StatKind, TargetKind, UpgradePayload,
    Vec2,
};
use netmod_runtime::{Runtime, RuntimeConfig, RuntimeHandle};

/// Base value every stat starts from in the sandbox.
const BASE_STAT: f32 = 10.0;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // 1. Load content
    let factory = match std::env::var("MOD_DATA_DIR") {
        Ok(dir) => ContentFactory::new(dir),
        Err(_) => ContentFactory::builtin(),
    };
    let registry = factory.load_registry()?;
    let mut config = RuntimeConfig::from_env();
    if std::env::var("MOD_TICK_RATE").is_err() {
        config.mod_config = factory.load_config()?;
    }
    tracing::info!(
        "Loaded {} behaviors from {}",
        registry.len(),
        factory.data_dir().display()
    );

    let names = BehaviorNames::resolve(&registry)?;

    // 2. Build runtime
    let runtime = Runtime::builder()
        .config(config)
        .registry(registry)
        .build()
        .await?;
    let handle = runtime.handle();

    run_session(&handle, &runtime, &names).await?;

    drop(handle);
    runtime.shutdown().await?;
    tracing::info!("Sandbox shutdown complete");
    Ok(())
}

struct BehaviorNames {
    quick_reload: BehaviorIndex,
    reload_upgrade: BehaviorIndex,
    turret: BehaviorIndex,
    /// Record a peer sends to add the overcharge mod.
    peer_overcharge: Record,
}

impl BehaviorNames {
    fn resolve(registry: &ModRegistry) -> Result<Self> {
        let find = |name: &str| {
            registry
                .index_of(name)
                .with_context(|| format!("catalog has no mod named '{name}'"))
        };
        let mut peer_overcharge = Record::encode(Some(find("overcharge")?), 0, 0)?;
        registry.set_defaults(&mut peer_overcharge)?;

        Ok(Self {
            quick_reload: find("quick_reload")?,
            reload_upgrade: find("reload_upgrade")?,
            turret: find("turret")?,
            peer_overcharge,
        })
    }
}

async fn run_session(handle: &RuntimeHandle, runtime: &Runtime, names: &BehaviorNames) -> Result<()> {
    let tank = handle
        .spawn_target(TargetKind::Vehicle, 0, Placement::default())
        .await?;
    let tower = handle
        .spawn_target(
            TargetKind::Structure,
            1,
            Placement {
                position: Vec2::new(0.0, 20.0),
                velocity: Vec2::ZERO,
            },
        )
        .await?;

    // 3. Local attaches
    let quick_reload = handle.attach(tank, names.quick_reload, 0).await?;
    let upgrade = handle.attach(tank, names.reload_upgrade, 0).await?;
    handle.attach(tower, names.turret, 0).await?;
    handle.step(1).await?;
    print_stats(handle, "after local attaches", tank).await?;

    // 4. Upgrade purchase and activation
    let record = handle
        .modify(upgrade, |record| {
            let mut payload = record.view_mut_as::<UpgradePayload>();
            payload.level = Some(1);
            payload.active = true;
        })
        .await?;
    tracing::info!(
        "Upgrade now at level {:?}",
        record.view_as::<UpgradePayload>().level
    );
    handle.step(1).await?;
    print_stats(handle, "after upgrade", tank).await?;

    // 5. A peer adds and later removes a modifier
    let remote = runtime.remote();
    let reply = remote.request_add_with_reply(tank, &names.peer_overcharge.to_bytes())?;
    handle.step(1).await?;
    let overcharge_address = reply.await?.context("peer add was rejected")?;
    print_stats(handle, "after peer overcharge", tank).await?;

    remote.request_remove(quick_reload)?;
    remote.request_remove(overcharge_address)?;
    let report = handle.step(1).await?;
    tracing::info!(
        "Tick {}: {} remote requests applied, {} records torn down",
        report.tick,
        report.remote_applied,
        report.torn_down
    );
    print_stats(handle, "after peer removals", tank).await?;

    // 6. Let the turret fire
    let report = handle.step(60).await?;
    let tick = handle.current_tick().await?;
    println!("\n== turret at {tick} ({} spawned in the last tick) ==", report.spawned);
    for (address, record) in handle.records(tower).await? {
        println!("  {address}: behavior {:?}", record.behavior_index());
    }
    print_stats(handle, "tower", tower).await?;

    Ok(())
}

async fn print_stats(handle: &RuntimeHandle, label: &str, entity: EntityId) -> Result<()> {
    println!("\n== {label} ({entity}) ==");
    for stat in StatKind::iter() {
        let value = handle
            .effective(entity, stat, BASE_STAT)
            .await?
            .with_context(|| format!("entity {entity} no longer exists"))?;
        println!("  {:<12} {:>8.3}", stat.as_ref(), value);
    }
    Ok(())
}
