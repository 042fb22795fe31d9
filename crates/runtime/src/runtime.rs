//! High-level runtime orchestrator.
//!
//! The runtime owns the simulation worker, wires up the command and remote
//! channels, and exposes a builder-based API for clients.

use std::env;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use netmod_core::{ModConfig, ModRegistry};

use crate::api::{Result, RuntimeError, RuntimeHandle};
use crate::remote::RemoteSender;
use crate::simulation::Simulation;
use crate::workers::SimulationWorker;

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mod_config: ModConfig,
    pub command_buffer_size: usize,
    /// Step the simulation on a wall-clock interval of one tick.
    pub auto_tick: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mod_config: ModConfig::default(),
            command_buffer_size: 32,
            auto_tick: false,
        }
    }
}

impl RuntimeConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `MOD_TICK_RATE` - Fixed ticks per second (default: 60)
    /// - `MOD_COMMAND_BUFFER` - Command queue size (default: 32)
    /// - `MOD_AUTO_TICK` - Advance on a timer instead of on request (default: false)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(rate) = read_env::<u32>("MOD_TICK_RATE") {
            config.mod_config = ModConfig::with_tick_rate(rate.max(1));
        }
        if let Some(capacity) = read_env::<usize>("MOD_COMMAND_BUFFER") {
            config.command_buffer_size = capacity.max(1);
        }
        if let Some(auto_tick) = read_env_bool("MOD_AUTO_TICK") {
            config.auto_tick = auto_tick;
        }

        config
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

fn read_env_bool(key: &str) -> Option<bool> {
    let value = env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Main runtime that drives the modifier simulation.
///
/// [`RuntimeHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    handle: RuntimeHandle,
    sim_worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Sender for remote record mutations.
    pub fn remote(&self) -> RemoteSender {
        self.handle.remote().clone()
    }

    /// Shutdown the runtime gracefully.
    ///
    /// The worker stops once every handle clone has been dropped.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);

        self.sim_worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)?;

        Ok(())
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    registry: Option<Arc<ModRegistry>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            registry: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the required mod registry. Every peer must use the same one.
    pub fn registry(mut self, registry: impl Into<Arc<ModRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Spawn the simulation worker and return the running runtime.
    pub async fn build(self) -> Result<Runtime> {
        let registry = self.registry.ok_or(RuntimeError::MissingRegistry)?;

        info!(
            target: "runtime",
            behaviors = registry.len(),
            fingerprint = %hex::encode(registry.fingerprint()),
            tick_rate = self.config.mod_config.tick_rate,
            "Building runtime"
        );

        let simulation = Simulation::new(registry, self.config.mod_config.clone());
        let remote = simulation.remote();

        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer_size);
        let auto_tick = self
            .config
            .auto_tick
            .then(|| self.config.mod_config.tick_duration());
        let worker = SimulationWorker::new(simulation, command_rx, auto_tick);
        let sim_worker_handle = tokio::spawn(worker.run());

        Ok(Runtime {
            handle: RuntimeHandle::new(command_tx, remote),
            sim_worker_handle,
        })
    }
}
