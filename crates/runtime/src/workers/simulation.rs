//! Simulation worker that owns the authoritative [`Simulation`].
//!
//! Receives commands from [`RuntimeHandle`](crate::RuntimeHandle) and, when
//! auto-ticking is enabled, advances the simulation on a fixed interval.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info};

use netmod_core::{
    BehaviorIndex, EntityId, ModTarget, Placement, Record, StatKind, TargetKind, Tick,
};

use crate::api::Result;
use crate::simulation::{Simulation, TickReport};
use crate::world::RecordAddress;

/// In-place edit applied to a record inside the worker.
pub type RecordEdit = Box<dyn FnOnce(&mut Record) + Send>;

/// Commands that can be sent to the simulation worker
pub enum Command {
    /// Advance `ticks` fixed steps and report the last one.
    Step {
        ticks: u32,
        reply: oneshot::Sender<TickReport>,
    },
    SpawnTarget {
        kind: TargetKind,
        prefab: u8,
        placement: Placement,
        reply: oneshot::Sender<EntityId>,
    },
    DestroyTarget {
        entity: EntityId,
        reply: oneshot::Sender<bool>,
    },
    Attach {
        entity: EntityId,
        behavior: BehaviorIndex,
        prefab: u8,
        reply: oneshot::Sender<Result<RecordAddress>>,
    },
    AttachRecord {
        entity: EntityId,
        record: Record,
        reply: oneshot::Sender<Result<RecordAddress>>,
    },
    Modify {
        address: RecordAddress,
        edit: RecordEdit,
        reply: oneshot::Sender<Result<Record>>,
    },
    QueryEffective {
        entity: EntityId,
        stat: StatKind,
        base: f32,
        reply: oneshot::Sender<Option<f32>>,
    },
    QueryRecords {
        entity: EntityId,
        reply: oneshot::Sender<Vec<(RecordAddress, Record)>>,
    },
    QueryTarget {
        entity: EntityId,
        reply: oneshot::Sender<Option<ModTarget>>,
    },
    CurrentTick { reply: oneshot::Sender<Tick> },
}

/// Background task that processes simulation commands.
pub struct SimulationWorker {
    simulation: Simulation,
    command_rx: mpsc::Receiver<Command>,
    auto_tick: Option<Duration>,
}

impl SimulationWorker {
    /// Creates a new simulation worker.
    ///
    /// With `auto_tick` set, the worker steps the simulation once per period in
    /// addition to explicit [`Command::Step`] requests.
    pub fn new(
        simulation: Simulation,
        command_rx: mpsc::Receiver<Command>,
        auto_tick: Option<Duration>,
    ) -> Self {
        info!(
            target: "runtime::worker",
            behaviors = simulation.registry().len(),
            tick_rate = simulation.config().tick_rate,
            auto_tick = auto_tick.is_some(),
            "SimulationWorker initialized"
        );

        Self {
            simulation,
            command_rx,
            auto_tick,
        }
    }

    /// Main worker loop. Returns once every command sender has been dropped.
    pub async fn run(mut self) {
        let mut ticker = self.auto_tick.map(|period| {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = next_tick(&mut ticker) => {
                    self.simulation.step();
                }
            }
        }

        debug!(
            target: "runtime::worker",
            tick = %self.simulation.tick(),
            "SimulationWorker stopped"
        );
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Step { ticks, reply } => {
                let mut report = TickReport {
                    tick: self.simulation.tick(),
                    ..TickReport::default()
                };
                for _ in 0..ticks {
                    report = self.simulation.step();
                }
                if reply.send(report).is_err() {
                    debug!("Step reply channel closed (caller dropped)");
                }
            }
            Command::SpawnTarget {
                kind,
                prefab,
                placement,
                reply,
            } => {
                let entity = self.simulation.spawn_target(kind, prefab, placement);
                if reply.send(entity).is_err() {
                    debug!("SpawnTarget reply channel closed (caller dropped)");
                }
            }
            Command::DestroyTarget { entity, reply } => {
                let destroyed = self.simulation.destroy_target(entity);
                if reply.send(destroyed).is_err() {
                    debug!("DestroyTarget reply channel closed (caller dropped)");
                }
            }
            Command::Attach {
                entity,
                behavior,
                prefab,
                reply,
            } => {
                let result = self.simulation.attach(entity, behavior, prefab);
                if reply.send(result).is_err() {
                    debug!("Attach reply channel closed (caller dropped)");
                }
            }
            Command::AttachRecord {
                entity,
                record,
                reply,
            } => {
                let result = self.simulation.attach_record(entity, record);
                if reply.send(result).is_err() {
                    debug!("AttachRecord reply channel closed (caller dropped)");
                }
            }
            Command::Modify {
                address,
                edit,
                reply,
            } => {
                let result = self.simulation.modify(address, edit);
                if reply.send(result).is_err() {
                    debug!("Modify reply channel closed (caller dropped)");
                }
            }
            Command::QueryEffective {
                entity,
                stat,
                base,
                reply,
            } => {
                let value = self.simulation.effective(entity, stat, base);
                if reply.send(value).is_err() {
                    debug!("QueryEffective reply channel closed (caller dropped)");
                }
            }
            Command::QueryRecords { entity, reply } => {
                if reply.send(self.simulation.records(entity)).is_err() {
                    debug!("QueryRecords reply channel closed (caller dropped)");
                }
            }
            Command::QueryTarget { entity, reply } => {
                if reply.send(self.simulation.target(entity).cloned()).is_err() {
                    debug!("QueryTarget reply channel closed (caller dropped)");
                }
            }
            Command::CurrentTick { reply } => {
                if reply.send(self.simulation.tick()).is_err() {
                    debug!("CurrentTick reply channel closed (caller dropped)");
                }
            }
        }
    }
}

/// Resolves on the next interval tick, or never when auto-ticking is off.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
