//! Cloneable façade for issuing commands to the runtime.
//!
//! [`RuntimeHandle`] hides channel plumbing and offers async helpers for
//! stepping the simulation, managing entities and records, and querying
//! effective stats.
use tokio::sync::{mpsc, oneshot};

use netmod_core::{
    BehaviorIndex, EntityId, ModTarget, Placement, Record, StatKind, TargetKind, Tick,
};

use super::errors::{Result, RuntimeError};
use crate::remote::RemoteSender;
use crate::simulation::TickReport;
use crate::workers::Command;
use crate::world::RecordAddress;

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    remote: RemoteSender,
}

impl RuntimeHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, remote: RemoteSender) -> Self {
        Self { command_tx, remote }
    }

    /// Sender for remote add/update/remove requests, applied at the next tick.
    pub fn remote(&self) -> &RemoteSender {
        &self.remote
    }

    /// Advance `ticks` fixed steps and return the report of the last one.
    pub async fn step(&self, ticks: u32) -> Result<TickReport> {
        self.request(|reply| Command::Step { ticks, reply }).await
    }

    pub async fn spawn_target(
        &self,
        kind: TargetKind,
        prefab: u8,
        placement: Placement,
    ) -> Result<EntityId> {
        self.request(|reply| Command::SpawnTarget {
            kind,
            prefab,
            placement,
            reply,
        })
        .await
    }

    /// Invalidate every record on `entity`; it disappears once they tore down.
    pub async fn destroy_target(&self, entity: EntityId) -> Result<bool> {
        self.request(|reply| Command::DestroyTarget { entity, reply })
            .await
    }

    /// Attach a new record of `behavior` with the behavior's default payload.
    pub async fn attach(
        &self,
        entity: EntityId,
        behavior: BehaviorIndex,
        prefab: u8,
    ) -> Result<RecordAddress> {
        self.request(|reply| Command::Attach {
            entity,
            behavior,
            prefab,
            reply,
        })
        .await?
    }

    pub async fn attach_record(&self, entity: EntityId, record: Record) -> Result<RecordAddress> {
        self.request(|reply| Command::AttachRecord {
            entity,
            record,
            reply,
        })
        .await?
    }

    /// Edit a record in place; the change is seen by its next tick.
    pub async fn modify(
        &self,
        address: RecordAddress,
        edit: impl FnOnce(&mut Record) + Send + 'static,
    ) -> Result<Record> {
        self.request(|reply| Command::Modify {
            address,
            edit: Box::new(edit),
            reply,
        })
        .await?
    }

    /// Effective value of `stat` on `entity`, `None` if the entity is gone.
    pub async fn effective(
        &self,
        entity: EntityId,
        stat: StatKind,
        base: f32,
    ) -> Result<Option<f32>> {
        self.request(|reply| Command::QueryEffective {
            entity,
            stat,
            base,
            reply,
        })
        .await
    }

    pub async fn records(&self, entity: EntityId) -> Result<Vec<(RecordAddress, Record)>> {
        self.request(|reply| Command::QueryRecords { entity, reply })
            .await
    }

    /// Snapshot of an entity's modifiable state.
    pub async fn target(&self, entity: EntityId) -> Result<Option<ModTarget>> {
        self.request(|reply| Command::QueryTarget { entity, reply })
            .await
    }

    pub async fn current_tick(&self) -> Result<Tick> {
        self.request(|reply| Command::CurrentTick { reply }).await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }
}
