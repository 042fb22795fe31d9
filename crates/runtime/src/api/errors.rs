//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, channel plumbing, and the core
//! record/registry layer so clients can bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use netmod_core::{EntityId, RecordError, RegistryError, TargetKind};

use crate::world::RecordAddress;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("simulation worker command channel closed")]
    CommandChannelClosed,

    #[error("simulation worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("simulation worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("remote request channel closed")]
    RemoteChannelClosed,

    #[error("runtime requires a mod registry before building")]
    MissingRegistry,

    #[error("unknown target {entity}")]
    UnknownTarget { entity: EntityId },

    #[error("target {entity} is being destroyed")]
    TargetDestroyed { entity: EntityId },

    #[error("{address} is stale")]
    StaleAddress { address: RecordAddress },

    #[error("behavior `{behavior}` cannot be attached to {kind} target {entity}")]
    RejectedTarget {
        behavior: String,
        kind: TargetKind,
        entity: EntityId,
    },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
