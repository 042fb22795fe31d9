//! Runtime orchestration for the networked modifier simulation.
//!
//! This crate hosts the tick driver that runs [`netmod_core`] behaviors
//! against a world of entities, the ordered channel through which peers add,
//! update and remove records, and an async [`Runtime`] that owns the
//! simulation on a worker task.
//!
//! Modules are organized by responsibility:
//! - [`simulation`] drives ticks synchronously and can be embedded directly
//! - [`world`] stores entities and their attached records
//! - [`remote`] carries peer mutations to the next tick boundary
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
pub mod api;
pub mod remote;
pub mod runtime;
pub mod simulation;
pub mod spawn;
pub mod world;

mod workers;

pub use api::{Result, RuntimeError, RuntimeHandle};
pub use remote::{RecordBytes, RemoteRequest, RemoteSender};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use simulation::{Simulation, TickReport};
pub use spawn::SpawnQueue;
pub use world::{Attached, RecordAddress, TargetEntry, World};
