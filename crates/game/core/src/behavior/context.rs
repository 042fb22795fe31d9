//! Per-instance context and the environments handed to behavior hooks.

use std::any::Any;
use std::fmt;

use crate::record::BehaviorIndex;
use crate::target::{ModTarget, TargetKind};
use crate::types::{Tick, Vec2};

use super::BehaviorFault;

/// Non-replicated running state paired with one record.
///
/// Created by `initialize`, dropped once the record is torn down. Peers
/// rebuild it independently from the record and the tick clock, so nothing in
/// here may be required to interpret the record itself.
pub struct InstanceContext {
    behavior: BehaviorIndex,
    state: Box<dyn Any + Send>,
    torn_down: bool,
}

impl InstanceContext {
    pub fn new<S: Any + Send>(behavior: BehaviorIndex, state: S) -> Self {
        Self {
            behavior,
            state: Box::new(state),
            torn_down: false,
        }
    }

    /// Behavior this context was initialized for.
    ///
    /// Kept separately from the record so teardown still reaches the right
    /// behavior after the record was detached or reassigned.
    pub fn behavior(&self) -> BehaviorIndex {
        self.behavior
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub(crate) fn mark_torn_down(&mut self) {
        self.torn_down = true;
    }

    pub fn state<S: Any>(&self) -> Option<&S> {
        self.state.downcast_ref()
    }

    pub fn state_mut<S: Any>(&mut self) -> Option<&mut S> {
        self.state.downcast_mut()
    }
}

impl fmt::Debug for InstanceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceContext")
            .field("behavior", &self.behavior)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

/// Where a spawned entity starts.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Placement {
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Callback run on a freshly spawned entity before its first tick.
pub type PostSpawn = Box<dyn FnOnce(&mut ModTarget) + Send>;

/// A deferred request to create an entity from a template.
pub struct SpawnRequest {
    pub prefab: u8,
    pub kind: TargetKind,
    pub placement: Placement,
    pub post_spawn: Option<PostSpawn>,
}

impl SpawnRequest {
    pub fn new(prefab: u8, kind: TargetKind, placement: Placement) -> Self {
        Self {
            prefab,
            kind,
            placement,
            post_spawn: None,
        }
    }

    #[must_use]
    pub fn then(mut self, post_spawn: impl FnOnce(&mut ModTarget) + Send + 'static) -> Self {
        self.post_spawn = Some(Box::new(post_spawn));
        self
    }
}

impl fmt::Debug for SpawnRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnRequest")
            .field("prefab", &self.prefab)
            .field("kind", &self.kind)
            .field("placement", &self.placement)
            .field("post_spawn", &self.post_spawn.is_some())
            .finish()
    }
}

/// Spawn facility provided by the host.
///
/// Requests are queued; entities appear after the current tick completes.
pub trait Spawner {
    fn spawn(&mut self, request: SpawnRequest);
}

/// Everything a tick hook may touch besides its own record and context.
pub struct TickEnv<'a> {
    pub tick: Tick,
    /// Fixed tick duration in seconds.
    pub delta: f32,
    /// Entity owning the record being ticked.
    pub target: &'a mut ModTarget,
    spawner: &'a mut dyn Spawner,
    diagnostics: &'a mut Vec<BehaviorFault>,
    expired: bool,
}

impl<'a> TickEnv<'a> {
    pub fn new(
        tick: Tick,
        delta: f32,
        target: &'a mut ModTarget,
        spawner: &'a mut dyn Spawner,
        diagnostics: &'a mut Vec<BehaviorFault>,
    ) -> Self {
        Self {
            tick,
            delta,
            target,
            spawner,
            diagnostics,
            expired: false,
        }
    }

    pub fn spawn(&mut self, request: SpawnRequest) {
        self.spawner.spawn(request);
    }

    /// Records a non-fatal problem, typically a clamped payload value.
    pub fn report(&mut self, fault: BehaviorFault) {
        self.diagnostics.push(fault);
    }

    /// Asks the host to invalidate the current record once the tick ends.
    pub fn expire(&mut self) {
        self.expired = true;
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Seconds covered by `ticks` simulation steps.
    pub fn seconds(&self, ticks: u64) -> f32 {
        ticks as f32 * self.delta
    }
}

/// Read-only view for presentation hooks.
pub struct RenderEnv<'a> {
    pub tick: Tick,
    /// Fraction of the way to the next tick, in `[0, 1)`.
    pub interpolation: f32,
    pub target: &'a ModTarget,
}
