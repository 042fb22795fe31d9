//! Tick driver for attached records.
//!
//! [`Simulation::advance`] runs one fixed step in four phases:
//!
//! 1. apply remote requests in delivery order
//! 2. walk entities in id order and their records in attach order, running
//!    teardown, (re)initialization and `on_tick` as each record requires
//! 3. create entities requested through the spawn facility
//! 4. remove destroyed entities whose records have all been torn down
//!
//! Everything here runs on one thread; hooks never observe a half-applied
//! remote request.

use std::sync::Arc;

use netmod_core::{
    BehaviorFault, BehaviorIndex, EntityId, InstanceContext, ModConfig, ModError, ModRegistry,
    ModTarget, Placement, Record, RenderEnv, StatKind, TargetKind, Tick, TickEnv,
};
use tracing::{debug, error, warn};

use crate::api::{Result, RuntimeError};
use crate::remote::{self, RecordBytes, RemoteInbox, RemoteRequest, RemoteSender};
use crate::spawn::SpawnQueue;
use crate::world::{Attached, RecordAddress, World};

/// Counters describing one call to [`Simulation::advance`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Tick,
    pub remote_applied: usize,
    pub remote_dropped: usize,
    pub dispatched: usize,
    pub torn_down: usize,
    pub spawned: usize,
    pub removed_targets: usize,
    pub faults: usize,
}

enum RecordFate {
    Keep,
    Release,
}

/// Single-threaded owner of the world, driven one tick at a time.
pub struct Simulation {
    registry: Arc<ModRegistry>,
    config: ModConfig,
    world: World,
    spawns: SpawnQueue,
    inbox: RemoteInbox,
    remote: RemoteSender,
    tick: Tick,
    started: bool,
}

impl Simulation {
    pub fn new(registry: Arc<ModRegistry>, config: ModConfig) -> Self {
        let (remote, inbox) = remote::channel();
        Self {
            registry,
            config,
            world: World::new(),
            spawns: SpawnQueue::default(),
            inbox,
            remote,
            tick: Tick::ZERO,
            started: false,
        }
    }

    /// Sender for remote add/update/remove requests.
    pub fn remote(&self) -> RemoteSender {
        self.remote.clone()
    }

    pub fn registry(&self) -> &Arc<ModRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ModConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Last tick that was advanced, [`Tick::ZERO`] before the first one.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Advances to the next tick with the configured fixed delta.
    pub fn step(&mut self) -> TickReport {
        let next = if self.started {
            self.tick.next()
        } else {
            Tick::ZERO
        };
        self.advance(next, self.config.tick_delta())
    }

    pub fn advance(&mut self, tick: Tick, delta: f32) -> TickReport {
        let tick = if self.started && tick <= self.tick {
            let next = self.tick.next();
            warn!(
                target: "runtime::simulation",
                requested = %tick,
                current = %self.tick,
                using = %next,
                "Non-monotonic tick requested"
            );
            next
        } else {
            tick
        };
        self.tick = tick;
        self.started = true;

        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        for request in self.inbox.drain() {
            if self.apply_remote(request) {
                report.remote_applied += 1;
            } else {
                report.remote_dropped += 1;
            }
        }

        self.tick_records(delta, &mut report);
        self.apply_spawns(&mut report);
        self.remove_destroyed(&mut report);

        debug!(
            target: "runtime::simulation",
            tick = %report.tick,
            remote_applied = report.remote_applied,
            remote_dropped = report.remote_dropped,
            dispatched = report.dispatched,
            torn_down = report.torn_down,
            spawned = report.spawned,
            faults = report.faults,
            "Tick complete"
        );
        report
    }

    // ===== entities =====

    pub fn spawn_target(&mut self, kind: TargetKind, prefab: u8, placement: Placement) -> EntityId {
        self.world.spawn(kind, prefab, placement)
    }

    /// Invalidates every record of `entity`; see [`World::destroy`].
    pub fn destroy_target(&mut self, entity: EntityId) -> bool {
        self.world.destroy(entity)
    }

    pub fn target(&self, entity: EntityId) -> Option<&ModTarget> {
        self.world.target(entity)
    }

    /// Effective value of `stat` on `entity` folded over `base`.
    pub fn effective(&self, entity: EntityId, stat: StatKind, base: f32) -> Option<f32> {
        self.world
            .target(entity)
            .map(|target| target.stats.effective(stat, base))
    }

    // ===== records =====

    /// Creates a record for `behavior` with its defaults and attaches it.
    pub fn attach(
        &mut self,
        entity: EntityId,
        behavior: BehaviorIndex,
        prefab: u8,
    ) -> Result<RecordAddress> {
        let mut record = Record::encode(Some(behavior), prefab, 0)?;
        self.registry.set_defaults(&mut record)?;
        self.attach_record(entity, record)
    }

    /// Attaches a fully formed record, combining it into an existing instance
    /// of the same behavior when that behavior accepts it.
    ///
    /// Returns the address of the new record, or of the instance it was
    /// combined into. Records naming an unregistered behavior are attached
    /// inert.
    pub fn attach_record(&mut self, entity: EntityId, mut record: Record) -> Result<RecordAddress> {
        let (owner_index, kind) = match self.world.targets.get(&entity) {
            None => return Err(RuntimeError::UnknownTarget { entity }),
            Some(entry) if entry.destroyed => {
                return Err(RuntimeError::TargetDestroyed { entity });
            }
            Some(entry) => (entry.target.index, entry.target.kind),
        };

        let Some(index) = record.behavior_index() else {
            return Ok(self.world.attach(Attached::new(entity, record, None)));
        };
        record.set_target_index(owner_index)?;

        let behavior = match self.registry.resolve(index) {
            Ok(behavior) => Arc::clone(behavior),
            Err(err) => {
                warn!(
                    target: "runtime::simulation",
                    entity = %entity,
                    behavior = %index,
                    error = %err,
                    code = err.error_code(),
                    "Record names an unregistered behavior, keeping it inert"
                );
                let mut attached = Attached::new(entity, record, None);
                attached.inert_logged = true;
                return Ok(self.world.attach(attached));
            }
        };

        if !behavior.valid_targets().contains(kind.flag()) {
            return Err(RuntimeError::RejectedTarget {
                behavior: behavior.name().to_string(),
                kind,
                entity,
            });
        }

        if let Some(slot) = self.world.combinable(entity, index) {
            if self.combine_into(entity, slot, &record)? {
                if let Some(address) = self.world.slots.address_of(slot) {
                    debug!(
                        target: "runtime::simulation",
                        entity = %entity,
                        behavior = %index,
                        address = %address,
                        "Combined incoming record into existing instance"
                    );
                    return Ok(address);
                }
            }
        }

        let entry = self
            .world
            .targets
            .get(&entity)
            .ok_or(RuntimeError::UnknownTarget { entity })?;
        let context = behavior.initialize(index, &entry.target, &record);
        Ok(self
            .world
            .attach(Attached::new(entity, record, Some(context))))
    }

    fn combine_into(&mut self, entity: EntityId, slot: u32, incoming: &Record) -> Result<bool> {
        let delta = self.config.tick_delta();
        let Some(entry) = self.world.targets.get_mut(&entity) else {
            return Ok(false);
        };
        let Some(current) = self.world.slots.slot_mut(slot) else {
            return Ok(false);
        };
        let Some(context) = current.context.as_mut() else {
            return Ok(false);
        };

        let mut faults = Vec::new();
        let mut env = TickEnv::new(
            self.tick,
            delta,
            &mut entry.target,
            &mut self.spawns,
            &mut faults,
        );
        let combined =
            self.registry
                .combine_on_add(context, &mut current.record, incoming, &mut env)?;
        log_faults(entity, self.world.slots.address_of(slot), &faults);
        Ok(combined)
    }

    /// Applies `edit` to a live record and returns the edited copy.
    ///
    /// Changes take effect on the record's next tick, exactly like a remote
    /// update.
    pub fn modify(
        &mut self,
        address: RecordAddress,
        edit: impl FnOnce(&mut Record),
    ) -> Result<Record> {
        let attached = self
            .world
            .live_mut(address)
            .ok_or(RuntimeError::StaleAddress { address })?;
        edit(&mut attached.record);
        attached.inert_logged = false;
        Ok(attached.record)
    }

    pub fn record(&self, address: RecordAddress) -> Option<&Record> {
        self.world.attached(address).map(|attached| &attached.record)
    }

    /// Records of `entity` in attach order.
    pub fn records(&self, entity: EntityId) -> Vec<(RecordAddress, Record)> {
        self.world.records(entity)
    }

    /// Runs presentation hooks for every record; returns how many were rendered.
    pub fn render(&self, interpolation: f32) -> usize {
        let mut rendered = 0;
        for entry in self.world.targets.values() {
            let env = RenderEnv {
                tick: self.tick,
                interpolation,
                target: &entry.target,
            };
            for slot in &entry.records {
                let Some(attached) = self.world.slots.slot(*slot) else {
                    continue;
                };
                let Some(context) = attached.context.as_ref() else {
                    continue;
                };
                match self.registry.dispatch_render(&attached.record, context, &env) {
                    Ok(()) => rendered += 1,
                    Err(err) => debug!(
                        target: "runtime::simulation",
                        entity = %entry.target.id,
                        error = %err,
                        "Render dispatch failed"
                    ),
                }
            }
        }
        rendered
    }

    // ===== phases =====

    fn apply_remote(&mut self, request: RemoteRequest) -> bool {
        match request {
            RemoteRequest::Add {
                target,
                bytes,
                reply,
            } => {
                let address = self.apply_remote_add(target, bytes);
                if let Some(reply) = reply {
                    if reply.send(address).is_err() {
                        debug!(target: "runtime::remote", "Add reply channel closed (caller dropped)");
                    }
                }
                address.is_some()
            }
            RemoteRequest::Update { address, bytes } => self.apply_remote_update(address, bytes),
            RemoteRequest::Remove { address } => match self.world.live_mut(address) {
                Some(attached) => {
                    attached.record.invalidate();
                    true
                }
                None => {
                    debug!(target: "runtime::remote", address = %address, "Dropping remove for stale address");
                    false
                }
            },
        }
    }

    fn apply_remote_add(&mut self, entity: EntityId, bytes: RecordBytes) -> Option<RecordAddress> {
        let record = Record::from_bytes(&bytes);
        if !record.is_valid() {
            debug!(target: "runtime::remote", entity = %entity, "Dropping add of an invalid record");
            return None;
        }

        match self.attach_record(entity, record) {
            Ok(address) => Some(address),
            Err(err) => {
                warn!(
                    target: "runtime::remote",
                    entity = %entity,
                    error = %err,
                    "Rejected remote add"
                );
                None
            }
        }
    }

    fn apply_remote_update(&mut self, address: RecordAddress, bytes: RecordBytes) -> bool {
        let Some(attached) = self.world.slots.get_mut(address) else {
            debug!(target: "runtime::remote", address = %address, "Dropping update for stale address");
            return false;
        };
        if !attached.record.is_valid() {
            debug!(target: "runtime::remote", address = %address, "Dropping update for invalidated record");
            return false;
        }

        let mut record = Record::from_bytes(&bytes);
        if record.is_assigned() {
            let owner_index = self
                .world
                .targets
                .get(&attached.owner)
                .map(|entry| entry.target.index);
            if let Some(index) = owner_index {
                if let Err(err) = record.set_target_index(index) {
                    warn!(target: "runtime::remote", address = %address, error = %err, "Owner index out of range");
                }
            }
        }

        if record.behavior_index() != attached.record.behavior_index() {
            attached.inert_logged = false;
        }
        attached.record = record;
        true
    }

    fn tick_records(&mut self, delta: f32, report: &mut TickReport) {
        let tick = self.tick;
        let registry = self.registry.as_ref();
        let mut faults = Vec::new();

        for (entity, entry) in self.world.targets.iter_mut() {
            let mut kept = Vec::with_capacity(entry.records.len());
            for slot in std::mem::take(&mut entry.records) {
                let Some(address) = self.world.slots.address_of(slot) else {
                    continue;
                };
                let Some(attached) = self.world.slots.slot_mut(slot) else {
                    continue;
                };

                let fate = {
                    let mut env =
                        TickEnv::new(tick, delta, &mut entry.target, &mut self.spawns, &mut faults);
                    step_record(registry, address, attached, &mut env, report)
                };

                report.faults += faults.len();
                log_faults(*entity, Some(address), &faults);
                faults.clear();

                match fate {
                    RecordFate::Keep => kept.push(slot),
                    RecordFate::Release => {
                        self.world.slots.release(slot);
                    }
                }
            }
            entry.records = kept;
        }
    }

    fn apply_spawns(&mut self, report: &mut TickReport) {
        for request in self.spawns.take() {
            let entity = self
                .world
                .spawn(request.kind, request.prefab, request.placement);
            if let (Some(post_spawn), Some(entry)) =
                (request.post_spawn, self.world.targets.get_mut(&entity))
            {
                post_spawn(&mut entry.target);
            }
            debug!(
                target: "runtime::simulation",
                entity = %entity,
                kind = %request.kind,
                prefab = request.prefab,
                "Spawned entity"
            );
            report.spawned += 1;
        }
    }

    fn remove_destroyed(&mut self, report: &mut TickReport) {
        let before = self.world.targets.len();
        self.world
            .targets
            .retain(|_, entry| !(entry.destroyed && entry.records.is_empty()));
        report.removed_targets = before - self.world.targets.len();
    }
}

/// Advances one record through its lifecycle for the current tick.
fn step_record(
    registry: &ModRegistry,
    address: RecordAddress,
    attached: &mut Attached,
    env: &mut TickEnv<'_>,
    report: &mut TickReport,
) -> RecordFate {
    let record = &mut attached.record;

    if !record.is_valid() {
        if let Some(mut context) = attached.context.take() {
            teardown(registry, address, record, &mut context, env);
            report.torn_down += 1;
        }
        return RecordFate::Release;
    }

    let Some(index) = record.behavior_index() else {
        // detached: the slot stays allocated but nothing runs
        if let Some(mut context) = attached.context.take() {
            teardown(registry, address, record, &mut context, env);
            report.torn_down += 1;
        }
        return RecordFate::Keep;
    };

    if attached
        .context
        .as_ref()
        .is_some_and(|context| context.behavior() != index)
    {
        if let Some(mut context) = attached.context.take() {
            teardown(registry, address, record, &mut context, env);
            report.torn_down += 1;
        }
    }

    if attached.context.is_none() {
        let behavior = match registry.resolve(index) {
            Ok(behavior) => behavior,
            Err(err) => {
                if !attached.inert_logged {
                    warn!(
                        target: "runtime::simulation",
                        address = %address,
                        behavior = %index,
                        error = %err,
                        "Record names an unregistered behavior, keeping it inert"
                    );
                    attached.inert_logged = true;
                }
                return RecordFate::Keep;
            }
        };
        if !env.target.accepts(behavior.valid_targets()) {
            if !attached.inert_logged {
                warn!(
                    target: "runtime::simulation",
                    address = %address,
                    behavior = behavior.name(),
                    kind = %env.target.kind,
                    "Behavior does not accept this target kind, keeping record inert"
                );
                attached.inert_logged = true;
            }
            return RecordFate::Keep;
        }
        attached.context = Some(behavior.initialize(index, &*env.target, record));
    }

    let Some(context) = attached.context.as_mut() else {
        return RecordFate::Keep;
    };
    if let Err(err) = registry.dispatch_tick(record, context, env) {
        error!(
            target: "runtime::simulation",
            address = %address,
            behavior = %index,
            severity = err.severity().as_str(),
            error = %err,
            "Tick hook failed"
        );
    }
    report.dispatched += 1;

    if env.is_expired() {
        debug!(target: "runtime::simulation", address = %address, "Record expired");
        record.invalidate();
    }
    RecordFate::Keep
}

fn teardown(
    registry: &ModRegistry,
    address: RecordAddress,
    record: &Record,
    context: &mut InstanceContext,
    env: &mut TickEnv<'_>,
) {
    if let Err(err) = registry.dispatch_invalidated(record, context, env) {
        error!(
            target: "runtime::simulation",
            address = %address,
            behavior = %context.behavior(),
            error = %err,
            "Teardown hook failed"
        );
    }
}

fn log_faults(entity: EntityId, address: Option<RecordAddress>, faults: &[BehaviorFault]) {
    for fault in faults {
        warn!(
            target: "runtime::simulation",
            entity = %entity,
            address = ?address,
            code = fault.error_code(),
            fault = %fault,
            "Behavior reported a problem"
        );
    }
}
