//! Registry of behavior definitions, indexed by the byte carried in record headers.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::behavior::{BehaviorFault, InstanceContext, ModBehavior, RenderEnv, TickEnv};
use crate::config::ModConfig;
use crate::error::{ErrorSeverity, ModError};
use crate::record::{BehaviorIndex, Record};
use crate::target::ModTarget;

/// Errors raised by registration and index lookup.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("registry is full ({max} behaviors), cannot register `{name}`")]
    Capacity { name: String, max: usize },

    #[error("no behavior registered at {index}")]
    UnknownBehavior { index: BehaviorIndex },

    #[error("a different behavior is already registered as `{name}` at {index}")]
    NameConflict { name: String, index: BehaviorIndex },
}

impl ModError for RegistryError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Capacity { .. } | Self::NameConflict { .. } => ErrorSeverity::Fatal,
            Self::UnknownBehavior { .. } => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Capacity { .. } => "REGISTRY_CAPACITY",
            Self::UnknownBehavior { .. } => "REGISTRY_UNKNOWN_BEHAVIOR",
            Self::NameConflict { .. } => "REGISTRY_NAME_CONFLICT",
        }
    }
}

/// Errors raised while dispatching a lifecycle hook.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{behavior} failed: {fault}")]
    Fault {
        behavior: BehaviorIndex,
        fault: BehaviorFault,
    },
}

impl ModError for DispatchError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Registry(err) => err.severity(),
            Self::Fault { fault, .. } => fault.severity(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Registry(err) => err.error_code(),
            Self::Fault { fault, .. } => fault.error_code(),
        }
    }
}

/// Ordered table of behavior definitions.
///
/// Indices are assigned in registration order and never reused, so every peer
/// that registers the same definitions in the same order agrees on them.
/// Compare [`fingerprint`](Self::fingerprint) values to verify that.
#[derive(Default)]
pub struct ModRegistry {
    behaviors: Vec<Arc<dyn ModBehavior>>,
    by_name: HashMap<String, BehaviorIndex>,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `behavior`, returning its index.
    ///
    /// Registering the same definition (the same `Arc`) again returns the
    /// existing index and leaves the registry unchanged.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Capacity`] once [`ModConfig::MAX_BEHAVIORS`] distinct
    ///   definitions are registered.
    /// - [`RegistryError::NameConflict`] when another definition already uses
    ///   the name.
    pub fn register(&mut self, behavior: Arc<dyn ModBehavior>) -> Result<BehaviorIndex, RegistryError> {
        if let Some(&index) = self.by_name.get(behavior.name()) {
            let same = self.behaviors.get(usize::from(index.0)).is_some_and(|existing| {
                std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(&behavior))
            });
            if same {
                return Ok(index);
            }
            return Err(RegistryError::NameConflict {
                name: behavior.name().to_string(),
                index,
            });
        }

        if self.behaviors.len() >= ModConfig::MAX_BEHAVIORS {
            return Err(RegistryError::Capacity {
                name: behavior.name().to_string(),
                max: ModConfig::MAX_BEHAVIORS,
            });
        }

        // len < MAX_BEHAVIORS == 255, so the cast is lossless
        let index = BehaviorIndex(self.behaviors.len() as u8);
        self.by_name.insert(behavior.name().to_string(), index);
        self.behaviors.push(behavior);
        Ok(index)
    }

    /// Convenience wrapper over [`register`](Self::register) for owned definitions.
    pub fn register_behavior<B: ModBehavior + 'static>(
        &mut self,
        behavior: B,
    ) -> Result<BehaviorIndex, RegistryError> {
        self.register(Arc::new(behavior))
    }

    pub fn resolve(&self, index: BehaviorIndex) -> Result<&Arc<dyn ModBehavior>, RegistryError> {
        self.behaviors
            .get(usize::from(index.0))
            .ok_or(RegistryError::UnknownBehavior { index })
    }

    pub fn index_of(&self, name: &str) -> Option<BehaviorIndex> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, index: BehaviorIndex) -> bool {
        usize::from(index.0) < self.behaviors.len()
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Behaviors in index order.
    pub fn iter(&self) -> impl Iterator<Item = (BehaviorIndex, &Arc<dyn ModBehavior>)> + '_ {
        self.behaviors
            .iter()
            .enumerate()
            .map(|(i, behavior)| (BehaviorIndex(i as u8), behavior))
    }

    /// SHA-256 over the registered names in index order.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for behavior in &self.behaviors {
            let name = behavior.name().as_bytes();
            hasher.update((name.len() as u32).to_le_bytes());
            hasher.update(name);
        }
        hasher.finalize().into()
    }

    /// True when the record's behavior may be attached to `owner`.
    pub fn accepts(&self, index: BehaviorIndex, owner: &ModTarget) -> Result<bool, RegistryError> {
        Ok(owner.accepts(self.resolve(index)?.valid_targets()))
    }

    /// Writes the behavior's default payload into a freshly created record.
    pub fn set_defaults(&self, record: &mut Record) -> Result<(), RegistryError> {
        if let Some(index) = record.behavior_index() {
            self.resolve(index)?.set_defaults(record);
        }
        Ok(())
    }

    /// Creates the instance context for an assigned record.
    ///
    /// Returns `Ok(None)` for records without a behavior.
    pub fn initialize(
        &self,
        owner: &ModTarget,
        record: &Record,
    ) -> Result<Option<InstanceContext>, RegistryError> {
        let Some(index) = record.behavior_index() else {
            return Ok(None);
        };
        let behavior = self.resolve(index)?;
        Ok(Some(behavior.initialize(index, owner, record)))
    }

    /// Runs `on_tick` for the behavior named by the record.
    ///
    /// Unassigned records are skipped.
    pub fn dispatch_tick(
        &self,
        record: &mut Record,
        context: &mut InstanceContext,
        env: &mut TickEnv<'_>,
    ) -> Result<(), DispatchError> {
        let Some(index) = record.behavior_index() else {
            return Ok(());
        };
        self.resolve(index)?
            .on_tick(context, record, env)
            .map_err(|fault| DispatchError::Fault {
                behavior: index,
                fault,
            })
    }

    /// Runs `on_invalidated_tick` for the behavior the context was created by.
    ///
    /// Idempotent: a context is torn down at most once, later calls are no-ops.
    pub fn dispatch_invalidated(
        &self,
        record: &Record,
        context: &mut InstanceContext,
        env: &mut TickEnv<'_>,
    ) -> Result<(), DispatchError> {
        if context.is_torn_down() {
            return Ok(());
        }
        context.mark_torn_down();

        let index = context.behavior();
        self.resolve(index)?
            .on_invalidated_tick(context, record, env)
            .map_err(|fault| DispatchError::Fault {
                behavior: index,
                fault,
            })
    }

    pub fn dispatch_render(
        &self,
        record: &Record,
        context: &InstanceContext,
        env: &RenderEnv<'_>,
    ) -> Result<(), RegistryError> {
        if context.is_torn_down() {
            return self.dispatch_invalidated_render(record, context, env);
        }
        if let Some(index) = record.behavior_index() {
            self.resolve(index)?.on_render(context, record, env);
        }
        Ok(())
    }

    pub fn dispatch_invalidated_render(
        &self,
        record: &Record,
        context: &InstanceContext,
        env: &RenderEnv<'_>,
    ) -> Result<(), RegistryError> {
        self.resolve(context.behavior())?
            .on_invalidated_render(context, record, env);
        Ok(())
    }

    /// Offers `incoming` to the existing instance `current` of the same behavior.
    ///
    /// Returns true when the incoming record was absorbed and must not be attached.
    pub fn combine_on_add(
        &self,
        context: &mut InstanceContext,
        current: &mut Record,
        incoming: &Record,
        env: &mut TickEnv<'_>,
    ) -> Result<bool, RegistryError> {
        let index = context.behavior();
        if incoming.behavior_index() != Some(index) || context.is_torn_down() {
            return Ok(false);
        }
        Ok(self.resolve(index)?.combine_on_add(context, current, incoming, env))
    }
}

impl std::fmt::Debug for ModRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.behaviors.iter().map(|behavior| behavior.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{Behavior, SpawnRequest, Spawner};
    use crate::target::TargetKind;
    use crate::types::{EntityId, Tick};

    struct Noop(String);

    impl Behavior for Noop {
        type Payload = ();
        type State = u32;

        fn name(&self) -> &str {
            &self.0
        }

        fn initialize(&self, _owner: &ModTarget, _payload: &()) -> u32 {
            0
        }

        fn on_tick(
            &self,
            ticks: &mut u32,
            _payload: &mut (),
            _env: &mut TickEnv<'_>,
        ) -> Result<(), BehaviorFault> {
            *ticks += 1;
            Ok(())
        }

        fn on_invalidated_tick(
            &self,
            _ticks: &mut u32,
            _payload: &(),
            env: &mut TickEnv<'_>,
        ) -> Result<(), BehaviorFault> {
            env.target.index += 1;
            Ok(())
        }
    }

    struct Discard;

    impl Spawner for Discard {
        fn spawn(&mut self, _request: SpawnRequest) {}
    }

    fn noop(name: &str) -> Arc<dyn ModBehavior> {
        Arc::new(Noop(name.to_string()))
    }

    #[test]
    fn same_definition_registers_once() {
        let mut registry = ModRegistry::new();
        let boost = noop("boost");
        let first = registry.register(Arc::clone(&boost)).unwrap();
        let other = registry.register(noop("shield")).unwrap();
        let again = registry.register(boost).unwrap();

        assert_eq!(first, BehaviorIndex(0));
        assert_eq!(other, BehaviorIndex(1));
        assert_eq!(again, first);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn different_definition_with_known_name_is_rejected() {
        let mut registry = ModRegistry::new();
        registry.register(noop("boost")).unwrap();

        let err = registry.register(noop("boost")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::NameConflict {
                name: "boost".to_string(),
                index: BehaviorIndex(0)
            }
        );
        assert_eq!(err.severity(), ErrorSeverity::Fatal);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn capacity_is_255_behaviors() {
        let mut registry = ModRegistry::new();
        let definitions: Vec<_> = (0..ModConfig::MAX_BEHAVIORS)
            .map(|i| noop(&format!("mod-{i}")))
            .collect();
        for definition in &definitions {
            registry.register(Arc::clone(definition)).unwrap();
        }

        let err = registry.register(noop("one-too-many")).unwrap_err();
        assert!(matches!(err, RegistryError::Capacity { max: 255, .. }));
        assert_eq!(err.severity(), ErrorSeverity::Fatal);
        assert_eq!(registry.len(), 255);

        // known names still resolve once full
        assert_eq!(
            registry.register(Arc::clone(&definitions[254])).unwrap(),
            BehaviorIndex(254)
        );
    }

    #[test]
    fn resolving_unknown_index_fails() {
        let mut registry = ModRegistry::new();
        registry.register(noop("boost")).unwrap();

        assert!(registry.resolve(BehaviorIndex(0)).is_ok());
        assert_eq!(
            registry.resolve(BehaviorIndex(7)).err(),
            Some(RegistryError::UnknownBehavior {
                index: BehaviorIndex(7)
            })
        );
    }

    #[test]
    fn fingerprint_tracks_registration_order() {
        let mut a = ModRegistry::new();
        a.register(noop("boost")).unwrap();
        a.register(noop("shield")).unwrap();

        let mut b = ModRegistry::new();
        b.register(noop("shield")).unwrap();
        b.register(noop("boost")).unwrap();

        let mut c = ModRegistry::new();
        c.register(noop("boost")).unwrap();
        c.register(noop("shield")).unwrap();

        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn dispatch_reaches_the_indexed_behavior() {
        let mut registry = ModRegistry::new();
        registry.register(noop("boost")).unwrap();
        let index = registry.register(noop("shield")).unwrap();

        let mut owner = ModTarget::new(EntityId(1), TargetKind::Vehicle, 0, 0);
        let mut record = Record::encode(Some(index), 0, 0).unwrap();
        let mut context = registry.initialize(&owner, &record).unwrap().unwrap();

        let mut spawner = Discard;
        let mut faults = Vec::new();
        let mut env = TickEnv::new(Tick::ZERO, 1.0 / 60.0, &mut owner, &mut spawner, &mut faults);
        registry.dispatch_tick(&mut record, &mut context, &mut env).unwrap();
        registry.dispatch_tick(&mut record, &mut context, &mut env).unwrap();

        assert_eq!(context.behavior(), index);
        assert_eq!(context.state::<u32>(), Some(&2));
    }

    #[test]
    fn unassigned_records_are_not_dispatched() {
        let registry = ModRegistry::new();
        let mut owner = ModTarget::new(EntityId(1), TargetKind::Vehicle, 0, 0);
        let mut record = Record::encode(None, 0, 0).unwrap();
        let mut context = InstanceContext::new(BehaviorIndex(0), 0u32);

        let mut spawner = Discard;
        let mut faults = Vec::new();
        let mut env = TickEnv::new(Tick::ZERO, 1.0, &mut owner, &mut spawner, &mut faults);
        assert!(registry.dispatch_tick(&mut record, &mut context, &mut env).is_ok());
        assert!(registry.initialize(env.target, &record).unwrap().is_none());
    }

    #[test]
    fn unknown_index_is_reported_on_dispatch() {
        let registry = ModRegistry::new();
        let mut owner = ModTarget::new(EntityId(1), TargetKind::Vehicle, 0, 0);
        let mut record = Record::encode(Some(BehaviorIndex(3)), 0, 0).unwrap();
        let mut context = InstanceContext::new(BehaviorIndex(3), ());

        let mut spawner = Discard;
        let mut faults = Vec::new();
        let mut env = TickEnv::new(Tick::ZERO, 1.0, &mut owner, &mut spawner, &mut faults);
        let err = registry
            .dispatch_tick(&mut record, &mut context, &mut env)
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Registry(RegistryError::UnknownBehavior { .. })
        ));
    }

    #[test]
    fn invalidated_dispatch_runs_once() {
        let mut registry = ModRegistry::new();
        let index = registry.register(noop("boost")).unwrap();

        let mut owner = ModTarget::new(EntityId(1), TargetKind::Vehicle, 0, 0);
        let mut record = Record::encode(Some(index), 0, 0).unwrap();
        let mut context = registry.initialize(&owner, &record).unwrap().unwrap();
        record.invalidate();

        let mut spawner = Discard;
        let mut faults = Vec::new();
        let mut env = TickEnv::new(Tick::ZERO, 1.0, &mut owner, &mut spawner, &mut faults);
        registry.dispatch_invalidated(&record, &mut context, &mut env).unwrap();
        registry.dispatch_invalidated(&record, &mut context, &mut env).unwrap();

        assert!(context.is_torn_down());
        assert_eq!(owner.index, 1);
    }

    #[test]
    fn mismatched_context_is_a_fault() {
        let mut registry = ModRegistry::new();
        let index = registry.register(noop("boost")).unwrap();

        let mut owner = ModTarget::new(EntityId(1), TargetKind::Vehicle, 0, 0);
        let mut record = Record::encode(Some(index), 0, 0).unwrap();
        let mut context = InstanceContext::new(index, "not a counter");

        let mut spawner = Discard;
        let mut faults = Vec::new();
        let mut env = TickEnv::new(Tick::ZERO, 1.0, &mut owner, &mut spawner, &mut faults);
        let err = registry
            .dispatch_tick(&mut record, &mut context, &mut env)
            .unwrap_err();
        assert_eq!(err.severity(), ErrorSeverity::Internal);
    }
}
