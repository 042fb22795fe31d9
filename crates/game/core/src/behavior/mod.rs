//! Mod behaviors: shared, stateless definitions of one modifier kind.
//!
//! Behaviors are authored against the typed [`Behavior`] trait, which names a
//! payload layout and a per-instance state type. The registry stores them as
//! [`ModBehavior`] trait objects; the blanket implementation decodes the
//! record payload into the behavior's layout before each hook and encodes it
//! back afterwards.
//!
//! # Lifecycle
//!
//! ```text
//! set_defaults ─→ initialize ─→ on_tick* ─→ on_invalidated_tick
//!                                 │
//!                           combine_on_add (when a duplicate is attached)
//! ```

mod context;

pub use context::{
    InstanceContext, Placement, PostSpawn, RenderEnv, SpawnRequest, Spawner, TickEnv,
};

use crate::error::{ErrorSeverity, ModError};
use crate::record::{BehaviorIndex, PayloadLayout, Record};
use crate::target::{ModTarget, TargetKinds};

/// Problems a behavior reports instead of panicking.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BehaviorFault {
    /// A replicated value was out of range; the behavior clamped it or skipped it.
    #[error("payload field `{field}` is malformed: {detail}")]
    MalformedPayload { field: &'static str, detail: String },

    #[error("instance context does not belong to behavior `{behavior}`")]
    ContextMismatch { behavior: String },
}

impl BehaviorFault {
    pub fn malformed(field: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedPayload {
            field,
            detail: detail.into(),
        }
    }
}

impl ModError for BehaviorFault {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::MalformedPayload { .. } => ErrorSeverity::Recoverable,
            Self::ContextMismatch { .. } => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "BEHAVIOR_MALFORMED_PAYLOAD",
            Self::ContextMismatch { .. } => "BEHAVIOR_CONTEXT_MISMATCH",
        }
    }
}

/// Typed authoring interface for a modifier kind.
///
/// Hooks must never panic on payload contents: payloads arrive from remote
/// peers. Out-of-range values are clamped or ignored and reported through
/// [`TickEnv::report`].
pub trait Behavior: Send + Sync + 'static {
    /// Layout of the replicated payload.
    type Payload: PayloadLayout;

    /// Non-replicated per-instance state.
    type State: Send + 'static;

    /// Stable identity of the definition; registering a name twice yields one index.
    fn name(&self) -> &str;

    fn valid_targets(&self) -> TargetKinds {
        TargetKinds::all()
    }

    /// Fills a freshly created payload with this behavior's defaults.
    fn set_defaults(&self, _payload: &mut Self::Payload) {}

    fn initialize(&self, owner: &ModTarget, payload: &Self::Payload) -> Self::State;

    fn on_tick(
        &self,
        state: &mut Self::State,
        payload: &mut Self::Payload,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault>;

    /// Teardown tick. Must be safe when the instance never became active.
    fn on_invalidated_tick(
        &self,
        _state: &mut Self::State,
        _payload: &Self::Payload,
        _env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault> {
        Ok(())
    }

    fn on_render(&self, _state: &Self::State, _payload: &Self::Payload, _env: &RenderEnv<'_>) {}

    fn on_invalidated_render(
        &self,
        _state: &Self::State,
        _payload: &Self::Payload,
        _env: &RenderEnv<'_>,
    ) {
    }

    /// Absorbs `incoming` into `current` and returns true, or returns false to
    /// let both records coexist.
    fn combine_on_add(
        &self,
        _state: &mut Self::State,
        _current: &mut Self::Payload,
        _incoming: &Self::Payload,
        _env: &mut TickEnv<'_>,
    ) -> bool {
        false
    }
}

/// Object-safe behavior interface stored by the registry.
///
/// Implemented for every [`Behavior`]; hooks receive whole records and erased
/// contexts.
pub trait ModBehavior: Send + Sync {
    fn name(&self) -> &str;

    fn valid_targets(&self) -> TargetKinds;

    fn set_defaults(&self, record: &mut Record);

    fn initialize(&self, index: BehaviorIndex, owner: &ModTarget, record: &Record)
    -> InstanceContext;

    fn on_tick(
        &self,
        context: &mut InstanceContext,
        record: &mut Record,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault>;

    fn on_invalidated_tick(
        &self,
        context: &mut InstanceContext,
        record: &Record,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault>;

    fn on_render(&self, context: &InstanceContext, record: &Record, env: &RenderEnv<'_>);

    fn on_invalidated_render(&self, context: &InstanceContext, record: &Record, env: &RenderEnv<'_>);

    fn combine_on_add(
        &self,
        context: &mut InstanceContext,
        current: &mut Record,
        incoming: &Record,
        env: &mut TickEnv<'_>,
    ) -> bool;
}

impl<B: Behavior> ModBehavior for B {
    fn name(&self) -> &str {
        Behavior::name(self)
    }

    fn valid_targets(&self) -> TargetKinds {
        Behavior::valid_targets(self)
    }

    fn set_defaults(&self, record: &mut Record) {
        let mut payload = record.view_mut_as::<B::Payload>();
        Behavior::set_defaults(self, &mut payload);
    }

    fn initialize(
        &self,
        index: BehaviorIndex,
        owner: &ModTarget,
        record: &Record,
    ) -> InstanceContext {
        let payload = record.view_as::<B::Payload>();
        InstanceContext::new(index, Behavior::initialize(self, owner, &payload))
    }

    fn on_tick(
        &self,
        context: &mut InstanceContext,
        record: &mut Record,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault> {
        let state = state_of::<B>(self, context)?;
        let mut payload = record.view_mut_as::<B::Payload>();
        Behavior::on_tick(self, state, &mut payload, env)
    }

    fn on_invalidated_tick(
        &self,
        context: &mut InstanceContext,
        record: &Record,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault> {
        let state = state_of::<B>(self, context)?;
        let payload = record.view_as::<B::Payload>();
        Behavior::on_invalidated_tick(self, state, &payload, env)
    }

    fn on_render(&self, context: &InstanceContext, record: &Record, env: &RenderEnv<'_>) {
        if let Some(state) = context.state::<B::State>() {
            Behavior::on_render(self, state, &record.view_as::<B::Payload>(), env);
        }
    }

    fn on_invalidated_render(&self, context: &InstanceContext, record: &Record, env: &RenderEnv<'_>) {
        if let Some(state) = context.state::<B::State>() {
            Behavior::on_invalidated_render(self, state, &record.view_as::<B::Payload>(), env);
        }
    }

    fn combine_on_add(
        &self,
        context: &mut InstanceContext,
        current: &mut Record,
        incoming: &Record,
        env: &mut TickEnv<'_>,
    ) -> bool {
        let Some(state) = context.state_mut::<B::State>() else {
            return false;
        };
        let incoming = incoming.view_as::<B::Payload>();
        let mut payload = current.view_mut_as::<B::Payload>();
        Behavior::combine_on_add(self, state, &mut payload, &incoming, env)
    }
}

fn state_of<'c, B: Behavior>(
    behavior: &B,
    context: &'c mut InstanceContext,
) -> Result<&'c mut B::State, BehaviorFault> {
    context
        .state_mut::<B::State>()
        .ok_or_else(|| BehaviorFault::ContextMismatch {
            behavior: Behavior::name(behavior).to_string(),
        })
}
