//! Deterministic core of the networked modifier subsystem.
//!
//! `netmod-core` defines the 32-byte replicated [`Record`], the
//! [`ModRegistry`] that routes lifecycle hooks to [`Behavior`]s by the record's
//! one-byte tag, and the [`OverrideStack`] that folds prioritized contributions
//! into one effective value per stat. It performs no I/O and no logging; the
//! runtime crate drives ticks and surfaces diagnostics.
pub mod behavior;
pub mod config;
pub mod error;
pub mod mods;
pub mod record;
pub mod registry;
pub mod stacking;
pub mod target;
pub mod types;
pub mod upgrade;

pub use behavior::{
    Behavior, BehaviorFault, InstanceContext, ModBehavior, Placement, PostSpawn, RenderEnv,
    SpawnRequest, Spawner, TickEnv,
};
pub use config::ModConfig;
pub use error::{ErrorSeverity, ModError};
pub use mods::{
    EmitterMod, EmitterPayload, MotionMod, MotionPayload, StatModifierMod, StatModifierPayload,
};
pub use record::{
    BehaviorIndex, PayloadBytes, PayloadLayout, PayloadMut, PayloadReader, PayloadWriter, Record,
    RecordError, RecordField,
};
pub use registry::{DispatchError, ModRegistry, RegistryError};
pub use stacking::{DataOverride, OverrideStack, Stackable, StackingType, StatKind, StatOverrides};
pub use target::{ModTarget, TargetKind, TargetKinds};
pub use types::{EntityId, Tick, Vec2};
pub use upgrade::{
    Cost, UpgradableMod, UpgradeError, UpgradeLevel, UpgradePayload, UpgradeState, UpgradeTable,
};
