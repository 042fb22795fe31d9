//! Entities that carry modifiers.

use bitflags::bitflags;

use crate::stacking::StatOverrides;
use crate::types::{EntityId, Vec2};

bitflags! {
    /// Set of entity kinds a behavior may be attached to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct TargetKinds: u8 {
        const VEHICLE    = 1 << 0;
        const CHARACTER  = 1 << 1;
        const PROJECTILE = 1 << 2;
        const STRUCTURE  = 1 << 3;
    }
}

/// Concrete kind of one entity.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TargetKind {
    Vehicle,
    Character,
    Projectile,
    Structure,
}

impl TargetKind {
    pub const fn flag(self) -> TargetKinds {
        match self {
            Self::Vehicle => TargetKinds::VEHICLE,
            Self::Character => TargetKinds::CHARACTER,
            Self::Projectile => TargetKinds::PROJECTILE,
            Self::Structure => TargetKinds::STRUCTURE,
        }
    }
}

/// The parts of an entity that modifiers read and write.
///
/// Everything else about the entity (meshes, physics bodies, input) belongs
/// to the host engine.
#[derive(Clone, Debug, PartialEq)]
pub struct ModTarget {
    pub id: EntityId,
    pub kind: TargetKind,
    /// Template the entity was spawned from.
    pub prefab: u8,
    /// Index of the entity within its network scope.
    pub index: u16,
    pub position: Vec2,
    pub velocity: Vec2,
    /// One override stack per stat this entity exposes.
    pub stats: StatOverrides,
}

impl ModTarget {
    pub fn new(id: EntityId, kind: TargetKind, prefab: u8, index: u16) -> Self {
        Self {
            id,
            kind,
            prefab,
            index,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            stats: StatOverrides::new(),
        }
    }

    #[must_use]
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn accepts(&self, kinds: TargetKinds) -> bool {
        kinds.contains(self.kind.flag())
    }
}
