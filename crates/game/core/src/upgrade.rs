//! Upgradable modifiers: a discrete level stored in the record selects one
//! contribution from an upgrade table.
//!
//! The replicated level is the single source of truth. Each tick the behavior
//! compares it with the contribution it has applied and swaps the old level's
//! entry for the new one inside the same hook, so no observer ever sees zero or
//! two level contributions for one record.

use arrayvec::ArrayVec;

use crate::behavior::{Behavior, BehaviorFault, TickEnv};
use crate::config::ModConfig;
use crate::error::{ErrorSeverity, ModError};
use crate::record::{PayloadLayout, PayloadReader, PayloadWriter, Record};
use crate::stacking::{DataOverride, StatKind};
use crate::target::{ModTarget, TargetKinds};

/// Price of one upgrade level in the host's economy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cost {
    pub credits: u32,
}

/// Tunable parameters of one level.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpgradeLevel {
    pub cost: Cost,
    /// Ticks an activation lasts; 0 keeps it active until deactivated.
    #[cfg_attr(feature = "serde", serde(default))]
    pub duration_ticks: u16,
    pub contribution: DataOverride<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UpgradeError {
    #[error("upgrade table has no levels")]
    Empty,

    #[error("upgrade table has {count} levels, maximum is {max}")]
    TooManyLevels { count: usize, max: usize },

    #[error("already at the last upgrade level {level}")]
    AtMaxLevel { level: u8 },

    #[error("no upgrade level selected")]
    NoLevel,
}

impl ModError for UpgradeError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "UPGRADE_EMPTY",
            Self::TooManyLevels { .. } => "UPGRADE_TOO_MANY_LEVELS",
            Self::AtMaxLevel { .. } => "UPGRADE_AT_MAX_LEVEL",
            Self::NoLevel => "UPGRADE_NO_LEVEL",
        }
    }
}

/// Ordered, non-empty list of levels.
#[derive(Clone, Debug, PartialEq)]
pub struct UpgradeTable {
    levels: ArrayVec<UpgradeLevel, { ModConfig::MAX_UPGRADE_LEVELS }>,
}

impl UpgradeTable {
    pub fn new(levels: impl IntoIterator<Item = UpgradeLevel>) -> Result<Self, UpgradeError> {
        let mut table = ArrayVec::new();
        let mut count = 0;
        for level in levels {
            count += 1;
            // keep counting past capacity so the error names the real size
            if count <= ModConfig::MAX_UPGRADE_LEVELS {
                table.push(level);
            }
        }

        if count == 0 {
            return Err(UpgradeError::Empty);
        }
        if count > ModConfig::MAX_UPGRADE_LEVELS {
            return Err(UpgradeError::TooManyLevels {
                count,
                max: ModConfig::MAX_UPGRADE_LEVELS,
            });
        }
        Ok(Self { levels: table })
    }

    pub fn get(&self, level: u8) -> Option<&UpgradeLevel> {
        self.levels.get(usize::from(level))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Index of the highest level.
    pub fn last_level(&self) -> u8 {
        // at most MAX_UPGRADE_LEVELS entries, never empty
        (self.levels.len() - 1) as u8
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpgradeLevel> + '_ {
        self.levels.iter()
    }
}

/// Replicated state of an upgradable modifier.
///
/// ```text
/// offset  size  field
/// 0       1     level + 1 (0 = nothing purchased)
/// 1       1     active flag
/// 2       2     remaining activation ticks, LE (0 = unlimited)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct UpgradePayload {
    pub level: Option<u8>,
    pub active: bool,
    pub remaining_ticks: u16,
}

impl PayloadLayout for UpgradePayload {
    const SIZE: usize = 4;

    fn read(reader: &mut PayloadReader<'_>) -> Self {
        Self {
            level: reader.index(),
            active: reader.bool(),
            remaining_ticks: reader.u16(),
        }
    }

    fn write(&self, writer: &mut PayloadWriter<'_>) {
        writer.index(self.level);
        writer.bool(self.active);
        writer.u16(self.remaining_ticks);
    }
}

/// Contribution currently present in the owner's stack.
#[derive(Debug, Default)]
pub struct UpgradeState {
    applied: Option<(u8, DataOverride<f32>)>,
}

impl UpgradeState {
    pub fn applied_level(&self) -> Option<u8> {
        self.applied.as_ref().map(|(level, _)| *level)
    }
}

/// Modifier whose contribution to one stat is chosen by its upgrade level.
#[derive(Clone, Debug)]
pub struct UpgradableMod {
    name: String,
    stat: StatKind,
    targets: TargetKinds,
    table: UpgradeTable,
    /// Level written by `set_defaults`.
    initial_level: Option<u8>,
}

impl UpgradableMod {
    pub fn new(name: impl Into<String>, stat: StatKind, table: UpgradeTable) -> Self {
        Self {
            name: name.into(),
            stat,
            targets: TargetKinds::all(),
            table,
            initial_level: Some(0),
        }
    }

    #[must_use]
    pub fn with_targets(mut self, targets: TargetKinds) -> Self {
        self.targets = targets;
        self
    }

    /// Level a freshly attached record starts at; `None` means not purchased.
    #[must_use]
    pub fn with_initial_level(mut self, level: Option<u8>) -> Self {
        self.initial_level = level.map(|level| level.min(self.table.last_level()));
        self
    }

    pub fn stat(&self) -> StatKind {
        self.stat
    }

    pub fn table(&self) -> &UpgradeTable {
        &self.table
    }

    /// Price of `level`, if the table has it.
    pub fn cost(&self, level: u8) -> Option<Cost> {
        self.table.get(level).map(|entry| entry.cost)
    }

    /// False once the record sits at the last level.
    pub fn can_upgrade(&self, record: &Record) -> bool {
        match record.view_as::<UpgradePayload>().level {
            Some(level) => level < self.table.last_level(),
            None => true,
        }
    }

    /// Price of the next level for `record`, if any.
    pub fn next_cost(&self, record: &Record) -> Option<Cost> {
        match record.view_as::<UpgradePayload>().level {
            Some(level) if level < self.table.last_level() => self.cost(level + 1),
            Some(_) => None,
            None => self.cost(0),
        }
    }

    /// Raises the record's level by one and returns the new level.
    ///
    /// The swap of contributions happens on the record's next tick.
    pub fn upgrade(&self, record: &mut Record) -> Result<u8, UpgradeError> {
        let mut payload = record.view_mut_as::<UpgradePayload>();
        let next = match payload.level {
            Some(level) if level >= self.table.last_level() => {
                return Err(UpgradeError::AtMaxLevel { level });
            }
            Some(level) => level + 1,
            None => 0,
        };
        payload.level = Some(next);
        Ok(next)
    }

    /// Starts an activation using the duration of the current level.
    pub fn activate(&self, record: &mut Record) -> Result<(), UpgradeError> {
        let mut payload = record.view_mut_as::<UpgradePayload>();
        let level = payload
            .level
            .and_then(|level| self.table.get(level))
            .ok_or(UpgradeError::NoLevel)?;
        payload.active = true;
        payload.remaining_ticks = level.duration_ticks;
        Ok(())
    }

    pub fn deactivate(&self, record: &mut Record) {
        let mut payload = record.view_mut_as::<UpgradePayload>();
        payload.active = false;
        payload.remaining_ticks = 0;
    }

    fn desired(&self, payload: &UpgradePayload) -> Option<(u8, DataOverride<f32>)> {
        if !payload.active {
            return None;
        }
        let level = payload.level?;
        self.table
            .get(level)
            .map(|entry| (level, entry.contribution.clone()))
    }
}

impl Behavior for UpgradableMod {
    type Payload = UpgradePayload;
    type State = UpgradeState;

    fn name(&self) -> &str {
        &self.name
    }

    fn valid_targets(&self) -> TargetKinds {
        self.targets
    }

    fn set_defaults(&self, payload: &mut UpgradePayload) {
        *payload = UpgradePayload {
            level: self.initial_level,
            active: false,
            remaining_ticks: 0,
        };
    }

    fn initialize(&self, _owner: &ModTarget, _payload: &UpgradePayload) -> UpgradeState {
        UpgradeState::default()
    }

    fn on_tick(
        &self,
        state: &mut UpgradeState,
        payload: &mut UpgradePayload,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault> {
        if let Some(level) = payload.level {
            let last = self.table.last_level();
            if level > last {
                env.report(BehaviorFault::malformed(
                    "level",
                    format!("level {level} exceeds last level {last}"),
                ));
                payload.level = Some(last);
            }
        }

        let desired = self.desired(payload);
        if desired != state.applied {
            let stack = env.target.stats.stack_mut(self.stat);
            if let Some((_, old)) = state.applied.take() {
                stack.remove(&old);
            }
            if let Some((_, new)) = &desired {
                stack.add(new.clone());
            }
            state.applied = desired;
        }

        // this tick counted; the contribution leaves on the next one
        if payload.active && payload.remaining_ticks > 0 {
            payload.remaining_ticks -= 1;
            if payload.remaining_ticks == 0 {
                payload.active = false;
            }
        }
        Ok(())
    }

    fn on_invalidated_tick(
        &self,
        state: &mut UpgradeState,
        _payload: &UpgradePayload,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault> {
        if let Some((_, applied)) = state.applied.take() {
            env.target.stats.stack_mut(self.stat).remove(&applied);
        }
        Ok(())
    }

    fn combine_on_add(
        &self,
        _state: &mut UpgradeState,
        current: &mut UpgradePayload,
        incoming: &UpgradePayload,
        _env: &mut TickEnv<'_>,
    ) -> bool {
        current.level = current.level.max(incoming.level);
        if incoming.active {
            // an inactive instance has no running timer to keep
            current.remaining_ticks = if !current.active {
                incoming.remaining_ticks
            } else if current.remaining_ticks == 0 || incoming.remaining_ticks == 0 {
                0
            } else {
                current.remaining_ticks.max(incoming.remaining_ticks)
            };
            current.active = true;
        }
        true
    }
}
