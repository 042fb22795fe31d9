use strum::EnumCount;

use super::OverrideStack;

/// Gameplay quantities that modifiers can stack onto.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumCount,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StatKind {
    /// Seconds needed to reload a weapon
    ReloadTime,
    /// Movement speed multiplier
    MoveSpeed,
    /// Damage dealt per hit
    Damage,
    /// Shots per second
    FireRate,
    /// Hit point ceiling
    MaxHealth,
}

impl StatKind {
    const fn slot(self) -> usize {
        self as usize
    }
}

/// One override stack per stat, owned by a single target.
#[derive(Clone, Debug, PartialEq)]
pub struct StatOverrides {
    stacks: [OverrideStack<f32>; StatKind::COUNT],
}

impl StatOverrides {
    pub fn new() -> Self {
        Self {
            stacks: std::array::from_fn(|_| OverrideStack::new()),
        }
    }

    pub fn stack(&self, stat: StatKind) -> &OverrideStack<f32> {
        &self.stacks[stat.slot()]
    }

    pub fn stack_mut(&mut self, stat: StatKind) -> &mut OverrideStack<f32> {
        &mut self.stacks[stat.slot()]
    }

    /// Effective value of `stat` folded over `base`.
    pub fn effective(&self, stat: StatKind, base: f32) -> f32 {
        self.stack(stat).effective_value(base)
    }

    /// Appends copies of every contribution in `other`.
    pub fn extend_from(&mut self, other: &StatOverrides) {
        for (mine, theirs) in self.stacks.iter_mut().zip(other.stacks.iter()) {
            mine.extend_from(theirs);
        }
    }

    /// Total number of contributions across all stats.
    pub fn len(&self) -> usize {
        self.stacks.iter().map(OverrideStack::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.iter().all(OverrideStack::is_empty)
    }
}

impl Default for StatOverrides {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacking::DataOverride;

    #[test]
    fn stats_are_independent() {
        let mut stats = StatOverrides::new();
        stats
            .stack_mut(StatKind::ReloadTime)
            .add(DataOverride::multiply(10, 0.5));

        assert_eq!(stats.effective(StatKind::ReloadTime, 1.0), 0.5);
        assert_eq!(stats.effective(StatKind::MoveSpeed, 1.0), 1.0);
        assert_eq!(stats.len(), 1);
    }

    #[test]
    fn stat_names_parse_case_insensitively() {
        assert_eq!("reload_time".parse::<StatKind>(), Ok(StatKind::ReloadTime));
        assert_eq!("MOVE_SPEED".parse::<StatKind>(), Ok(StatKind::MoveSpeed));
        assert_eq!(StatKind::FireRate.to_string(), "fire_rate");
    }
}
