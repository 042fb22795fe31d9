use crate::behavior::{Behavior, BehaviorFault, TickEnv};
use crate::record::{PayloadLayout, PayloadReader, PayloadWriter};
use crate::stacking::{DataOverride, StackingType, StatKind};
use crate::target::{ModTarget, TargetKinds};

/// Replicated contribution of a [`StatModifierMod`].
///
/// ```text
/// offset  size  field
/// 0       2     priority, LE
/// 2       1     stacking type repr
/// 3       4     value, f32 LE
/// 7       4     remaining ticks, LE (0 = unlimited)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct StatModifierPayload {
    pub priority: u16,
    pub stacking: u8,
    pub value: f32,
    pub remaining_ticks: u32,
}

impl StatModifierPayload {
    pub fn new(contribution: &DataOverride<f32>, remaining_ticks: u32) -> Self {
        Self {
            priority: contribution.priority,
            stacking: contribution.stacking.to_repr(),
            value: contribution.data,
            remaining_ticks,
        }
    }

    /// Decoded contribution, or the reason it cannot be applied.
    pub fn contribution(&self) -> Result<DataOverride<f32>, BehaviorFault> {
        let stacking = StackingType::from_repr(self.stacking).ok_or_else(|| {
            BehaviorFault::malformed("stacking", format!("unknown stacking type {}", self.stacking))
        })?;
        if !self.value.is_finite() {
            return Err(BehaviorFault::malformed(
                "value",
                format!("non-finite value {}", self.value),
            ));
        }
        Ok(DataOverride::new(self.priority, stacking, self.value))
    }
}

impl PayloadLayout for StatModifierPayload {
    const SIZE: usize = 11;

    fn read(reader: &mut PayloadReader<'_>) -> Self {
        Self {
            priority: reader.u16(),
            stacking: reader.u8(),
            value: reader.f32(),
            remaining_ticks: reader.u32(),
        }
    }

    fn write(&self, writer: &mut PayloadWriter<'_>) {
        writer.u16(self.priority);
        writer.u8(self.stacking);
        writer.f32(self.value);
        writer.u32(self.remaining_ticks);
    }
}

/// Plain modifier: one override on one stat while the record is valid.
#[derive(Clone, Debug)]
pub struct StatModifierMod {
    name: String,
    stat: StatKind,
    targets: TargetKinds,
    contribution: DataOverride<f32>,
    duration_ticks: u32,
}

impl StatModifierMod {
    pub fn new(name: impl Into<String>, stat: StatKind, contribution: DataOverride<f32>) -> Self {
        Self {
            name: name.into(),
            stat,
            targets: TargetKinds::all(),
            contribution,
            duration_ticks: 0,
        }
    }

    #[must_use]
    pub fn with_targets(mut self, targets: TargetKinds) -> Self {
        self.targets = targets;
        self
    }

    /// Lifetime of freshly attached records; 0 keeps them until removed.
    #[must_use]
    pub fn with_duration(mut self, ticks: u32) -> Self {
        self.duration_ticks = ticks;
        self
    }

    pub fn stat(&self) -> StatKind {
        self.stat
    }
}

impl Behavior for StatModifierMod {
    type Payload = StatModifierPayload;
    /// Contribution currently in the owner's stack.
    type State = Option<DataOverride<f32>>;

    fn name(&self) -> &str {
        &self.name
    }

    fn valid_targets(&self) -> TargetKinds {
        self.targets
    }

    fn set_defaults(&self, payload: &mut StatModifierPayload) {
        *payload = StatModifierPayload::new(&self.contribution, self.duration_ticks);
    }

    fn initialize(&self, _owner: &ModTarget, _payload: &StatModifierPayload) -> Self::State {
        None
    }

    fn on_tick(
        &self,
        applied: &mut Self::State,
        payload: &mut StatModifierPayload,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault> {
        let desired = match payload.contribution() {
            Ok(contribution) => Some(contribution),
            Err(fault) => {
                env.report(fault);
                None
            }
        };

        if desired != *applied {
            let stack = env.target.stats.stack_mut(self.stat);
            if let Some(old) = applied.take() {
                stack.remove(&old);
            }
            if let Some(new) = &desired {
                stack.add(new.clone());
            }
            *applied = desired;
        }

        if payload.remaining_ticks > 0 {
            payload.remaining_ticks -= 1;
            if payload.remaining_ticks == 0 {
                env.expire();
            }
        }
        Ok(())
    }

    fn on_invalidated_tick(
        &self,
        applied: &mut Self::State,
        _payload: &StatModifierPayload,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault> {
        if let Some(old) = applied.take() {
            env.target.stats.stack_mut(self.stat).remove(&old);
        }
        Ok(())
    }

    fn combine_on_add(
        &self,
        _applied: &mut Self::State,
        current: &mut StatModifierPayload,
        incoming: &StatModifierPayload,
        _env: &mut TickEnv<'_>,
    ) -> bool {
        if current.priority != incoming.priority || current.stacking != incoming.stacking {
            return false;
        }
        let Some(stacking) = StackingType::from_repr(current.stacking) else {
            return false;
        };

        current.value = match stacking {
            StackingType::Add => current.value + incoming.value,
            StackingType::Multiply => current.value * incoming.value,
            StackingType::Override => incoming.value,
            StackingType::Min => current.value.min(incoming.value),
            StackingType::Max => current.value.max(incoming.value),
        };
        current.remaining_ticks = if current.remaining_ticks == 0 || incoming.remaining_ticks == 0 {
            0
        } else {
            current.remaining_ticks.max(incoming.remaining_ticks)
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{ModBehavior, SpawnRequest, Spawner};
    use crate::record::{BehaviorIndex, Record};
    use crate::target::TargetKind;
    use crate::types::{EntityId, Tick};

    struct Discard;

    impl Spawner for Discard {
        fn spawn(&mut self, _request: SpawnRequest) {}
    }

    fn haste() -> StatModifierMod {
        StatModifierMod::new(
            "haste",
            StatKind::ReloadTime,
            DataOverride::multiply(10, 0.5),
        )
    }

    #[test]
    fn contributes_while_valid_and_releases_on_teardown() {
        let haste = haste();
        let mut owner = ModTarget::new(EntityId(1), TargetKind::Vehicle, 0, 0);
        let mut record = Record::encode(Some(BehaviorIndex(2)), 0, 0).unwrap();
        ModBehavior::set_defaults(&haste, &mut record);
        let mut context = ModBehavior::initialize(&haste, BehaviorIndex(2), &owner, &record);

        let mut spawner = Discard;
        let mut faults = Vec::new();
        let mut env = TickEnv::new(Tick::ZERO, 1.0, &mut owner, &mut spawner, &mut faults);
        ModBehavior::on_tick(&haste, &mut context, &mut record, &mut env).unwrap();
        ModBehavior::on_tick(&haste, &mut context, &mut record, &mut env).unwrap();
        assert_eq!(env.target.stats.effective(StatKind::ReloadTime, 1.0), 0.5);
        assert_eq!(env.target.stats.len(), 1);

        record.invalidate();
        ModBehavior::on_invalidated_tick(&haste, &mut context, &record, &mut env).unwrap();
        assert_eq!(env.target.stats.effective(StatKind::ReloadTime, 1.0), 1.0);
        assert!(!env.is_expired());
    }

    #[test]
    fn malformed_stacking_is_a_reported_noop() {
        let haste = haste();
        let mut owner = ModTarget::new(EntityId(1), TargetKind::Vehicle, 0, 0);
        let mut record = Record::encode(Some(BehaviorIndex(0)), 0, 0).unwrap();
        record.store(&StatModifierPayload {
            priority: 1,
            stacking: 42,
            value: 3.0,
            remaining_ticks: 0,
        });
        let mut context = ModBehavior::initialize(&haste, BehaviorIndex(0), &owner, &record);

        let mut spawner = Discard;
        let mut faults = Vec::new();
        let mut env = TickEnv::new(Tick::ZERO, 1.0, &mut owner, &mut spawner, &mut faults);
        ModBehavior::on_tick(&haste, &mut context, &mut record, &mut env).unwrap();

        assert!(owner.stats.is_empty());
        assert!(matches!(
            faults.as_slice(),
            [BehaviorFault::MalformedPayload { field: "stacking", .. }]
        ));
    }

    #[test]
    fn lifetime_expires_the_record() {
        let haste = haste().with_duration(2);
        let mut owner = ModTarget::new(EntityId(1), TargetKind::Vehicle, 0, 0);
        let mut record = Record::encode(Some(BehaviorIndex(0)), 0, 0).unwrap();
        ModBehavior::set_defaults(&haste, &mut record);
        let mut context = ModBehavior::initialize(&haste, BehaviorIndex(0), &owner, &record);

        let mut spawner = Discard;
        let mut faults = Vec::new();
        let mut first = TickEnv::new(Tick(0), 1.0, &mut owner, &mut spawner, &mut faults);
        ModBehavior::on_tick(&haste, &mut context, &mut record, &mut first).unwrap();
        assert!(!first.is_expired());

        let mut second = TickEnv::new(Tick(1), 1.0, &mut owner, &mut spawner, &mut faults);
        ModBehavior::on_tick(&haste, &mut context, &mut record, &mut second).unwrap();
        assert!(second.is_expired());
    }

    #[test]
    fn combine_merges_matching_contributions() {
        let haste = haste();
        let mut owner = ModTarget::new(EntityId(1), TargetKind::Vehicle, 0, 0);
        let mut current = StatModifierPayload::new(&DataOverride::multiply(10, 0.5), 30);
        let incoming = StatModifierPayload::new(&DataOverride::multiply(10, 0.5), 60);
        let other = StatModifierPayload::new(&DataOverride::add(10, 1.0), 0);
        let mut applied = None;

        let mut spawner = Discard;
        let mut faults = Vec::new();
        let mut env = TickEnv::new(Tick::ZERO, 1.0, &mut owner, &mut spawner, &mut faults);
        assert!(Behavior::combine_on_add(&haste, &mut applied, &mut current, &incoming, &mut env));
        assert_eq!(current.value, 0.25);
        assert_eq!(current.remaining_ticks, 60);

        assert!(!Behavior::combine_on_add(&haste, &mut applied, &mut current, &other, &mut env));
    }
}
