use crate::behavior::{Behavior, BehaviorFault, Placement, SpawnRequest, TickEnv};
use crate::record::{PayloadLayout, PayloadReader, PayloadWriter};
use crate::target::{ModTarget, TargetKind, TargetKinds};
use crate::types::{Tick, Vec2};

/// Replicated firing schedule of an [`EmitterMod`].
///
/// ```text
/// offset  size  field
/// 0       1     projectile prefab + 1 (0 = none)
/// 1       2     interval ticks, LE
/// 3       4     next fire tick, LE
/// 7       2     shots remaining, LE (0 = unlimited)
/// 9       8     aim direction (x, y)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct EmitterPayload {
    pub prefab: Option<u8>,
    pub interval_ticks: u16,
    pub next_fire_tick: u32,
    pub shots_remaining: u16,
    pub direction: Vec2,
}

impl PayloadLayout for EmitterPayload {
    const SIZE: usize = 17;

    fn read(reader: &mut PayloadReader<'_>) -> Self {
        Self {
            prefab: reader.index(),
            interval_ticks: reader.u16(),
            next_fire_tick: reader.u32(),
            shots_remaining: reader.u16(),
            direction: reader.vec2(),
        }
    }

    fn write(&self, writer: &mut PayloadWriter<'_>) {
        writer.index(self.prefab);
        writer.u16(self.interval_ticks);
        writer.u32(self.next_fire_tick);
        writer.u16(self.shots_remaining);
        writer.vec2(self.direction);
    }
}

/// Periodically spawns projectiles that inherit the owner's overrides.
#[derive(Clone, Debug)]
pub struct EmitterMod {
    name: String,
    targets: TargetKinds,
    projectile_prefab: u8,
    interval_ticks: u16,
    speed: f32,
    shots: u16,
}

impl EmitterMod {
    pub fn new(name: impl Into<String>, projectile_prefab: u8, interval_ticks: u16, speed: f32) -> Self {
        Self {
            name: name.into(),
            targets: TargetKinds::VEHICLE | TargetKinds::CHARACTER | TargetKinds::STRUCTURE,
            projectile_prefab,
            interval_ticks: interval_ticks.max(1),
            speed,
            shots: 0,
        }
    }

    #[must_use]
    pub fn with_targets(mut self, targets: TargetKinds) -> Self {
        self.targets = targets;
        self
    }

    /// Number of shots before the record expires; 0 fires until removed.
    #[must_use]
    pub fn with_shots(mut self, shots: u16) -> Self {
        self.shots = shots;
        self
    }
}

impl Behavior for EmitterMod {
    type Payload = EmitterPayload;
    type State = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn valid_targets(&self) -> TargetKinds {
        self.targets
    }

    fn set_defaults(&self, payload: &mut EmitterPayload) {
        *payload = EmitterPayload {
            prefab: Some(self.projectile_prefab),
            interval_ticks: self.interval_ticks,
            next_fire_tick: 0,
            shots_remaining: self.shots,
            direction: Vec2::new(1.0, 0.0),
        };
    }

    fn initialize(&self, _owner: &ModTarget, _payload: &EmitterPayload) {}

    fn on_tick(
        &self,
        _state: &mut (),
        payload: &mut EmitterPayload,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault> {
        if payload.interval_ticks == 0 {
            env.report(BehaviorFault::malformed("interval_ticks", "zero interval"));
            payload.interval_ticks = 1;
        }
        if env.tick < Tick(u64::from(payload.next_fire_tick)) {
            return Ok(());
        }

        let Some(prefab) = payload.prefab else {
            env.report(BehaviorFault::malformed("prefab", "no projectile prefab"));
            return Ok(());
        };
        let length = payload.direction.length();
        if !payload.direction.is_finite() || length <= f32::EPSILON {
            env.report(BehaviorFault::malformed(
                "direction",
                format!("cannot aim along {:?}", payload.direction),
            ));
            return Ok(());
        }

        let aim = payload.direction * (1.0 / length);
        let placement = Placement {
            position: env.target.position,
            velocity: env.target.velocity + aim * self.speed,
        };
        let overrides = env.target.stats.clone();
        env.spawn(
            SpawnRequest::new(prefab, TargetKind::Projectile, placement)
                .then(move |projectile| projectile.stats.extend_from(&overrides)),
        );

        let next = env.tick + u64::from(payload.interval_ticks);
        payload.next_fire_tick = u32::try_from(next.0).unwrap_or(u32::MAX);

        if payload.shots_remaining > 0 {
            payload.shots_remaining -= 1;
            if payload.shots_remaining == 0 {
                env.expire();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{ModBehavior, Spawner};
    use crate::record::{BehaviorIndex, Record};
    use crate::stacking::{DataOverride, StatKind};
    use crate::types::EntityId;

    #[derive(Default)]
    struct Collect(Vec<SpawnRequest>);

    impl Spawner for Collect {
        fn spawn(&mut self, request: SpawnRequest) {
            self.0.push(request);
        }
    }

    #[test]
    fn fires_on_interval_and_copies_overrides() {
        let emitter = EmitterMod::new("turret", 7, 3, 10.0).with_shots(2);
        let mut owner = ModTarget::new(EntityId(1), TargetKind::Structure, 0, 0)
            .with_position(Vec2::new(5.0, 5.0));
        owner
            .stats
            .stack_mut(StatKind::Damage)
            .add(DataOverride::multiply(0, 2.0));

        let mut record = Record::encode(Some(BehaviorIndex(0)), 0, 0).unwrap();
        ModBehavior::set_defaults(&emitter, &mut record);
        let mut context = ModBehavior::initialize(&emitter, BehaviorIndex(0), &owner, &record);

        let mut spawner = Collect::default();
        let mut faults = Vec::new();
        let mut expired_at = None;
        for tick in 0..10 {
            let mut env = TickEnv::new(Tick(tick), 0.1, &mut owner, &mut spawner, &mut faults);
            ModBehavior::on_tick(&emitter, &mut context, &mut record, &mut env).unwrap();
            if env.is_expired() {
                expired_at = Some(tick);
                break;
            }
        }

        assert!(faults.is_empty());
        assert_eq!(expired_at, Some(3));
        assert_eq!(spawner.0.len(), 2);

        let request = spawner.0.remove(0);
        assert_eq!(request.prefab, 7);
        assert_eq!(request.kind, TargetKind::Projectile);
        assert_eq!(request.placement.position, Vec2::new(5.0, 5.0));
        assert_eq!(request.placement.velocity, Vec2::new(10.0, 0.0));

        let mut projectile = ModTarget::new(EntityId(2), TargetKind::Projectile, 7, 1);
        if let Some(post_spawn) = request.post_spawn {
            post_spawn(&mut projectile);
        }
        assert_eq!(projectile.stats.effective(StatKind::Damage, 4.0), 8.0);
    }

    #[test]
    fn zero_direction_is_reported() {
        let emitter = EmitterMod::new("turret", 7, 1, 10.0);
        let mut owner = ModTarget::new(EntityId(1), TargetKind::Structure, 0, 0);
        let mut record = Record::encode(Some(BehaviorIndex(0)), 0, 0).unwrap();
        ModBehavior::set_defaults(&emitter, &mut record);
        record.view_mut_as::<EmitterPayload>().direction = Vec2::ZERO;
        let mut context = ModBehavior::initialize(&emitter, BehaviorIndex(0), &owner, &record);

        let mut spawner = Collect::default();
        let mut faults = Vec::new();
        let mut env = TickEnv::new(Tick(0), 0.1, &mut owner, &mut spawner, &mut faults);
        ModBehavior::on_tick(&emitter, &mut context, &mut record, &mut env).unwrap();

        assert!(spawner.0.is_empty());
        assert_eq!(faults.len(), 1);
    }
}
