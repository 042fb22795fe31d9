use crate::behavior::{Behavior, BehaviorFault, TickEnv};
use crate::record::{PayloadLayout, PayloadReader, PayloadWriter, Record};
use crate::target::{ModTarget, TargetKinds};
use crate::types::{Tick, Vec2};

/// Constant-acceleration trajectory anchored at `start_tick`.
///
/// ```text
/// offset  size  field
/// 0       4     start tick, LE
/// 4       8     origin (x, y)
/// 12      8     velocity (x, y)
/// 20      8     acceleration (x, y)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct MotionPayload {
    pub start_tick: u32,
    pub origin: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
}

impl MotionPayload {
    /// Position and velocity `seconds` after the start tick.
    pub fn sample(&self, seconds: f32) -> (Vec2, Vec2) {
        let position =
            self.origin + self.velocity * seconds + self.acceleration * (0.5 * seconds * seconds);
        let velocity = self.velocity + self.acceleration * seconds;
        (position, velocity)
    }

    fn is_finite(&self) -> bool {
        self.origin.is_finite() && self.velocity.is_finite() && self.acceleration.is_finite()
    }

    fn elapsed(&self, now: Tick, delta: f32) -> f32 {
        now.since(Tick(u64::from(self.start_tick))) as f32 * delta
    }
}

impl PayloadLayout for MotionPayload {
    const SIZE: usize = 28;

    fn read(reader: &mut PayloadReader<'_>) -> Self {
        Self {
            start_tick: reader.u32(),
            origin: reader.vec2(),
            velocity: reader.vec2(),
            acceleration: reader.vec2(),
        }
    }

    fn write(&self, writer: &mut PayloadWriter<'_>) {
        writer.u32(self.start_tick);
        writer.vec2(self.origin);
        writer.vec2(self.velocity);
        writer.vec2(self.acceleration);
    }
}

/// Drives the owner's position along a kinematic trajectory.
///
/// The trajectory is a pure function of the payload and the tick clock, so
/// every peer computes the same position without replicating it per tick.
#[derive(Clone, Debug)]
pub struct MotionMod {
    name: String,
    targets: TargetKinds,
}

impl MotionMod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: TargetKinds::VEHICLE | TargetKinds::CHARACTER | TargetKinds::PROJECTILE,
        }
    }

    #[must_use]
    pub fn with_targets(mut self, targets: TargetKinds) -> Self {
        self.targets = targets;
        self
    }

    /// Writes a trajectory starting at `tick` into `record`.
    pub fn launch(
        &self,
        record: &mut Record,
        tick: Tick,
        origin: Vec2,
        velocity: Vec2,
        acceleration: Vec2,
    ) {
        record.store(&MotionPayload {
            // trajectories are re-based long before u32 ticks run out
            start_tick: tick.0 as u32,
            origin,
            velocity,
            acceleration,
        });
    }
}

impl Behavior for MotionMod {
    type Payload = MotionPayload;
    type State = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn valid_targets(&self) -> TargetKinds {
        self.targets
    }

    fn initialize(&self, _owner: &ModTarget, _payload: &MotionPayload) {}

    fn on_tick(
        &self,
        _state: &mut (),
        payload: &mut MotionPayload,
        env: &mut TickEnv<'_>,
    ) -> Result<(), BehaviorFault> {
        if !payload.is_finite() {
            env.report(BehaviorFault::malformed("trajectory", "non-finite component"));
            return Ok(());
        }

        let (position, velocity) = payload.sample(payload.elapsed(env.tick, env.delta));
        env.target.position = position;
        env.target.velocity = velocity;
        Ok(())
    }

    /// Folds the incoming impulse into the running trajectory, re-based at the
    /// current tick so the position has no jump.
    fn combine_on_add(
        &self,
        _state: &mut (),
        current: &mut MotionPayload,
        incoming: &MotionPayload,
        env: &mut TickEnv<'_>,
    ) -> bool {
        if !current.is_finite() || !incoming.is_finite() {
            return false;
        }

        let (position, velocity) = current.sample(current.elapsed(env.tick, env.delta));
        *current = MotionPayload {
            start_tick: env.tick.0 as u32,
            origin: position,
            velocity: velocity + incoming.velocity,
            acceleration: current.acceleration + incoming.acceleration,
        };
        true
    }
}
