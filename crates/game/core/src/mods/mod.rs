//! Built-in modifier behaviors.
//!
//! Content catalogs instantiate these with tuned parameters; hosts may register
//! their own [`Behavior`](crate::Behavior) implementations alongside them.

mod emitter;
mod motion;
mod stat_modifier;

pub use emitter::{EmitterMod, EmitterPayload};
pub use motion::{MotionMod, MotionPayload};
pub use stat_modifier::{StatModifierMod, StatModifierPayload};
