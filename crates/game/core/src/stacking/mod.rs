//! Override stacking: many modifiers contributing prioritized adjustments to
//! one gameplay value.
//!
//! Contributions are [`DataOverride`]s folded over a base value in ascending
//! priority. Equal priorities never collapse; they apply in insertion order.
//!
//! ```
//! # use netmod_core::stacking::{DataOverride, OverrideStack};
//! let mut stack = OverrideStack::new();
//! stack.add(DataOverride::add(1, 5.0));
//! stack.add(DataOverride::add(1, 3.0));
//! stack.add(DataOverride::multiply(2, 2.0));
//! assert_eq!(stack.effective_value(10.0), 36.0);
//! ```

mod stack;
mod stat;

pub use stack::OverrideStack;
pub use stat::{StatKind, StatOverrides};

/// How an override combines with the running value.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::FromRepr,
    strum::EnumIter,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[repr(u8)]
pub enum StackingType {
    /// `running + data`
    Add = 0,
    /// `running * data`
    Multiply = 1,
    /// `data`, replacing everything folded before it
    Override = 2,
    /// `min(running, data)`
    Min = 3,
    /// `max(running, data)`
    Max = 4,
}

impl StackingType {
    /// Wire representation used inside record payloads.
    pub const fn to_repr(self) -> u8 {
        self as u8
    }
}

/// Values that can be stacked.
///
/// Differential structs implement this fieldwise; fields that a contribution
/// does not touch carry the identity of its stacking type (0 for `Add`,
/// 1 for `Multiply`).
pub trait Stackable: Clone + PartialEq + core::fmt::Debug {
    fn add(&self, rhs: &Self) -> Self;
    fn mul(&self, rhs: &Self) -> Self;
    fn min(&self, rhs: &Self) -> Self;
    fn max(&self, rhs: &Self) -> Self;

    /// Applies `data` to `self` with the given stacking operator.
    fn stacked(&self, kind: StackingType, data: &Self) -> Self {
        match kind {
            StackingType::Add => self.add(data),
            StackingType::Multiply => self.mul(data),
            StackingType::Override => data.clone(),
            StackingType::Min => Stackable::min(self, data),
            StackingType::Max => Stackable::max(self, data),
        }
    }
}

macro_rules! impl_stackable_float {
    ($($ty:ty),*) => {$(
        impl Stackable for $ty {
            fn add(&self, rhs: &Self) -> Self { self + rhs }
            fn mul(&self, rhs: &Self) -> Self { self * rhs }
            fn min(&self, rhs: &Self) -> Self { <$ty>::min(*self, *rhs) }
            fn max(&self, rhs: &Self) -> Self { <$ty>::max(*self, *rhs) }
        }
    )*};
}

macro_rules! impl_stackable_int {
    ($($ty:ty),*) => {$(
        impl Stackable for $ty {
            fn add(&self, rhs: &Self) -> Self { self.saturating_add(*rhs) }
            fn mul(&self, rhs: &Self) -> Self { self.saturating_mul(*rhs) }
            fn min(&self, rhs: &Self) -> Self { Ord::min(*self, *rhs) }
            fn max(&self, rhs: &Self) -> Self { Ord::max(*self, *rhs) }
        }
    )*};
}

impl_stackable_float!(f32, f64);
impl_stackable_int!(i32, i64);

impl Stackable for crate::Vec2 {
    fn add(&self, rhs: &Self) -> Self {
        *self + *rhs
    }

    fn mul(&self, rhs: &Self) -> Self {
        crate::Vec2::new(self.x * rhs.x, self.y * rhs.y)
    }

    fn min(&self, rhs: &Self) -> Self {
        crate::Vec2::new(self.x.min(rhs.x), self.y.min(rhs.y))
    }

    fn max(&self, rhs: &Self) -> Self {
        crate::Vec2::new(self.x.max(rhs.x), self.y.max(rhs.y))
    }
}

/// One prioritized contribution to a stacked value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataOverride<T> {
    /// Lower priorities apply first.
    pub priority: u16,
    pub stacking: StackingType,
    pub data: T,
}

impl<T> DataOverride<T> {
    pub fn new(priority: u16, stacking: StackingType, data: T) -> Self {
        Self {
            priority,
            stacking,
            data,
        }
    }

    pub fn add(priority: u16, data: T) -> Self {
        Self::new(priority, StackingType::Add, data)
    }

    pub fn multiply(priority: u16, data: T) -> Self {
        Self::new(priority, StackingType::Multiply, data)
    }

    pub fn replace(priority: u16, data: T) -> Self {
        Self::new(priority, StackingType::Override, data)
    }
}

impl<T: Stackable> DataOverride<T> {
    /// Applies this contribution to `running`.
    pub fn apply(&self, running: &T) -> T {
        running.stacked(self.stacking, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacking_type_repr_round_trips() {
        use strum::IntoEnumIterator;
        for kind in StackingType::iter() {
            assert_eq!(StackingType::from_repr(kind.to_repr()), Some(kind));
        }
        assert_eq!(StackingType::from_repr(9), None);
    }

    #[test]
    fn integer_stacking_saturates() {
        assert_eq!(i32::MAX.stacked(StackingType::Add, &1), i32::MAX);
        assert_eq!(7i32.stacked(StackingType::Min, &3), 3);
    }

    #[test]
    fn vec2_stacks_fieldwise() {
        let running = crate::Vec2::new(2.0, 4.0);
        // y is nulled with the multiply identity
        let scaled = running.stacked(StackingType::Multiply, &crate::Vec2::new(0.5, 1.0));
        assert_eq!(scaled, crate::Vec2::new(1.0, 4.0));
    }
}
