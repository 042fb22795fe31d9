use std::collections::BTreeMap;

use super::{DataOverride, Stackable};

/// Ordered multiset of overrides for one stat of one target.
///
/// Entries are keyed by `(priority, insertion sequence)`, so any number of
/// logically equal entries coexist. Every method borrows the stack for the
/// duration of the call only; hooks of different modifiers may add and remove
/// entries freely within one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct OverrideStack<T> {
    entries: BTreeMap<(u16, u64), DataOverride<T>>,
    next_sequence: u64,
}

impl<T> Default for OverrideStack<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_sequence: 0,
        }
    }
}

impl<T: Stackable> OverrideStack<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry after every existing entry of the same priority.
    pub fn add(&mut self, entry: DataOverride<T>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert((entry.priority, sequence), entry);
    }

    /// Removes the earliest entry structurally equal to `entry`.
    ///
    /// Returns false (and changes nothing) when no such entry exists.
    pub fn remove(&mut self, entry: &DataOverride<T>) -> bool {
        let key = self
            .entries
            .range((entry.priority, 0)..=(entry.priority, u64::MAX))
            .find(|(_, candidate)| *candidate == entry)
            .map(|(key, _)| *key);

        match key {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    /// Folds every entry over `base` in ascending priority, ties in insertion order.
    pub fn effective_value(&self, base: T) -> T {
        self.entries
            .values()
            .fold(base, |running, entry| entry.apply(&running))
    }

    /// Entries in application order.
    pub fn iter(&self) -> impl Iterator<Item = &DataOverride<T>> + '_ {
        self.entries.values()
    }

    /// Appends copies of `other`'s entries, preserving their relative order.
    pub fn extend_from(&mut self, other: &OverrideStack<T>) {
        for entry in other.iter() {
            self.add(entry.clone());
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacking::StackingType;

    #[test]
    fn priority_classes_fold_in_order() {
        let first_flat = DataOverride::add(1, 5.0);
        let mut stack = OverrideStack::new();
        stack.add(first_flat.clone());
        stack.add(DataOverride::add(1, 3.0));
        stack.add(DataOverride::multiply(2, 2.0));

        assert_eq!(stack.effective_value(10.0), 36.0);

        assert!(stack.remove(&first_flat));
        assert_eq!(stack.effective_value(10.0), 26.0);
    }

    #[test]
    fn insertion_order_does_not_affect_priority_classes() {
        let mut stack = OverrideStack::new();
        stack.add(DataOverride::multiply(2, 2.0));
        stack.add(DataOverride::add(1, 5.0));
        stack.add(DataOverride::add(1, 3.0));

        assert_eq!(stack.effective_value(10.0), 36.0);
    }

    #[test]
    fn add_then_remove_is_net_neutral() {
        let mut stack = OverrideStack::new();
        stack.add(DataOverride::multiply(4, 1.5));
        let before = stack.effective_value(2.0);

        let transient = DataOverride::add(3, 7.0);
        stack.add(transient.clone());
        stack.remove(&transient);

        assert_eq!(stack.effective_value(2.0), before);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn duplicates_are_kept_and_removed_one_at_a_time() {
        let bonus = DataOverride::add(0, 1);
        let mut stack = OverrideStack::new();
        stack.add(bonus.clone());
        stack.add(bonus.clone());
        assert_eq!(stack.effective_value(0), 2);

        assert!(stack.remove(&bonus));
        assert_eq!(stack.effective_value(0), 1);
        assert!(stack.remove(&bonus));
        assert!(!stack.remove(&bonus));
        assert!(stack.is_empty());
    }

    #[test]
    fn remove_matches_whole_entry() {
        let mut stack = OverrideStack::new();
        stack.add(DataOverride::add(1, 2.0));

        assert!(!stack.remove(&DataOverride::multiply(1, 2.0)));
        assert!(!stack.remove(&DataOverride::add(2, 2.0)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn override_replaces_running_value_at_its_priority() {
        let mut stack = OverrideStack::new();
        stack.add(DataOverride::add(0, 100.0));
        stack.add(DataOverride::replace(5, 1.0));
        stack.add(DataOverride::new(9, StackingType::Add, 0.5));

        assert_eq!(stack.effective_value(3.0), 1.5);
    }

    #[test]
    fn min_and_max_clamp() {
        let mut stack = OverrideStack::new();
        stack.add(DataOverride::new(0, StackingType::Add, 50));
        stack.add(DataOverride::new(1, StackingType::Min, 40));
        stack.add(DataOverride::new(2, StackingType::Max, 45));

        assert_eq!(stack.effective_value(0), 45);
    }

    #[test]
    fn extend_from_copies_entries_in_order() {
        let mut source = OverrideStack::new();
        source.add(DataOverride::add(1, 1.0));
        source.add(DataOverride::replace(1, 4.0));

        let mut copy = OverrideStack::new();
        copy.extend_from(&source);

        assert_eq!(copy.effective_value(0.0), 4.0);
        assert_eq!(copy.len(), 2);
    }
}
