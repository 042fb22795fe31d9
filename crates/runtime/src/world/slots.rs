use std::fmt;

use netmod_core::{EntityId, InstanceContext, Record};

/// Opaque handle to one attached record.
///
/// Valid until the record is invalidated; afterwards the slot may be reused
/// under a new generation and the old handle resolves to nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordAddress {
    slot: u32,
    generation: u32,
}

impl RecordAddress {
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for RecordAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {}v{}", self.slot, self.generation)
    }
}

/// A record together with the entity that owns it and its running context.
#[derive(Debug)]
pub struct Attached {
    pub owner: EntityId,
    pub record: Record,
    pub context: Option<InstanceContext>,
    /// Set once a problem that keeps this record inert has been logged.
    pub(crate) inert_logged: bool,
}

impl Attached {
    pub(crate) fn new(owner: EntityId, record: Record, context: Option<InstanceContext>) -> Self {
        Self {
            owner,
            record,
            context,
            inert_logged: false,
        }
    }

    /// True when this instance can absorb another record of `behavior`.
    pub(crate) fn is_combinable_with(&self, behavior: netmod_core::BehaviorIndex) -> bool {
        self.record.is_valid()
            && self.record.behavior_index() == Some(behavior)
            && self
                .context
                .as_ref()
                .is_some_and(|context| context.behavior() == behavior && !context.is_torn_down())
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    attached: Option<Attached>,
}

/// Generational slot storage for attached records.
#[derive(Debug, Default)]
pub struct SlotTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl SlotTable {
    pub fn insert(&mut self, attached: Attached) -> RecordAddress {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let entry = &mut self.slots[slot as usize];
        entry.attached = Some(attached);
        RecordAddress {
            slot,
            generation: entry.generation,
        }
    }

    /// Drops the record in `slot` and retires its address.
    pub fn release(&mut self, slot: u32) -> Option<Attached> {
        let entry = self.slots.get_mut(slot as usize)?;
        let attached = entry.attached.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(slot);
        Some(attached)
    }

    pub fn get(&self, address: RecordAddress) -> Option<&Attached> {
        self.slots
            .get(address.slot as usize)
            .filter(|entry| entry.generation == address.generation)
            .and_then(|entry| entry.attached.as_ref())
    }

    pub fn get_mut(&mut self, address: RecordAddress) -> Option<&mut Attached> {
        self.slots
            .get_mut(address.slot as usize)
            .filter(|entry| entry.generation == address.generation)
            .and_then(|entry| entry.attached.as_mut())
    }

    /// Current address of an occupied slot.
    pub fn address_of(&self, slot: u32) -> Option<RecordAddress> {
        let entry = self.slots.get(slot as usize)?;
        entry.attached.as_ref().map(|_| RecordAddress {
            slot,
            generation: entry.generation,
        })
    }

    pub(crate) fn slot(&self, slot: u32) -> Option<&Attached> {
        self.slots.get(slot as usize)?.attached.as_ref()
    }

    pub(crate) fn slot_mut(&mut self, slot: u32) -> Option<&mut Attached> {
        self.slots.get_mut(slot as usize)?.attached.as_mut()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached() -> Attached {
        Attached::new(EntityId(1), Record::EMPTY, None)
    }

    #[test]
    fn released_addresses_go_stale() {
        let mut table = SlotTable::default();
        let first = table.insert(attached());
        assert!(table.get(first).is_some());

        assert!(table.release(first.slot()).is_some());
        assert!(table.get(first).is_none());

        let reused = table.insert(attached());
        assert_eq!(reused.slot(), first.slot());
        assert_ne!(reused.generation(), first.generation());
        assert!(table.get(first).is_none());
        assert!(table.get(reused).is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn double_release_is_a_noop() {
        let mut table = SlotTable::default();
        let address = table.insert(attached());
        assert!(table.release(address.slot()).is_some());
        assert!(table.release(address.slot()).is_none());
        assert!(table.is_empty());
    }
}
