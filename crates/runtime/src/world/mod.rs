//! Entities and the records attached to them.
//!
//! Entities are kept in id order and records in attach order, which fixes the
//! order in which hooks run on every peer.

mod slots;

use std::collections::BTreeMap;

use netmod_core::{
    BehaviorIndex, EntityId, ModConfig, ModTarget, Placement, Record, TargetKind,
};

pub use slots::{Attached, RecordAddress, SlotTable};

/// One entity and the slots of its records.
#[derive(Debug)]
pub struct TargetEntry {
    pub target: ModTarget,
    /// Slots in attach order.
    pub(crate) records: Vec<u32>,
    pub(crate) destroyed: bool,
}

impl TargetEntry {
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

#[derive(Debug, Default)]
pub struct World {
    pub(crate) targets: BTreeMap<EntityId, TargetEntry>,
    pub(crate) slots: SlotTable,
    next_entity: u32,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an entity and returns its id. The entity takes part in the
    /// next tick.
    pub fn spawn(&mut self, kind: TargetKind, prefab: u8, placement: Placement) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity = self.next_entity.wrapping_add(1);

        let index = (id.0 % (u32::from(ModConfig::MAX_TARGET_INDEX) + 1)) as u16;
        let target = ModTarget::new(id, kind, prefab, index)
            .with_position(placement.position)
            .with_velocity(placement.velocity);
        self.targets.insert(
            id,
            TargetEntry {
                target,
                records: Vec::new(),
                destroyed: false,
            },
        );
        id
    }

    /// Marks an entity for removal and invalidates all of its records.
    ///
    /// Records tear down on the next tick; the entity disappears once they
    /// have. Returns false for unknown or already destroyed entities.
    pub fn destroy(&mut self, entity: EntityId) -> bool {
        let Some(entry) = self.targets.get_mut(&entity).filter(|entry| !entry.destroyed) else {
            return false;
        };
        entry.destroyed = true;
        for slot in &entry.records {
            if let Some(attached) = self.slots.slot_mut(*slot) {
                attached.record.invalidate();
            }
        }
        true
    }

    pub fn target(&self, entity: EntityId) -> Option<&ModTarget> {
        self.targets.get(&entity).map(|entry| &entry.target)
    }

    pub fn entry(&self, entity: EntityId) -> Option<&TargetEntry> {
        self.targets.get(&entity)
    }

    pub fn is_live(&self, entity: EntityId) -> bool {
        self.targets
            .get(&entity)
            .is_some_and(|entry| !entry.destroyed)
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.targets.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Appends a record to `owner`. The caller has checked that the owner is live.
    pub(crate) fn attach(&mut self, attached: Attached) -> RecordAddress {
        let owner = attached.owner;
        let address = self.slots.insert(attached);
        if let Some(entry) = self.targets.get_mut(&owner) {
            entry.records.push(address.slot());
        }
        address
    }

    pub fn attached(&self, address: RecordAddress) -> Option<&Attached> {
        self.slots.get(address)
    }

    /// Record behind `address`, as long as it has not been invalidated.
    pub(crate) fn live_mut(&mut self, address: RecordAddress) -> Option<&mut Attached> {
        self.slots
            .get_mut(address)
            .filter(|attached| attached.record.is_valid())
    }

    /// Records of `entity` in attach order.
    pub fn records(&self, entity: EntityId) -> Vec<(RecordAddress, Record)> {
        let Some(entry) = self.targets.get(&entity) else {
            return Vec::new();
        };
        entry
            .records
            .iter()
            .filter_map(|slot| {
                let address = self.slots.address_of(*slot)?;
                let attached = self.slots.slot(*slot)?;
                Some((address, attached.record))
            })
            .collect()
    }

    /// First live instance on `entity` that can absorb another record of `behavior`.
    pub(crate) fn combinable(&self, entity: EntityId, behavior: BehaviorIndex) -> Option<u32> {
        let entry = self.targets.get(&entity)?;
        entry.records.iter().copied().find(|slot| {
            self.slots
                .slot(*slot)
                .is_some_and(|attached| attached.is_combinable_with(behavior))
        })
    }

    /// Total number of attached records across all entities.
    pub fn record_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroy_invalidates_records() {
        let mut world = World::new();
        let entity = world.spawn(TargetKind::Vehicle, 1, Placement::default());
        let record = Record::encode(Some(BehaviorIndex(0)), 0, 0).unwrap();
        let address = world.attach(Attached::new(entity, record, None));

        assert!(world.destroy(entity));
        assert!(!world.destroy(entity));
        assert!(!world.is_live(entity));
        assert!(!world.attached(address).unwrap().record.is_valid());
        assert!(world.live_mut(address).is_none());
    }

    #[test]
    fn records_keep_attach_order() {
        let mut world = World::new();
        let entity = world.spawn(TargetKind::Character, 0, Placement::default());
        let first = world.attach(Attached::new(entity, Record::encode(None, 1, 0).unwrap(), None));
        let second = world.attach(Attached::new(entity, Record::encode(None, 2, 0).unwrap(), None));

        let records = world.records(entity);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, first);
        assert_eq!(records[1].0, second);
        assert_eq!(records[1].1.prefab_index(), Some(2));
    }
}
