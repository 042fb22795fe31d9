//! Deferred spawn facility handed to behavior hooks.

use netmod_core::{SpawnRequest, Spawner};

/// Spawn requests collected during one tick, applied after it completes.
#[derive(Debug, Default)]
pub struct SpawnQueue {
    pending: Vec<SpawnRequest>,
}

impl SpawnQueue {
    pub fn take(&mut self) -> Vec<SpawnRequest> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Spawner for SpawnQueue {
    fn spawn(&mut self, request: SpawnRequest) {
        self.pending.push(request);
    }
}
