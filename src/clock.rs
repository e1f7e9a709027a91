use anyhow::{Result, ensure};

/// Per-replica vector clock: one slot per configured replica, and only the
/// owning replica's slot is ever advanced. Snapshots stamp the operation log
/// for audit ordering; clocks are never merged or compared across replicas.
#[derive(Debug, Clone)]
pub struct VectorClock {
    slots: Vec<u64>,
    ordinal: usize,
}

impl VectorClock {
    pub fn new(replicas: usize, ordinal: usize) -> Result<Self> {
        ensure!(replicas > 0, "vector clock requires at least one replica");
        ensure!(
            ordinal < replicas,
            "ordinal {ordinal} outside clock of {replicas} slots"
        );
        Ok(Self {
            slots: vec![0; replicas],
            ordinal,
        })
    }

    /// Increments this replica's own slot and returns a snapshot of the full
    /// vector. Called exactly once per locally handled operation, whether or
    /// not the operation succeeds.
    pub fn advance(&mut self) -> Vec<u64> {
        self.slots[self.ordinal] += 1;
        self.slots.clone()
    }

    pub fn snapshot(&self) -> Vec<u64> {
        self.slots.clone()
    }

    pub fn own_slot(&self) -> u64 {
        self.slots[self.ordinal]
    }
}
