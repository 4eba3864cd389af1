//! Consensus-keyed multi-home batch log.

use std::collections::{BTreeMap, HashMap};

use crate::ids::{BatchId, Slot};
use crate::txn::Batch;

/// Two-sided queue pairing replicated batch data with consensus slot
/// assignments. Batches are released in contiguous slot order once both
/// sides are present, so every region drains the same `(slot, content)`
/// sequence no matter which side arrived first.
#[derive(Debug, Default)]
pub struct BatchLog {
    batches: HashMap<BatchId, Batch>,
    slots: BTreeMap<Slot, BatchId>,
    next_slot: Slot,
}

impl BatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_batch(&mut self, batch: Batch) {
        let id = batch.id;
        if self.batches.insert(id, batch).is_some() {
            panic!("batch {id} replicated twice");
        }
    }

    pub fn add_slot(&mut self, slot: Slot, batch_id: BatchId) {
        if slot < self.next_slot {
            panic!("slot {slot} was already released");
        }
        if self.slots.insert(slot, batch_id).is_some() {
            panic!("slot {slot} assigned twice");
        }
    }

    pub fn has_next_batch(&self) -> bool {
        self.slots
            .get(&self.next_slot)
            .is_some_and(|batch_id| self.batches.contains_key(batch_id))
    }

    pub fn next_batch(&mut self) -> (Slot, Batch) {
        assert!(
            self.has_next_batch(),
            "next_batch called with no releasable batch"
        );

        let slot = self.next_slot;
        let batch_id = self
            .slots
            .remove(&slot)
            .expect("slot presence checked above");
        let batch = self
            .batches
            .remove(&batch_id)
            .expect("batch presence checked above");

        self.next_slot += 1;
        (slot, batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::txn::TransactionType;

    fn batch(id: BatchId) -> Batch {
        Batch::new(id, TransactionType::MultiHome, Vec::new())
    }

    fn drain(log: &mut BatchLog) -> Vec<(Slot, BatchId)> {
        let mut released = Vec::new();
        while log.has_next_batch() {
            let (slot, batch) = log.next_batch();
            released.push((slot, batch.id));
        }
        released
    }

    #[test]
    fn releases_in_slot_order_data_first() {
        let mut log = BatchLog::new();
        log.add_batch(batch(2000));
        log.add_batch(batch(1000));
        assert!(!log.has_next_batch());

        log.add_slot(0, 1000);
        log.add_slot(1, 2000);
        assert_eq!(drain(&mut log), vec![(0, 1000), (1, 2000)]);
    }

    #[test]
    fn releases_in_slot_order_slots_first() {
        let mut log = BatchLog::new();
        log.add_slot(1, 2000);
        log.add_slot(0, 1000);
        assert!(!log.has_next_batch());

        log.add_batch(batch(2000));
        assert!(!log.has_next_batch());

        log.add_batch(batch(1000));
        assert_eq!(drain(&mut log), vec![(0, 1000), (1, 2000)]);
    }

    #[test]
    fn slot_gap_stalls_later_slots() {
        let mut log = BatchLog::new();
        log.add_batch(batch(1000));
        log.add_batch(batch(2000));
        log.add_slot(1, 2000);
        assert!(!log.has_next_batch());

        log.add_slot(0, 1000);
        assert_eq!(drain(&mut log), vec![(0, 1000), (1, 2000)]);
    }

    /// Two logs fed the same pairs in different arrival orders drain the
    /// same sequence.
    #[test]
    fn release_sequence_is_arrival_order_independent() {
        let pairs: Vec<(Slot, BatchId)> = vec![(0, 3000), (1, 1000), (2, 4000), (3, 2000)];

        let mut forward = BatchLog::new();
        for &(slot, id) in &pairs {
            forward.add_slot(slot, id);
            forward.add_batch(batch(id));
        }

        let mut backward = BatchLog::new();
        for &(_, id) in pairs.iter().rev() {
            backward.add_batch(batch(id));
        }
        for &(slot, id) in pairs.iter().rev() {
            backward.add_slot(slot, id);
        }

        assert_eq!(drain(&mut forward), drain(&mut backward));
    }

    #[test]
    #[should_panic(expected = "replicated twice")]
    fn duplicate_batch_is_fatal() {
        let mut log = BatchLog::new();
        log.add_batch(batch(1000));
        log.add_batch(batch(1000));
    }

    #[test]
    #[should_panic(expected = "assigned twice")]
    fn duplicate_slot_is_fatal() {
        let mut log = BatchLog::new();
        log.add_slot(0, 1000);
        log.add_slot(0, 2000);
    }
}
