//! Single-region log interleaving.

use std::collections::{BTreeMap, HashMap};

use crate::ids::{BatchId, Leader, Position, QueueId, Slot};

/// Merges per-queue batch arrivals with consensus slot assignments into one
/// totally ordered stream of `(slot, (batch_id, leader))`.
///
/// Data may arrive out of order within a queue; slot assignments may arrive
/// out of order across queues. A release happens only when the next slot's
/// queue has data at exactly the position that queue expects next, so a
/// per-queue gap stalls that queue (and any later slot assigned to it)
/// without blocking other queues up to the smallest pending slot.
#[derive(Debug, Default)]
pub struct LocalLog {
    /// Arrived but unreleased batch ids, per queue, ordered by position.
    batch_queues: HashMap<QueueId, BTreeMap<Position, BatchId>>,
    /// Next position expected from each queue.
    next_positions: HashMap<QueueId, Position>,
    /// Arrived but unreleased slot assignments.
    slot_queue: BTreeMap<Slot, (QueueId, Leader)>,
    /// Next slot to release.
    next_slot: Slot,
}

impl LocalLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `batch_id` arrived at `position` of `queue_id`.
    ///
    /// Positions are assigned exactly once by the originator; seeing one
    /// twice is a bug upstream.
    pub fn add_batch_id(&mut self, queue_id: QueueId, position: Position, batch_id: BatchId) {
        let next_position = self.next_positions.entry(queue_id).or_insert(0);
        if position < *next_position {
            panic!("position {position} of queue {queue_id} was already released");
        }
        let pending = self.batch_queues.entry(queue_id).or_default();
        if pending.insert(position, batch_id).is_some() {
            panic!("position {position} of queue {queue_id} received two batches");
        }
    }

    /// Record that the consensus assigned `slot_id` to `queue_id`, decided
    /// by `leader`.
    pub fn add_slot(&mut self, slot_id: Slot, queue_id: QueueId, leader: Leader) {
        if slot_id < self.next_slot {
            panic!("slot {slot_id} was already released");
        }
        if self
            .slot_queue
            .insert(slot_id, (queue_id, leader))
            .is_some()
        {
            panic!("slot {slot_id} assigned twice");
        }
    }

    /// True iff the next slot is assigned and its queue has data at the
    /// expected position.
    pub fn has_next_batch(&self) -> bool {
        let Some(&(queue_id, _)) = self.slot_queue.get(&self.next_slot) else {
            return false;
        };
        let expected = self.next_positions.get(&queue_id).copied().unwrap_or(0);
        self.batch_queues
            .get(&queue_id)
            .is_some_and(|pending| pending.contains_key(&expected))
    }

    /// Release the next `(slot, (batch_id, leader))` pair and advance both
    /// the slot cursor and the queue's position cursor.
    pub fn next_batch(&mut self) -> (Slot, (BatchId, Leader)) {
        assert!(
            self.has_next_batch(),
            "next_batch called with no releasable batch"
        );

        let slot = self.next_slot;
        let (queue_id, leader) = self
            .slot_queue
            .remove(&slot)
            .expect("slot presence checked above");

        let position = self
            .next_positions
            .get_mut(&queue_id)
            .expect("queue has data at the expected position");
        let batch_id = self
            .batch_queues
            .get_mut(&queue_id)
            .expect("queue has data at the expected position")
            .remove(position)
            .expect("queue has data at the expected position");

        *position += 1;
        self.next_slot += 1;
        (slot, (batch_id, leader))
    }
}
