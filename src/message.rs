//! Message envelopes exchanged between modules.
//!
//! The envelope is the only wire object; `(from, channel)` framing is
//! supplied by the transport, never serialized in the payload.

use crate::ids::{BatchId, Leader, MachineId, Position, QueueId, Slot};
use crate::txn::{Batch, Key, Transaction};

#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub from: MachineId,
    pub request: Request,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    ForwardTxn {
        txn: Transaction,
    },
    ForwardBatch(ForwardBatch),
    /// Proposal to the consensus collaborator; opaque to the core.
    PaxosPropose {
        value: u64,
    },
    /// Decision notification from the consensus collaborator.
    PaxosNotify {
        slot: Slot,
        value: u64,
    },
    /// Emitted by the executor after it commits a remaster write.
    RemasterOccurred {
        key: Key,
        new_counter: u64,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ForwardBatch {
    /// Replicated batch content, stamped with the originator's per-queue
    /// position.
    BatchData {
        batch: Batch,
        same_origin_position: Position,
    },
    /// Global consensus decision: `slot` carries `batch_id`.
    BatchOrder { slot: Slot, batch_id: BatchId },
    /// Local consensus decision for the single-home log of one queue.
    LocalBatchOrder {
        queue_id: QueueId,
        slot: Slot,
        leader: Leader,
    },
}

impl Request {
    /// Variant name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::ForwardTxn { .. } => "forward_txn",
            Request::ForwardBatch(ForwardBatch::BatchData { .. }) => "forward_batch.batch_data",
            Request::ForwardBatch(ForwardBatch::BatchOrder { .. }) => "forward_batch.batch_order",
            Request::ForwardBatch(ForwardBatch::LocalBatchOrder { .. }) => {
                "forward_batch.local_batch_order"
            }
            Request::PaxosPropose { .. } => "paxos_propose",
            Request::PaxosNotify { .. } => "paxos_notify",
            Request::RemasterOccurred { .. } => "remaster_occurred",
        }
    }
}
