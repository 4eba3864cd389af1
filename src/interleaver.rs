//! Scheduler-facing dispatch of locally sequenced single-home batches.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::ids::{BatchId, Channel};
use crate::log::LocalLog;
use crate::message::{Envelope, ForwardBatch, Request};
use crate::module::Module;
use crate::transport::Sender;
use crate::txn::Batch;

/// Bridges LocalLog output to the scheduler.
///
/// Batch data replicated from each partition feeds the queue named by the
/// sender's partition; local consensus decisions feed the slot side. Every
/// release looks the batch up by id and streams its transactions to the
/// scheduler channel in order.
pub struct Interleaver {
    config: Arc<Config>,
    sender: Sender,
    local_log: LocalLog,
    batches: HashMap<BatchId, Batch>,
}

impl Interleaver {
    pub fn new(config: Arc<Config>, sender: Sender) -> Self {
        Self {
            config,
            sender,
            local_log: LocalLog::new(),
            batches: HashMap::new(),
        }
    }

    fn dispatch_ready(&mut self) {
        while self.local_log.has_next_batch() {
            let (slot, (batch_id, _leader)) = self.local_log.next_batch();
            // The log only releases positions whose data arrived, so a
            // missing batch here is a bug, not a wait state.
            let batch = self
                .batches
                .remove(&batch_id)
                .unwrap_or_else(|| panic!("batch {batch_id} released at slot {slot} without data"));
            tracing::debug!("dispatching batch {batch_id} at slot {slot} to the scheduler");
            for txn in batch.transactions {
                self.sender
                    .send_local(Request::ForwardTxn { txn }, Channel::Scheduler);
            }
        }
    }
}

impl Module for Interleaver {
    fn name(&self) -> &'static str {
        "interleaver"
    }

    fn handle(&mut self, envelope: Envelope) {
        match envelope.request {
            Request::ForwardBatch(ForwardBatch::BatchData {
                batch,
                same_origin_position,
            }) => {
                let (_, partition) = self.config.unpack_machine_id(envelope.from);
                let batch_id = batch.id;
                self.local_log
                    .add_batch_id(partition, same_origin_position, batch_id);
                if self.batches.insert(batch_id, batch).is_some() {
                    panic!("batch {batch_id} replicated twice");
                }
                self.dispatch_ready();
            }
            Request::ForwardBatch(ForwardBatch::LocalBatchOrder {
                queue_id,
                slot,
                leader,
            }) => {
                self.local_log.add_slot(slot, queue_id, leader);
                self.dispatch_ready();
            }
            other => {
                tracing::error!("unexpected request {} at the interleaver", other.kind());
            }
        }
    }
}
