//! Multi-home transaction ordering.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::ids::{make_batch_id, BatchId, Channel};
use crate::log::BatchLog;
use crate::message::{Envelope, ForwardBatch, Request};
use crate::module::Module;
use crate::transport::Sender;
use crate::txn::{Batch, Transaction, TransactionType};

/// Runs on the elected ordering leader partition of every region.
///
/// Accumulates forwarded multi-home transactions into an open batch, seals
/// it on the periodic tick, and pairs the global consensus decisions with
/// replicated batch data to emit one identical multi-home sequence per
/// region.
pub struct MultiHomeOrderer {
    config: Arc<Config>,
    sender: Sender,
    batch_id_counter: u64,
    batch: Vec<Transaction>,
    batch_log: BatchLog,
}

impl MultiHomeOrderer {
    pub fn new(config: Arc<Config>, sender: Sender) -> Self {
        Self {
            config,
            sender,
            batch_id_counter: 0,
            batch: Vec::new(),
            batch_log: BatchLog::new(),
        }
    }

    /// Tick period the orderer should be spawned with.
    pub fn tick_period(config: &Config) -> Duration {
        Duration::from_millis(config.mh_orderer_tick_ms)
    }

    fn next_batch_id(&mut self) -> BatchId {
        self.batch_id_counter += 1;
        make_batch_id(self.batch_id_counter, self.sender.machine())
    }

    fn process_forward_batch(&mut self, forward: ForwardBatch) {
        match forward {
            ForwardBatch::BatchData { batch, .. } => {
                tracing::debug!("received replicated multi-home batch {}", batch.id);
                self.batch_log.add_batch(batch);
            }
            ForwardBatch::BatchOrder { slot, batch_id } => {
                self.batch_log.add_slot(slot, batch_id);
            }
            ForwardBatch::LocalBatchOrder { .. } => {
                tracing::error!("unexpected local batch order at the multi-home orderer");
                return;
            }
        }

        while self.batch_log.has_next_batch() {
            let (slot, mut batch) = self.batch_log.next_batch();
            // Downstream code orders by batch id, so the slot becomes the id.
            batch.id = slot;
            self.sender.send_local(
                Request::ForwardBatch(ForwardBatch::BatchData {
                    batch,
                    same_origin_position: 0,
                }),
                Channel::Sequencer,
            );
        }
    }
}

impl Module for MultiHomeOrderer {
    fn name(&self) -> &'static str {
        "multi-home-orderer"
    }

    fn handle(&mut self, envelope: Envelope) {
        match envelope.request {
            Request::ForwardTxn { txn } => {
                // The forwarder computes homes; a multi-home transaction
                // declaring a single home is a wiring bug.
                let mut masters = txn.metadata.values().map(|tag| tag.master);
                if let Some(first) = masters.next() {
                    if masters.all(|master| master == first) {
                        panic!(
                            "multi-home transaction {} declares a single home {first}",
                            txn.id
                        );
                    }
                }
                self.batch.push(txn);
            }
            Request::ForwardBatch(forward) => self.process_forward_batch(forward),
            other => {
                tracing::error!("unexpected request {} at the multi-home orderer", other.kind());
            }
        }
    }

    /// Seal the open batch, propose its id for global ordering, and
    /// replicate its content to the ordering leader of every region.
    fn handle_tick(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let batch_id = self.next_batch_id();
        let transactions = mem::take(&mut self.batch);
        tracing::debug!(
            "sealed multi-home batch {batch_id} with {} transactions",
            transactions.len()
        );

        self.sender
            .send_local(Request::PaxosPropose { value: batch_id }, Channel::GlobalPaxos);

        let batch = Batch::new(batch_id, TransactionType::MultiHome, transactions);
        let partition = self.config.leader_partition_for_multi_home_ordering;
        for replica in 0..self.config.num_replicas {
            let machine = self.config.make_machine_id(replica, partition);
            self.sender.send(
                Request::ForwardBatch(ForwardBatch::BatchData {
                    batch: batch.clone(),
                    same_origin_position: 0,
                }),
                machine,
                Channel::MultiHomeOrderer,
            );
        }
    }
}
