//! Mastership verification and per-key blocking.
//!
//! Every transaction declares the `(master_region, counter)` it expects for
//! each key it touches. The manager compares the declaration against the
//! committed mastership tags and either admits the transaction, queues it
//! behind a pending remaster, or tells the scheduler to abort it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::ids::{RegionId, TxnId};
use crate::storage::Storage;
use crate::txn::{Key, TransactionType, TxnHolder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyMasterResult {
    /// Every declared tag matches storage and no touched key has a queue.
    Valid,
    /// Blocked until a remaster event or an explicit release.
    Waiting,
    /// A declared counter is behind storage; the transaction cannot run.
    Abort,
}

/// Transactions released by a remaster event or an explicit release.
#[derive(Debug, Default)]
pub struct RemasterResult {
    pub unblocked: Vec<Arc<TxnHolder>>,
    pub should_abort: Vec<Arc<TxnHolder>>,
}

/// Counter comparison alone, ignoring queue occupancy.
#[derive(Clone, Copy, PartialEq)]
enum CounterCheck {
    Valid,
    Waiting,
    Abort,
}

pub struct RemasterManager {
    storage: Arc<dyn Storage>,
    /// Blocked transaction ids per key, in arrival order.
    blocked: HashMap<Key, VecDeque<TxnId>>,
    /// Holders of every currently blocked transaction.
    waiting: HashMap<TxnId, Arc<TxnHolder>>,
}

impl RemasterManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            blocked: HashMap::new(),
            waiting: HashMap::new(),
        }
    }

    /// Classify `holder` against the committed mastership tags.
    ///
    /// A WAITING transaction is enqueued on every key it touches, so later
    /// transactions cannot pass it on any of them.
    pub fn verify_master(&mut self, holder: &Arc<TxnHolder>) -> VerifyMasterResult {
        self.validate_declaration(holder);

        match self.check_counters(holder) {
            CounterCheck::Abort => VerifyMasterResult::Abort,
            check => {
                let queue_busy = holder.keys().iter().any(|(key, _)| {
                    self.blocked.get(key).is_some_and(|queue| !queue.is_empty())
                });
                if check == CounterCheck::Valid && !queue_busy {
                    VerifyMasterResult::Valid
                } else {
                    self.insert_blocked(holder);
                    VerifyMasterResult::Waiting
                }
            }
        }
    }

    /// React to a key's mastership counter advancing. The executor calls
    /// this after committing the remaster write, so storage already shows
    /// the new tag.
    pub fn remaster_occurred(&mut self, key: &str, new_counter: u64) -> RemasterResult {
        tracing::debug!("remaster of {key:?} reached counter {new_counter}");
        self.scan_keys(VecDeque::from([key.to_string()]))
    }

    /// Drop `holder` from every queue it occupies, whatever its state, and
    /// release whatever that unblocks.
    pub fn release_transaction(&mut self, holder: &Arc<TxnHolder>) -> RemasterResult {
        let id = holder.id();
        if self.waiting.remove(&id).is_none() {
            return RemasterResult::default();
        }

        let mut touched = VecDeque::new();
        for (key, _) in holder.keys() {
            self.remove_from_queue(key, id);
            touched.push_back(key.clone());
        }
        self.scan_keys(touched)
    }

    /// A malformed declaration is a forwarder bug; fail fast.
    fn validate_declaration(&self, holder: &Arc<TxnHolder>) {
        let txn = holder.txn();
        let mut declared_master: Option<RegionId> = None;
        for (key, _) in &txn.keys {
            let Some(tag) = txn.metadata.get(key) else {
                panic!("transaction {}: no master metadata for key {key:?}", txn.id);
            };
            if txn.txn_type == TransactionType::SingleHome {
                match declared_master {
                    None => declared_master = Some(tag.master),
                    Some(master) if master != tag.master => panic!(
                        "transaction {}: masters don't match ({} vs {})",
                        txn.id, master, tag.master
                    ),
                    Some(_) => {}
                }
            }
        }
    }

    fn check_counters(&self, holder: &Arc<TxnHolder>) -> CounterCheck {
        let mut waiting = false;
        for (key, _) in holder.keys() {
            let declared = holder.declared(key).expect("declaration validated");
            match self.storage.read(key) {
                Some(record) => {
                    let stored = record.tag();
                    if declared.counter < stored.counter {
                        return CounterCheck::Abort;
                    }
                    if declared.counter == stored.counter {
                        // Masters can only differ across counters.
                        if declared.master != stored.master {
                            return CounterCheck::Abort;
                        }
                    } else {
                        waiting = true;
                    }
                }
                // The key does not exist yet; counter 0 is its birth state.
                None => {
                    if declared.counter > 0 {
                        waiting = true;
                    }
                }
            }
        }
        if waiting {
            CounterCheck::Waiting
        } else {
            CounterCheck::Valid
        }
    }

    fn insert_blocked(&mut self, holder: &Arc<TxnHolder>) {
        let id = holder.id();
        if self.waiting.insert(id, Arc::clone(holder)).is_some() {
            panic!("transaction {id} is already blocked");
        }
        for (key, _) in holder.keys() {
            self.blocked.entry(key.clone()).or_default().push_back(id);
        }
    }

    /// Release queue heads starting from `pending` keys, cascading through
    /// the other keys of each released transaction until no head can move.
    fn scan_keys(&mut self, mut pending: VecDeque<Key>) -> RemasterResult {
        let mut result = RemasterResult::default();
        while let Some(key) = pending.pop_front() {
            loop {
                let Some(head) = self
                    .blocked
                    .get(&key)
                    .and_then(|queue| queue.front().copied())
                else {
                    break;
                };
                let holder = self.waiting.get(&head).map(Arc::clone).unwrap_or_else(|| {
                    panic!("blocked queue for {key:?} references unknown transaction {head}")
                });

                let check = self.check_counters(&holder);
                if check == CounterCheck::Abort {
                    self.remove_blocked(&holder, &key, &mut pending);
                    result.should_abort.push(holder);
                    continue;
                }

                let at_head_everywhere = holder.keys().iter().all(|(other, _)| {
                    self.blocked.get(other).and_then(|queue| queue.front()) == Some(&head)
                });
                if check == CounterCheck::Valid && at_head_everywhere {
                    self.remove_blocked(&holder, &key, &mut pending);
                    result.unblocked.push(holder);
                    continue;
                }

                // Still waiting, or valid but not yet at the head of every
                // queue it occupies; nothing behind it may pass.
                break;
            }
        }
        result
    }

    fn remove_blocked(
        &mut self,
        holder: &Arc<TxnHolder>,
        current_key: &str,
        pending: &mut VecDeque<Key>,
    ) {
        let id = holder.id();
        self.waiting.remove(&id);
        for (key, _) in holder.keys() {
            self.remove_from_queue(key, id);
            if key.as_str() != current_key {
                pending.push_back(key.clone());
            }
        }
    }

    fn remove_from_queue(&mut self, key: &str, id: TxnId) {
        if let Some(queue) = self.blocked.get_mut(key) {
            queue.retain(|&queued| queued != id);
            if queue.is_empty() {
                self.blocked.remove(key);
            }
        }
    }
}
