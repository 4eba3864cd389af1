//! Transactions and batches.
//!
//! Transactions are opaque to the ordering core: it never looks inside the
//! code, only at ids, access keys, and declared mastership tags.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

use crate::ids::{BatchId, RegionId, TxnId};

/// Record key. Keys are opaque strings partitioned by the configuration's
/// partitioning mode.
pub type Key = String;

/// The `(master_region, counter)` pair a key is currently stamped with, or
/// that a transaction declares to expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MasterTag {
    pub master: RegionId,
    pub counter: u64,
}

impl MasterTag {
    pub fn new(master: RegionId, counter: u64) -> Self {
        Self { master, counter }
    }
}

impl fmt::Display for MasterTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.master, self.counter)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyMode {
    Read,
    Write,
}

/// One step of a transaction's code.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Get(Key),
    Set(Key, Bytes),
    Delete(Key),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionType {
    SingleHome,
    MultiHome,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub id: TxnId,
    pub txn_type: TransactionType,
    /// Keys the transaction accesses, with their access mode.
    pub keys: Vec<(Key, KeyMode)>,
    pub code: Vec<Op>,
    /// Declared mastership tag per key. Must cover every accessed key.
    pub metadata: BTreeMap<Key, MasterTag>,
}

impl Transaction {
    pub fn new(id: TxnId, txn_type: TransactionType, keys: Vec<(Key, KeyMode)>) -> Self {
        Self {
            id,
            txn_type,
            keys,
            code: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_code(mut self, code: Vec<Op>) -> Self {
        self.code = code;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<Key, MasterTag>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A transaction held by the scheduler while mastership is verified.
///
/// Wraps the immutable transaction; the remaster manager shares holders via
/// `Arc` between its per-key queues and its callers.
#[derive(Clone, Debug, PartialEq)]
pub struct TxnHolder {
    txn: Transaction,
}

impl TxnHolder {
    pub fn new(txn: Transaction) -> Self {
        Self { txn }
    }

    pub fn id(&self) -> TxnId {
        self.txn.id
    }

    pub fn txn(&self) -> &Transaction {
        &self.txn
    }

    pub fn keys(&self) -> &[(Key, KeyMode)] {
        &self.txn.keys
    }

    /// The mastership tag the transaction declares for `key`.
    pub fn declared(&self, key: &str) -> Option<MasterTag> {
        self.txn.metadata.get(key).copied()
    }
}

/// A totally ordered group of transactions cut by one originator.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub id: BatchId,
    pub batch_type: TransactionType,
    pub transactions: Vec<Transaction>,
}

impl Batch {
    pub fn new(id: BatchId, batch_type: TransactionType, transactions: Vec<Transaction>) -> Self {
        Self {
            id,
            batch_type,
            transactions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
