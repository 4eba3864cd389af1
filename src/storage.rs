//! Storage seam.
//!
//! The core only needs to observe the committed mastership tag of a key;
//! everything else about the storage engine is an external collaborator.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;

use crate::ids::RegionId;
use crate::txn::{Key, MasterTag};

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub value: Bytes,
    pub master: RegionId,
    pub counter: u64,
}

impl Record {
    pub fn new(value: impl Into<Bytes>, master: RegionId, counter: u64) -> Self {
        Self {
            value: value.into(),
            master,
            counter,
        }
    }

    pub fn tag(&self) -> MasterTag {
        MasterTag::new(self.master, self.counter)
    }
}

pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> Option<Record>;
    fn write(&self, key: Key, record: Record);
}

/// In-memory storage. The executor is the only writer; the remaster manager
/// reads the committed view after the executor applied the remaster.
#[derive(Default)]
pub struct MemStorage {
    records: RwLock<HashMap<Key, Record>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemStorage {
    fn read(&self, key: &str) -> Option<Record> {
        self.records
            .read()
            .expect("storage lock poisoned")
            .get(key)
            .cloned()
    }

    fn write(&self, key: Key, record: Record) {
        self.records
            .write()
            .expect("storage lock poisoned")
            .insert(key, record);
    }
}
