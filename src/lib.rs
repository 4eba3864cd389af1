#![forbid(unsafe_code)]

//! Deterministic transaction ordering core for a geo-replicated database.
//!
//! Every machine derives the same global order of committed transaction
//! batches: single-home batches are interleaved from per-partition queues by
//! locally agreed slots, multi-home batches are sequenced by a global
//! consensus and replicated to every region, and the remaster manager gates
//! each transaction on the mastership counters it declared.

pub mod config;
pub mod ids;
pub mod interleaver;
pub mod log;
pub mod message;
pub mod module;
pub mod orderer;
pub mod remaster;
pub mod storage;
pub mod transport;
pub mod txn;

pub use config::{Config, ConfigError, PartitioningMode};
pub use ids::{
    make_batch_id, BatchId, Channel, Leader, MachineId, Position, QueueId, RegionId, Slot, TxnId,
    MAX_MACHINES,
};
pub use interleaver::Interleaver;
pub use log::{BatchLog, LocalLog};
pub use message::{Envelope, ForwardBatch, Request};
pub use module::{spawn, Module};
pub use orderer::MultiHomeOrderer;
pub use remaster::{RemasterManager, RemasterResult, VerifyMasterResult};
pub use storage::{MemStorage, Record, Storage};
pub use transport::{Registry, Sender};
pub use txn::{Batch, Key, KeyMode, MasterTag, Op, Transaction, TransactionType, TxnHolder};
