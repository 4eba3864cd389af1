//! Topology ids and channel names.
//!
//! MachineId: packed (replica, partition) identity
//! BatchId: counter * MAX_MACHINES + originating machine

use std::fmt;

/// Upper bound on machine ids across any supported topology.
///
/// Batch ids are derived as `counter * MAX_MACHINES + machine_id`, so two
/// machines can never mint the same id without coordination.
pub const MAX_MACHINES: u64 = 1000;

/// A region replica of the database. Regions and replicas are 1:1.
pub type RegionId = u32;

/// Position in a consensus log. Each queue scope has its own slot space.
pub type Slot = u64;

/// A per-originator stream feeding the LocalLog.
pub type QueueId = u32;

/// Monotonic per-queue index stamped by the originator.
pub type Position = u32;

/// The partition that led the consensus round for a slot.
pub type Leader = u32;

/// Globally unique batch identifier. Rewritten to the batch's slot once the
/// global order is known.
pub type BatchId = u64;

/// Transaction identifier assigned by the client/forwarder.
pub type TxnId = u64;

/// Packed machine identity: `replica * num_partitions + partition`.
///
/// Packing and unpacking live on [`Config`](crate::config::Config) because
/// they need the partition count.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MachineId(u32);

impl MachineId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MachineId({})", self.0)
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mint a batch id from a per-machine counter.
///
/// Counters start at 1, so a batch id is never 0 and never collides with a
/// raw machine id.
pub fn make_batch_id(counter: u64, machine: MachineId) -> BatchId {
    counter * MAX_MACHINES + u64::from(machine.raw())
}

/// Logical destinations inside a machine. One module may serve several.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    MultiHomeOrderer,
    Sequencer,
    Scheduler,
    LocalLog,
    Interleaver,
    GlobalPaxos,
    LocalPaxos,
}
