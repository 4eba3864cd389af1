//! Ordered release of batches: per-queue local interleaving and the
//! consensus-keyed multi-home log.

mod batch;
mod local;

pub use batch::BatchLog;
pub use local::LocalLog;
