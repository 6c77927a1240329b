//! Synchronization engine.
//!
//! Local writes go through [`SyncCoordinator`], which applies them to the
//! index and appends an operation to the durable queue in one transaction.
//! [`SyncQueue::drain`] transmits queued operations in sequence order, and
//! every drain that runs is followed by a pull that merges the remote
//! snapshot back into the index. [`SyncScheduler`] wires the drain signal,
//! connectivity transitions and a periodic probe to those calls.

mod coordinator;
mod events;
mod merge;
mod queue;
mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{SyncCoordinator, SyncOptions, SyncReport, SyncStatusSnapshot};
pub use events::{DrainReport, PullReport, SyncEvent};
pub use merge::{decide, MergeDecision};
pub use queue::SyncQueue;
pub use scheduler::SyncScheduler;
