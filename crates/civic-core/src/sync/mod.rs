//! Sync decision engine
//!
//! [`policy`] decides whether a feature's cache is stale; the
//! [`SyncCoordinator`] gathers the inputs (checkpoint, clock, location) and
//! records checkpoints after successful fetches.

mod checkpoint;
mod coordinator;
pub mod policy;

pub use checkpoint::{Feature, SyncCheckpoint};
pub use coordinator::{SyncCoordinator, SyncStatus};
pub use policy::{evaluate, should_sync, SyncParams, SyncReason};
