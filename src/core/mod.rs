//! Pure synchronization engine: no I/O, no clocks, no threads.
//!
//! Everything here is a deterministic function of the operations fed in.
//! The transport-facing half of the crate lives in [`crate::sync`].

pub mod entity;
pub mod partition;
pub mod patch;
pub mod pointer;
pub mod reconcile;
pub mod staleness;
pub mod views;

pub use entity::{EntityId, SortPolicy, SyncEntity};
pub use partition::{PartitionDeltas, PartitionState, PartitionTable};
pub use patch::{OpKind, PendingOp, StreamFrame, WireOp, decode_op};
pub use pointer::{PatchTarget, decode_path};
pub use reconcile::Reconciler;
pub use staleness::should_apply;
pub use views::project_views;
