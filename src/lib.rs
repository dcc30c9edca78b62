#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod model;
pub mod sync;
pub mod telemetry;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the engine surface at crate root for convenience
pub use crate::core::{
    EntityId, OpKind, PartitionState, PatchTarget, Reconciler, SortPolicy, StreamFrame,
    SyncEntity, WireOp,
};
pub use crate::model::{Project, Task, TaskStatus};
pub use crate::sync::{
    Backoff, BackoffPolicy, CloseFrame, ConnectionEvent, ConnectionState, ConnectionStatus,
    LoadOutcome, PageRequest, SnapshotError, SnapshotPage, SnapshotSource, StreamConnection,
    StreamTransport, SyncError, SyncHandle, TransportError,
};
