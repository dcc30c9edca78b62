//! Transport-facing machinery: snapshot loading, the live patch subscriber,
//! pagination, and the read-only handle embedding code consumes.

pub mod backoff;
pub mod handle;
pub mod pagination;
pub mod snapshot;
pub mod subscriber;
pub mod transport;

pub use backoff::{Backoff, BackoffPolicy};
pub use handle::{SyncError, SyncHandle};
pub use pagination::{LoadOutcome, PaginationController};
pub use snapshot::{PageRequest, SnapshotError, SnapshotPage, SnapshotSource};
pub use subscriber::{ConnectionState, ConnectionStatus, Subscriber};
pub use transport::{
    CloseFrame, ConnectionEvent, StreamConnection, StreamTransport, TransportError,
};
