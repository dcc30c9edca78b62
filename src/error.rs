use thiserror::Error;

use crate::sync::{SnapshotError, SyncError, TransportError};

/// Crate-level convenience error.
///
/// A thin wrapper over the per-module errors; nothing here is fatal to the
/// embedding process. Transport failures are retried internally and only
/// reach this type when a caller drives the transport directly.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl Error {
    /// Whether retrying the failed operation may succeed without changing
    /// inputs. Snapshot and transport failures are retryable by contract;
    /// a poisoned engine lock is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::Snapshot(_) => true,
            Error::Sync(e) => e.is_retryable(),
        }
    }
}
