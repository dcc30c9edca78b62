//! The synchronized view handle.
//!
//! One handle per tracked scope (project, board, replay): it owns the
//! engine state, seeds it from snapshot pages, keeps it live through the
//! subscriber, and exposes a read-only surface. There is no ambient
//! registry; tearing the handle down tears everything down.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::warn;

use crate::config::SyncConfig;
use crate::core::{EntityId, PartitionState, Reconciler, SyncEntity};
use crate::sync::pagination::{LoadOutcome, PaginationController};
use crate::sync::snapshot::SnapshotSource;
use crate::sync::subscriber::{ConnectionState, Subscriber};
use crate::sync::transport::StreamTransport;

/// Engine state shared between the handle, the subscriber thread, and the
/// pagination controller. All mutation funnels through the reconciler
/// while this lock is held; that is the commit step.
pub(crate) struct EngineState<E: SyncEntity> {
    pub(crate) reconciler: Reconciler<E>,
    pub(crate) connection: ConnectionState,
    pub(crate) error: Option<String>,
}

pub(crate) type SharedState<E> = Arc<Mutex<EngineState<E>>>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("engine lock poisoned")]
    LockPoisoned,
    #[error(transparent)]
    Snapshot(#[from] crate::sync::snapshot::SnapshotError),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Snapshot(_))
    }
}

pub struct SyncHandle<E: SyncEntity> {
    shared: SharedState<E>,
    pagination: PaginationController<E>,
    subscriber: Option<Subscriber<E>>,
}

impl<E: SyncEntity> SyncHandle<E> {
    /// Seed the given partitions from the snapshot source, then start the
    /// live subscriber. Seed failures are recorded on the handle's `error`
    /// surface rather than aborting: the stream may still recover state.
    pub fn spawn<S, T>(
        scope: E::Scope,
        partitions: impl IntoIterator<Item = E::Partition>,
        source: S,
        transport: T,
        config: &SyncConfig,
    ) -> Self
    where
        S: SnapshotSource<E>,
        T: StreamTransport,
    {
        let shared: SharedState<E> = Arc::new(Mutex::new(EngineState {
            reconciler: Reconciler::new(scope.clone()),
            connection: ConnectionState::default(),
            error: None,
        }));
        let pagination = PaginationController::new(
            Arc::clone(&shared),
            Arc::new(source),
            scope,
            config.page_limit,
        );

        for partition in partitions {
            if let Err(err) = pagination.seed(&partition) {
                warn!(partition = ?partition, error = %err, "initial snapshot failed");
            }
        }

        let subscriber = Subscriber::spawn(transport, Arc::clone(&shared), config.backoff.policy());

        Self {
            shared,
            pagination,
            subscriber: Some(subscriber),
        }
    }

    pub fn entity(&self, id: &EntityId) -> Option<E> {
        self.read(|state| state.reconciler.entity(id).cloned())
            .flatten()
    }

    /// All derived views, partition-keyed and sorted.
    pub fn by_partition(&self) -> BTreeMap<E::Partition, Vec<E>> {
        self.read(|state| state.reconciler.views().clone())
            .unwrap_or_default()
    }

    pub fn partition(&self, partition: &E::Partition) -> Vec<E> {
        self.read(|state| state.reconciler.view(partition).to_vec())
            .unwrap_or_default()
    }

    pub fn partition_state(&self, partition: &E::Partition) -> PartitionState {
        self.read(|state| state.reconciler.partition_state(partition))
            .unwrap_or_default()
    }

    pub fn is_loading(&self, partition: &E::Partition) -> bool {
        self.partition_state(partition).is_loading
    }

    pub fn has_more(&self, partition: &E::Partition) -> bool {
        self.partition_state(partition).has_more
    }

    /// Last surfaced snapshot error, cleared by the next successful page.
    pub fn error(&self) -> Option<String> {
        self.read(|state| state.error.clone()).flatten()
    }

    pub fn connection(&self) -> ConnectionState {
        self.read(|state| state.connection).unwrap_or_default()
    }

    /// Pull the next page for a partition. Transport liveness is
    /// independent; this is the only caller-initiated retry path.
    pub fn load_more(&self, partition: &E::Partition) -> Result<LoadOutcome, SyncError> {
        self.pagination.load_more(partition)
    }

    /// Retry the initial load of a partition after a surfaced error.
    /// Unlike `load_more` this does not require `has_more`, which stays
    /// false until a page has committed.
    pub fn reload(&self, partition: &E::Partition) -> Result<LoadOutcome, SyncError> {
        self.pagination.seed(partition)
    }

    /// Deliberate teardown; the handle cannot be used afterwards and the
    /// connection is never resurrected.
    pub fn shutdown(mut self) {
        if let Some(subscriber) = self.subscriber.take() {
            subscriber.shutdown();
        }
    }

    fn read<R>(&self, read: impl FnOnce(&EngineState<E>) -> R) -> Option<R> {
        self.shared.lock().ok().map(|state| read(&state))
    }
}
