//! Per-partition "load next page" control.

use std::sync::Arc;

use crate::core::SyncEntity;
use crate::sync::handle::{EngineState, SharedState, SyncError};
use crate::sync::snapshot::{PageRequest, SnapshotSource};

/// What a `load_more` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// A fetch for this partition is already in flight; the call was a
    /// no-op. Callers re-invoke after it settles if they still want more.
    AlreadyLoading,
    /// The partition has no further pages.
    Exhausted,
}

pub struct PaginationController<E: SyncEntity> {
    shared: SharedState<E>,
    source: Arc<dyn SnapshotSource<E>>,
    scope: E::Scope,
    page_limit: usize,
}

impl<E: SyncEntity> PaginationController<E> {
    pub(crate) fn new(
        shared: SharedState<E>,
        source: Arc<dyn SnapshotSource<E>>,
        scope: E::Scope,
        page_limit: usize,
    ) -> Self {
        Self {
            shared,
            source,
            scope,
            page_limit,
        }
    }

    /// Fetch the next page for `partition`, guarded by the loading latch
    /// and the partition's `has_more` flag.
    pub fn load_more(&self, partition: &E::Partition) -> Result<LoadOutcome, SyncError> {
        self.load(partition, true)
    }

    /// Initial seed: same path as `load_more` but does not require
    /// `has_more`, which is false before anything is known.
    pub(crate) fn seed(&self, partition: &E::Partition) -> Result<LoadOutcome, SyncError> {
        self.load(partition, false)
    }

    fn load(&self, partition: &E::Partition, require_more: bool) -> Result<LoadOutcome, SyncError> {
        let offset = {
            let mut state = self.lock()?;
            let current = state.reconciler.partition_state(partition);
            if current.is_loading {
                return Ok(LoadOutcome::AlreadyLoading);
            }
            if require_more && !current.has_more {
                return Ok(LoadOutcome::Exhausted);
            }
            state.reconciler.begin_load(partition);
            current.offset
        };

        let request = PageRequest {
            partition: partition.clone(),
            offset,
            limit: self.page_limit,
            order_by: E::sort_policy(partition),
        };

        match self.source.load_page(&self.scope, &request) {
            Ok(page) => {
                let mut state = self.lock()?;
                state.error = None;
                state
                    .reconciler
                    .merge_page(partition, page.items, page.total, page.has_more);
                Ok(LoadOutcome::Loaded)
            }
            Err(err) => {
                // Clear the latch; the page was not merged at all.
                if let Ok(mut state) = self.shared.lock() {
                    state.reconciler.fail_load(partition);
                    state.error = Some(err.to_string());
                }
                Err(SyncError::Snapshot(err))
            }
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, EngineState<E>>, SyncError> {
        self.shared.lock().map_err(|_| SyncError::LockPoisoned)
    }
}
