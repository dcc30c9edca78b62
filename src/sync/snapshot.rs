//! Bounded snapshot pages over the REST seam.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{SortPolicy, SyncEntity};

/// One bounded fetch: `offset`-based within a partition, ordered per the
/// partition's sort policy so pages line up with the derived views.
#[derive(Clone, Debug, PartialEq)]
pub struct PageRequest<P> {
    pub partition: P,
    pub offset: usize,
    pub limit: usize,
    pub order_by: SortPolicy,
}

/// Authoritative page of entities plus the server's counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPage<E> {
    pub items: Vec<E>,
    pub total: usize,
    pub has_more: bool,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot fetch failed: {0}")]
    Fetch(String),
}

/// The REST list endpoint, abstracted. A page is merged atomically: on
/// error nothing of it reaches the engine.
pub trait SnapshotSource<E: SyncEntity>: Send + Sync + 'static {
    fn load_page(
        &self,
        scope: &E::Scope,
        request: &PageRequest<E::Partition>,
    ) -> Result<SnapshotPage<E>, SnapshotError>;
}
