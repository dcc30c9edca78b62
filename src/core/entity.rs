//! Entity contract shared by every synchronized collection.

use std::fmt;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Entity id as it appears in patch paths.
///
/// Globally unique within a collection; the engine never inspects its
/// contents beyond equality.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({:?})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for EntityId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}

/// Per-partition ordering for derived views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortPolicy {
    /// Oldest-created first: stable backlog order for active work.
    CreatedAsc,
    /// Most-recently-touched first, for terminal partitions.
    UpdatedDesc,
}

/// Contract every synchronized record implements.
///
/// Entities are immutable values from the engine's perspective: a mutation
/// is always a replacement with a newer copy, ordered by `updated_at`.
pub trait SyncEntity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + 'static
{
    /// Logical bucket the entity currently belongs to (e.g. a status column).
    type Partition: Clone + Eq + Ord + Hash + fmt::Debug + Send + 'static;

    /// Parent scope a subscription is keyed by (e.g. a project id).
    type Scope: Clone + Send + Sync + 'static;

    /// Pointer prefix this collection's patches use, without slashes.
    const COLLECTION: &'static str;

    fn id(&self) -> EntityId;
    fn partition(&self) -> Self::Partition;
    fn created_at(&self) -> OffsetDateTime;
    fn updated_at(&self) -> OffsetDateTime;

    /// Whether the entity belongs to the subscribed scope. Shared streams
    /// carry records for sibling scopes; the reconciler drops those.
    fn in_scope(&self, scope: &Self::Scope) -> bool;

    /// Sort order for a partition's derived view.
    fn sort_policy(partition: &Self::Partition) -> SortPolicy;
}
