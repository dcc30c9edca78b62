//! Project records: a single-partition, unscoped collection.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::{EntityId, SortPolicy, SyncEntity};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SyncEntity for Project {
    // Projects have no columns and no parent scope: one bucket, one list.
    type Partition = ();
    type Scope = ();

    const COLLECTION: &'static str = "projects";

    fn id(&self) -> EntityId {
        self.id.into()
    }

    fn partition(&self) {}

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    fn in_scope(&self, _scope: &()) -> bool {
        true
    }

    fn sort_policy(_partition: &()) -> SortPolicy {
        SortPolicy::UpdatedDesc
    }
}
