//! Task records as the board consumes them.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::{EntityId, SortPolicy, SyncEntity};

/// Board column. Declaration order is column order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    InReview,
    Done,
    Cancelled,
}

impl TaskStatus {
    /// Terminal columns hold finished work; their views order by recency of
    /// completion rather than backlog position.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    pub fn all() -> [TaskStatus; 5] {
        [
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::InReview,
            TaskStatus::Done,
            TaskStatus::Cancelled,
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SyncEntity for Task {
    type Partition = TaskStatus;
    type Scope = Uuid;

    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> EntityId {
        self.id.into()
    }

    fn partition(&self) -> TaskStatus {
        self.status
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    fn in_scope(&self, project_id: &Uuid) -> bool {
        self.project_id == *project_id
    }

    fn sort_policy(partition: &TaskStatus) -> SortPolicy {
        if partition.is_terminal() {
            SortPolicy::UpdatedDesc
        } else {
            SortPolicy::CreatedAsc
        }
    }
}

#[cfg(test)]
impl Task {
    pub const TEST_PROJECT: Uuid = Uuid::from_u128(0x5eed);

    pub fn test_fixture(seed: &str, status: TaskStatus, updated_secs: i64) -> Self {
        Self::test_fixture_created(seed, status, updated_secs, updated_secs)
    }

    pub fn test_fixture_created(
        seed: &str,
        status: TaskStatus,
        created_secs: i64,
        updated_secs: i64,
    ) -> Self {
        let mut bytes = [0u8; 16];
        for (i, byte) in seed.bytes().take(16).enumerate() {
            bytes[i] = byte;
        }
        Self {
            id: Uuid::from_bytes(bytes),
            project_id: Self::TEST_PROJECT,
            title: seed.to_string(),
            description: None,
            status,
            created_at: OffsetDateTime::from_unix_timestamp(created_secs).unwrap(),
            updated_at: OffsetDateTime::from_unix_timestamp(updated_secs).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            r#""inprogress""#
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>(r#""cancelled""#).unwrap(),
            TaskStatus::Cancelled
        );
    }

    #[test]
    fn sort_policy_splits_on_terminal_status() {
        assert_eq!(
            Task::sort_policy(&TaskStatus::Todo),
            SortPolicy::CreatedAsc
        );
        assert_eq!(
            Task::sort_policy(&TaskStatus::InReview),
            SortPolicy::CreatedAsc
        );
        assert_eq!(
            Task::sort_policy(&TaskStatus::Done),
            SortPolicy::UpdatedDesc
        );
        assert_eq!(
            Task::sort_policy(&TaskStatus::Cancelled),
            SortPolicy::UpdatedDesc
        );
    }

    #[test]
    fn task_round_trips_through_wire_json() {
        let task = Task::test_fixture("a", TaskStatus::InReview, 42);
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn timestamps_parse_from_rfc3339() {
        let json = format!(
            concat!(
                r#"{{"id":"{id}","project_id":"{id}","title":"t","status":"todo","#,
                r#""created_at":"2026-01-02T03:04:05Z","updated_at":"2026-01-02T03:04:06Z"}}"#,
            ),
            id = Uuid::nil()
        );
        let task: Task = serde_json::from_str(&json).unwrap();
        assert!(task.updated_at > task.created_at);
    }
}
