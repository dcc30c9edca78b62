//! Wire-level patch frames and their decoded form.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::{EntityId, SyncEntity};
use super::pointer::{PatchTarget, decode_path};

/// One text frame of the live stream.
///
/// Either a batch of patch operations or the end-of-stream sentinel
/// (`{"finished": true}`), which signals a clean close.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StreamFrame {
    JsonPatch(Vec<WireOp>),
    #[serde(rename = "finished")]
    Finished(bool),
}

/// Operation discriminant as it appears on the wire.
///
/// `move`/`copy`/`test` are legal JSON Patch but carry no entity-level
/// meaning here; the reconciler skips them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Add,
    Replace,
    Remove,
    Move,
    Copy,
    Test,
}

/// Raw operation as delivered by the stream or replayed from a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireOp {
    pub op: OpKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl WireOp {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: OpKind::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: OpKind::Replace,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: OpKind::Remove,
            path: path.into(),
            value: None,
        }
    }
}

/// A decoded instruction ready for the reconciler. Transient: consumed by
/// the same batch that produced it.
#[derive(Clone, Debug)]
pub enum PendingOp<E> {
    /// `add` or `replace` of a single entity.
    Upsert { kind: OpKind, entity: E },
    /// `remove` of a single entity.
    Remove { id: EntityId },
    /// `replace` of the whole collection: authoritative resync.
    ReplaceAll { entities: Vec<E> },
}

/// Decode one wire operation against collection `E`.
///
/// Anything that is not ours fails closed: foreign collections, field-level
/// paths whose value is not a whole entity, and values that do not
/// deserialize all yield `None`.
pub fn decode_op<E: SyncEntity>(op: &WireOp) -> Option<PendingOp<E>> {
    let target = decode_path(E::COLLECTION, &op.path)?;
    match (op.op, target) {
        (OpKind::Remove, PatchTarget::Entity(id)) => Some(PendingOp::Remove { id }),
        (kind @ (OpKind::Add | OpKind::Replace), PatchTarget::Entity(_)) => {
            let entity: E = serde_json::from_value(op.value.clone()?).ok()?;
            Some(PendingOp::Upsert { kind, entity })
        }
        (OpKind::Replace, PatchTarget::Collection) => {
            let by_id: HashMap<String, E> = serde_json::from_value(op.value.clone()?).ok()?;
            Some(PendingOp::ReplaceAll {
                entities: by_id.into_values().collect(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::model::{Task, TaskStatus};

    #[test]
    fn frame_wire_shapes() {
        let frame: StreamFrame = serde_json::from_str(r#"{"finished":true}"#).unwrap();
        assert_eq!(frame, StreamFrame::Finished(true));

        let frame: StreamFrame = serde_json::from_str(
            r#"{"JsonPatch":[{"op":"remove","path":"/tasks/abc"}]}"#,
        )
        .unwrap();
        assert_eq!(frame, StreamFrame::JsonPatch(vec![WireOp::remove("/tasks/abc")]));

        let out = serde_json::to_string(&StreamFrame::Finished(true)).unwrap();
        assert_eq!(out, r#"{"finished":true}"#);
    }

    #[test]
    fn unknown_frames_do_not_parse() {
        assert!(serde_json::from_str::<StreamFrame>(r#"{"Stdout":"noise"}"#).is_err());
    }

    #[test]
    fn decodes_remove() {
        let op = WireOp::remove("/tasks/abc");
        match decode_op::<Task>(&op) {
            Some(PendingOp::Remove { id }) => assert_eq!(id, EntityId::new("abc")),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn decodes_upsert_value() {
        let task = Task::test_fixture("a", TaskStatus::Todo, 1);
        let op = WireOp::add(
            format!("/tasks/{}", task.id),
            serde_json::to_value(&task).unwrap(),
        );
        match decode_op::<Task>(&op) {
            Some(PendingOp::Upsert { kind, entity }) => {
                assert_eq!(kind, OpKind::Add);
                assert_eq!(entity.id, task.id);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn decodes_full_collection_replace() {
        let a = Task::test_fixture("a", TaskStatus::Todo, 1);
        let b = Task::test_fixture("b", TaskStatus::Done, 2);
        let mut by_id = serde_json::Map::new();
        by_id.insert(a.id.to_string(), serde_json::to_value(&a).unwrap());
        by_id.insert(b.id.to_string(), serde_json::to_value(&b).unwrap());
        let op = WireOp::replace("/tasks", Value::Object(by_id));
        match decode_op::<Task>(&op) {
            Some(PendingOp::ReplaceAll { entities }) => assert_eq!(entities.len(), 2),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn foreign_and_malformed_ops_fail_closed() {
        assert!(decode_op::<Task>(&WireOp::remove("/projects/abc")).is_none());
        assert!(decode_op::<Task>(&WireOp::add("/tasks/abc", json!("not a task"))).is_none());
        // Field-level patch: value is not a whole entity.
        assert!(decode_op::<Task>(&WireOp::replace("/tasks/abc/title", json!("t"))).is_none());
        // Upsert without a value.
        let op = WireOp {
            op: OpKind::Replace,
            path: "/tasks/abc".into(),
            value: None,
        };
        assert!(decode_op::<Task>(&op).is_none());
        // Ops with no entity-level meaning.
        let op = WireOp {
            op: OpKind::Test,
            path: "/tasks/abc".into(),
            value: Some(json!({})),
        };
        assert!(decode_op::<Task>(&op).is_none());
    }
}
