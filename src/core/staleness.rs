//! Timestamp guard against out-of-order and re-delivered updates.
//!
//! Delivery order is not the correctness mechanism; across a reconnect no
//! ordering holds between the old connection's tail and the new one's head.
//! This guard is: equal-or-newer wins, older is dropped, which makes
//! `replace` idempotent under at-least-once delivery.

use super::entity::SyncEntity;

/// Whether `incoming` may overwrite `existing`.
///
/// True if nothing is held yet, or if the incoming revision is not older
/// than the held one. An `add` over an existing copy goes through the same
/// rule, degraded to a replace.
pub fn should_apply<E: SyncEntity>(existing: Option<&E>, incoming: &E) -> bool {
    match existing {
        None => true,
        Some(current) => incoming.updated_at() >= current.updated_at(),
    }
}
