//! RFC 6901 pointer decoding for patch paths.
//!
//! Decoding is pure and fails closed: a path that is malformed or addresses
//! a collection we do not track decodes to `None`, never to an error. Shared
//! multi-collection streams make foreign paths expected noise.

use super::entity::EntityId;

/// Decoded target of a patch path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchTarget {
    /// `/<collection>/<id>`: one entity.
    Entity(EntityId),
    /// `/<collection>` exactly: the whole collection (authoritative resync).
    Collection,
}

/// Parse `path` against the given collection name.
///
/// Paths deeper than `/<collection>/<id>` keep their first id segment; the
/// value of such a field-level operation will not deserialize as a whole
/// entity and is dropped downstream.
pub fn decode_path(collection: &str, path: &str) -> Option<PatchTarget> {
    let rest = path.strip_prefix('/')?;
    let (head, tail) = match rest.split_once('/') {
        Some((head, tail)) => (head, Some(tail)),
        None => (rest, None),
    };

    if unescape(head) != collection {
        return None;
    }

    match tail {
        None => Some(PatchTarget::Collection),
        Some(tail) => {
            let id = tail.split('/').next().unwrap_or("");
            if id.is_empty() {
                return None;
            }
            Some(PatchTarget::Entity(EntityId::new(unescape(id))))
        }
    }
}

/// Reverse RFC 6901 escaping: `~1` then `~0`, in that order.
fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}
