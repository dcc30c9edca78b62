//! Derived per-partition views.

use std::collections::{BTreeMap, HashMap};

use super::entity::{EntityId, SortPolicy, SyncEntity};

/// Project the flat entity map into partition-keyed sorted views.
///
/// Pure function of the map; ties break on entity id so the output is
/// deterministic for equal timestamps.
pub fn project_views<E: SyncEntity>(
    entities: &HashMap<EntityId, E>,
) -> BTreeMap<E::Partition, Vec<E>> {
    let mut by_partition: BTreeMap<E::Partition, Vec<E>> = BTreeMap::new();
    for entity in entities.values() {
        by_partition
            .entry(entity.partition())
            .or_default()
            .push(entity.clone());
    }

    for (partition, items) in &mut by_partition {
        match E::sort_policy(partition) {
            SortPolicy::CreatedAsc => items.sort_by(|a, b| {
                a.created_at()
                    .cmp(&b.created_at())
                    .then_with(|| a.id().cmp(&b.id()))
            }),
            SortPolicy::UpdatedDesc => items.sort_by(|a, b| {
                b.updated_at()
                    .cmp(&a.updated_at())
                    .then_with(|| a.id().cmp(&b.id()))
            }),
        }
    }

    by_partition
}
