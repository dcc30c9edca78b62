//! Deterministic merge of patch batches and snapshot pages into engine state.
//!
//! The reconciler is the single owner of the entity map and partition
//! counters: every other component requests merges through it and only ever
//! reads. A batch commits as one observable transition, in two phases:
//! entity-map mutations plus accumulated deltas first, then one counter
//! update, then view recomputation.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use super::entity::{EntityId, SyncEntity};
use super::partition::{PartitionDeltas, PartitionState, PartitionTable};
use super::patch::{PendingOp, WireOp, decode_op};
use super::staleness::should_apply;
use super::views::project_views;

pub struct Reconciler<E: SyncEntity> {
    scope: E::Scope,
    entities: HashMap<EntityId, E>,
    partitions: PartitionTable<E::Partition>,
    views: BTreeMap<E::Partition, Vec<E>>,
}

impl<E: SyncEntity> Reconciler<E> {
    pub fn new(scope: E::Scope) -> Self {
        Self {
            scope,
            entities: HashMap::new(),
            partitions: PartitionTable::default(),
            views: BTreeMap::new(),
        }
    }

    pub fn scope(&self) -> &E::Scope {
        &self.scope
    }

    pub fn entity(&self, id: &EntityId) -> Option<&E> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> &HashMap<EntityId, E> {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Sorted view of one partition; empty for unseen partitions.
    pub fn view(&self, partition: &E::Partition) -> &[E] {
        self.views.get(partition).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn views(&self) -> &BTreeMap<E::Partition, Vec<E>> {
        &self.views
    }

    pub fn partition_state(&self, partition: &E::Partition) -> PartitionState {
        self.partitions.state(partition)
    }

    pub fn partitions(&self) -> &PartitionTable<E::Partition> {
        &self.partitions
    }

    /// Fold one patch batch into the state.
    ///
    /// Operations sharing an id apply in array order, mirroring upstream
    /// patch semantics; undecodable and out-of-scope operations are skipped
    /// without error.
    pub fn apply_batch(&mut self, batch: &[WireOp]) {
        let mut deltas = PartitionDeltas::default();
        for op in batch {
            let Some(pending) = decode_op::<E>(op) else {
                trace!(path = %op.path, "skipping operation not addressed to this collection");
                continue;
            };
            match pending {
                PendingOp::Remove { id } => self.merge_remove(&id, &mut deltas),
                PendingOp::Upsert { entity, .. } => self.merge_upsert(entity, &mut deltas),
                PendingOp::ReplaceAll { entities } => {
                    self.replace_all(entities);
                    // Counters were recomputed wholesale; earlier deltas in
                    // this batch are subsumed.
                    deltas.reset();
                }
            }
        }
        self.partitions.apply_deltas(&deltas);
        self.rebuild_views();
    }

    /// Merge one snapshot page: a bulk `replace` through the same staleness
    /// guard as live patches, then an authoritative counter commit for the
    /// fetched partition.
    pub fn merge_page(
        &mut self,
        partition: &E::Partition,
        items: Vec<E>,
        total: usize,
        has_more: bool,
    ) {
        let returned = items.len();
        let mut deltas = PartitionDeltas::default();
        for entity in items {
            self.merge_upsert(entity, &mut deltas);
        }
        // The fetched partition's total comes from the server; deltas from
        // entities the page moved out of other partitions still apply.
        deltas.clear(partition);
        self.partitions.apply_deltas(&deltas);

        let state = self.partitions.state_mut(partition.clone());
        state.offset = state.offset.saturating_add(returned);
        state.total = total;
        state.has_more = has_more;
        state.is_loading = false;
        self.rebuild_views();
    }

    /// Arm the per-partition loading latch. Returns false if a load is
    /// already in flight; callers must then back off rather than queue.
    pub fn begin_load(&mut self, partition: &E::Partition) -> bool {
        let state = self.partitions.state_mut(partition.clone());
        if state.is_loading {
            return false;
        }
        state.is_loading = true;
        true
    }

    /// Clear the loading latch after a failed fetch. No partial merge has
    /// happened by contract, so counters stay as they were.
    pub fn fail_load(&mut self, partition: &E::Partition) {
        self.partitions.state_mut(partition.clone()).is_loading = false;
    }

    fn merge_remove(&mut self, id: &EntityId, deltas: &mut PartitionDeltas<E::Partition>) {
        if let Some(existing) = self.entities.remove(id) {
            deltas.removed(existing.partition());
        }
    }

    fn merge_upsert(&mut self, entity: E, deltas: &mut PartitionDeltas<E::Partition>) {
        if !entity.in_scope(&self.scope) {
            trace!(id = %entity.id(), "skipping entity outside the subscribed scope");
            return;
        }
        let id = entity.id();
        match self.entities.get(&id) {
            Some(existing) => {
                if !should_apply(Some(existing), &entity) {
                    debug!(id = %id, "dropping stale update");
                    return;
                }
                let old = existing.partition();
                let new = entity.partition();
                if old != new {
                    // Partition move: one transfer, not two independent ops.
                    deltas.removed(old);
                    deltas.added(new);
                }
                self.entities.insert(id, entity);
            }
            None => {
                deltas.added(entity.partition());
                self.entities.insert(id, entity);
            }
        }
    }

    /// Authoritative resync: swap in the new collection and recompute every
    /// partition's counters from it. The only path besides explicit `remove`
    /// that may delete entities.
    fn replace_all(&mut self, entities: Vec<E>) {
        self.entities = entities
            .into_iter()
            .filter(|entity| entity.in_scope(&self.scope))
            .map(|entity| (entity.id(), entity))
            .collect();

        let mut counts: HashMap<E::Partition, usize> = HashMap::new();
        for entity in self.entities.values() {
            *counts.entry(entity.partition()).or_default() += 1;
        }

        let known: Vec<E::Partition> = self
            .partitions
            .iter()
            .map(|(partition, _)| partition.clone())
            .chain(counts.keys().cloned())
            .collect();
        for partition in known {
            let count = counts.get(&partition).copied().unwrap_or(0);
            let state = self.partitions.state_mut(partition);
            state.total = count;
            state.offset = count;
            state.has_more = false;
        }
    }

    fn rebuild_views(&mut self) {
        self.views = project_views(&self.entities);
    }
}
