//! Per-partition pagination counters and batched delta accounting.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Counters for one logical bucket.
///
/// `offset` counts entities deterministically accounted for in the
/// partition (snapshot or patch), which is the cursor for the next page.
/// `total` is the server's last-known count: adjusted by patch deltas,
/// overwritten wholesale by snapshot pages. Both never go negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionState {
    pub offset: usize,
    pub total: usize,
    pub has_more: bool,
    pub is_loading: bool,
}

/// Net add/remove deltas accumulated over one batch, committed in a single
/// follow-up update so observers never see an intermediate count.
#[derive(Clone, Debug)]
pub struct PartitionDeltas<P> {
    deltas: HashMap<P, i64>,
}

impl<P> Default for PartitionDeltas<P> {
    fn default() -> Self {
        Self {
            deltas: HashMap::new(),
        }
    }
}

impl<P: Clone + Eq + Hash> PartitionDeltas<P> {
    pub fn added(&mut self, partition: P) {
        *self.deltas.entry(partition).or_default() += 1;
    }

    pub fn removed(&mut self, partition: P) {
        *self.deltas.entry(partition).or_default() -= 1;
    }

    /// Forget the delta for one partition; used when a snapshot page
    /// overwrites that partition's counters wholesale.
    pub fn clear(&mut self, partition: &P) {
        self.deltas.remove(partition);
    }

    pub fn reset(&mut self) {
        self.deltas.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.values().all(|delta| *delta == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&P, i64)> {
        self.deltas.iter().map(|(partition, delta)| (partition, *delta))
    }
}

/// All partition counters for one collection.
#[derive(Clone, Debug)]
pub struct PartitionTable<P> {
    states: HashMap<P, PartitionState>,
}

impl<P> Default for PartitionTable<P> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
        }
    }
}

impl<P: Clone + Eq + Hash> PartitionTable<P> {
    /// Current state, defaulting to zeroed counters for unseen partitions.
    pub fn state(&self, partition: &P) -> PartitionState {
        self.states.get(partition).copied().unwrap_or_default()
    }

    pub fn state_mut(&mut self, partition: P) -> &mut PartitionState {
        self.states.entry(partition).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&P, &PartitionState)> {
        self.states.iter()
    }

    /// Apply accumulated deltas to `total` and `offset`, floored at zero.
    pub fn apply_deltas(&mut self, deltas: &PartitionDeltas<P>) {
        for (partition, delta) in deltas.iter() {
            if delta == 0 {
                continue;
            }
            let state = self.state_mut(partition.clone());
            if delta > 0 {
                state.total = state.total.saturating_add(delta as usize);
                state.offset = state.offset.saturating_add(delta as usize);
            } else {
                let magnitude = delta.unsigned_abs() as usize;
                state.total = state.total.saturating_sub(magnitude);
                state.offset = state.offset.saturating_sub(magnitude);
            }
        }
    }
}
