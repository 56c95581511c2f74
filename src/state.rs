use std::collections::HashSet;

use crate::message::{BroadcastValue, NodeId};

/// Local view of the replicated broadcast set and the gossip fan-out.
///
/// Owned by the dispatch task, which is its only writer.
#[derive(Debug, Default)]
pub struct NodeState {
    seen: HashSet<BroadcastValue>,
    neighbors: Vec<NodeId>,
}

impl NodeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value, returning true the first time it is observed
    pub fn observe(&mut self, value: BroadcastValue) -> bool {
        self.seen.insert(value)
    }

    pub fn set_neighbors(&mut self, neighbors: Vec<NodeId>) {
        self.neighbors = neighbors;
    }

    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    /// Every known value, in no particular order
    pub fn snapshot_values(&self) -> Vec<BroadcastValue> {
        self.seen.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_reports_only_first_sighting() {
        let mut state = NodeState::new();
        assert!(state.observe(3));
        assert!(!state.observe(3));
        assert!(state.observe(-4));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn snapshot_is_the_distinct_set() {
        let mut state = NodeState::new();
        for value in [5, 1, 5, 2, 1, 5] {
            state.observe(value);
        }

        let mut values = state.snapshot_values();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2, 5]);
    }

    #[test]
    fn neighbors_are_replaced_not_appended() {
        let mut state = NodeState::new();
        assert!(state.neighbors().is_empty());

        state.set_neighbors(vec!["n2".into(), "n3".into()]);
        state.set_neighbors(vec!["n4".into()]);
        assert_eq!(state.neighbors(), ["n4".to_string()]);
    }
}
