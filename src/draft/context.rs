//! Per-session draft context: the live `(past, last_logits)` pair plus a
//! bounded snapshot stack used to roll back after partial acceptance.

use crate::model::{LanguageModel, Logits};
use std::collections::VecDeque;

/// One saved point in a `GenerateDraft` round: the state after having
/// emitted exactly `emitted` tokens this round, and the logits for the
/// token that would come next. Slot 0 is the pre-round state.
#[derive(Debug, Clone)]
pub struct Snapshot<S> {
    pub state: S,
    pub logits: Logits,
}

/// Bounded ring of snapshots, max depth γ+1. Deep-copy semantics only:
/// pushing clones the state rather than aliasing it, since the live
/// `state` is mutated by the next forward pass (invariant 2).
#[derive(Debug)]
pub struct SnapshotStack<S> {
    slots: VecDeque<Snapshot<S>>,
    max_depth: usize,
}

impl<S: Clone> SnapshotStack<S> {
    pub fn new(max_depth: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(max_depth),
            max_depth,
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn push(&mut self, state: &S, logits: &Logits) {
        if self.slots.len() == self.max_depth {
            self.slots.pop_front();
        }
        self.slots.push_back(Snapshot {
            state: state.clone(),
            logits: logits.clone(),
        });
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot<S>> {
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Per-session draft state on the draft worker.
pub struct DraftCtx<M: LanguageModel> {
    pub state: M::State,
    pub last_logits: Logits,
    pub snapshot_stack: SnapshotStack<M::State>,
}

impl<M: LanguageModel> DraftCtx<M> {
    pub fn new(state: M::State, last_logits: Logits, gamma: usize) -> Self {
        Self {
            state,
            last_logits,
            snapshot_stack: SnapshotStack::new(gamma + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_evicts_oldest_past_max_depth() {
        let mut stack: SnapshotStack<Vec<u32>> = SnapshotStack::new(2);
        stack.push(&vec![1], &vec![0.1]);
        stack.push(&vec![2], &vec![0.2]);
        stack.push(&vec![3], &vec![0.3]);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.get(0).unwrap().state, vec![2]);
        assert_eq!(stack.get(1).unwrap().state, vec![3]);
    }

    #[test]
    fn push_deep_copies_rather_than_aliasing() {
        let mut stack: SnapshotStack<Vec<u32>> = SnapshotStack::new(4);
        let mut live = vec![1, 2];
        stack.push(&live, &vec![0.0]);
        live.push(3);
        assert_eq!(stack.get(0).unwrap().state, vec![1, 2]);
    }
}
