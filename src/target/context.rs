//! Per-session target context. Unlike the draft side, the committed KV
//! cache never rolls back — only the scratch region used to verify a
//! proposed chunk before it's accepted is discardable.

use crate::draft::context::Snapshot;
use crate::model::Logits;

/// A reversible, uncommitted extension of the committed cache used while
/// verifying a drafted chunk. At most one scratch region is active per
/// session at a time (spec §4.3 invariant).
///
/// `steps[i]` is the state/logits after exactly `i` of the drafted tokens
/// have been walked (`steps[0]` is the pre-walk point, matching the
/// committed cache). This lets `FinalizeBatchTokens` resume from whatever
/// prefix the acceptance walk actually accepted — which is not always the
/// full drafted chunk — instead of only the fully-walked tail.
#[derive(Debug, Clone)]
pub struct Scratch<S> {
    pub steps: Vec<Snapshot<S>>,
    pub probs_so_far: Vec<f32>,
}

impl<S> Scratch<S> {
    pub fn at(&self, accept_count: usize) -> Option<&Snapshot<S>> {
        self.steps.get(accept_count)
    }
}

pub struct TargetCtx<S> {
    pub state: S,
    pub last_logits: Logits,
    pub next_pos: usize,
    pub scratch: Option<Scratch<S>>,
}

impl<S: Clone> TargetCtx<S> {
    pub fn new(state: S, last_logits: Logits, next_pos: usize) -> Self {
        Self {
            state,
            last_logits,
            next_pos,
            scratch: None,
        }
    }

    /// Discard any in-flight scratch region, per the "a VerifyBatchTokens
    /// on a session with a non-empty scratch must first abort it" rule.
    pub fn abort_scratch(&mut self) {
        self.scratch = None;
    }
}
