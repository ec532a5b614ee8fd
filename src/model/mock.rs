//! Deterministic reference model.
//!
//! Used as the default runtime backend (no GPU weights required) and, more
//! importantly, as the fixture behind every testable property in section 8
//! of the spec: a real tensor backend cannot reproduce the literal scenarios
//! bit-for-bit, but a model whose argmax is a known closed-form successor
//! function, with pinpoint overrides, can.

use crate::error::Result;
use crate::model::capability::{LanguageModel, Logits, TokenId};
use std::collections::HashMap;

/// A model whose greedy next-token is `(last_token + 1) % vocab_size`,
/// except at explicitly overridden generation positions (0-indexed by the
/// number of tokens already fed in, prompt included) where a forced token
/// id takes over the logit peak. This lets tests script both agreeing
/// draft/target pairs (greedy-equivalence scenarios) and disagreeing pairs
/// (rejection scenarios) without any real weights.
#[derive(Debug, Clone)]
pub struct ArithmeticModel {
    vocab_size: usize,
    eos_token: TokenId,
    peak_logit: f32,
    overrides: HashMap<usize, TokenId>,
}

impl ArithmeticModel {
    pub fn new(vocab_size: usize, eos_token: TokenId) -> Self {
        Self {
            vocab_size,
            eos_token,
            peak_logit: 12.0,
            overrides: HashMap::new(),
        }
    }

    /// Force the greedy choice at generation position `position` (counting
    /// from the start of the prompt) to be `token`, regardless of the
    /// successor function.
    pub fn with_override(mut self, position: usize, token: TokenId) -> Self {
        self.overrides.insert(position, token);
        self
    }

    fn successor(&self, last: TokenId) -> TokenId {
        (last + 1) % self.vocab_size as u32
    }

    fn logits_for(&self, history: &[TokenId]) -> Logits {
        let position = history.len();
        let forced = self.overrides.get(&position).copied().unwrap_or_else(|| {
            history
                .last()
                .map(|&t| self.successor(t))
                .unwrap_or(0)
        });
        let mut logits = vec![0.0f32; self.vocab_size];
        let idx = (forced as usize).min(self.vocab_size - 1);
        logits[idx] = self.peak_logit;
        logits
    }
}

impl LanguageModel for ArithmeticModel {
    type State = Vec<TokenId>;

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn eos_token(&self) -> TokenId {
        self.eos_token
    }

    fn prefill(&self, tokens: &[TokenId]) -> Result<(Self::State, Logits)> {
        let state = tokens.to_vec();
        let logits = self.logits_for(&state);
        Ok((state, logits))
    }

    fn step(&self, state: &Self::State, token: TokenId) -> Result<(Self::State, Logits)> {
        let mut new_state = state.clone();
        new_state.push(token);
        let logits = self.logits_for(&new_state);
        Ok((new_state, logits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_is_deterministic() {
        let model = ArithmeticModel::new(100, 99);
        let (state, logits) = model.prefill(&[1, 2, 3]).unwrap();
        let argmax = logits
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i as u32)
            .unwrap();
        assert_eq!(argmax, 4);
        let (state2, logits2) = model.step(&state, argmax).unwrap();
        assert_eq!(state2, vec![1, 2, 3, 4]);
        let argmax2 = logits2
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i as u32)
            .unwrap();
        assert_eq!(argmax2, 5);
    }

    #[test]
    fn override_forces_a_specific_wrong_token() {
        let model = ArithmeticModel::new(100, 99).with_override(2, 9);
        let (_state, logits) = model.prefill(&[1, 2]).unwrap();
        let argmax = logits
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i as u32)
            .unwrap();
        assert_eq!(argmax, 9);
    }
}
