//! Thin capability boundary over the model weights and tensor kernels.
//!
//! Per the spec, the model internals are an external collaborator: the
//! coordinator never touches tensors directly, only this trait. Two
//! implementations exist in this crate: [`mock::ArithmeticModel`](super::mock::ArithmeticModel),
//! a deterministic reference model used for tests and as the default
//! runtime backend, and (behind the `cpu`/`metal`/`cuda`/`vulkan` features,
//! same gating the teacher used for `llama-cpp-2`) a real adapter over
//! `llama-cpp-2` in [`llama_adapter`](super::llama_adapter).

use crate::error::Result;

pub type TokenId = u32;
pub type Logits = Vec<f32>;

/// A language model capable of prefilling a prompt and stepping one token
/// at a time, exposing raw (unfiltered, untemperatured) logits.
///
/// `State` is the opaque per-sequence KV-cache handle. It must be a real,
/// independent deep copy on `Clone` — the draft worker's snapshot stack
/// relies on this to satisfy invariant 2 (snapshots are independent copies,
/// no aliasing into live tensors).
pub trait LanguageModel: Send + Sync + 'static {
    type State: Clone + Send + Sync + std::fmt::Debug + 'static;

    fn vocab_size(&self) -> usize;
    fn eos_token(&self) -> TokenId;

    /// Run a forward pass over the full prompt, returning the resulting
    /// state and the logits for the next token.
    fn prefill(&self, tokens: &[TokenId]) -> Result<(Self::State, Logits)>;

    /// Advance `state` by one token, returning the new state and the
    /// logits for the token after it.
    fn step(&self, state: &Self::State, token: TokenId) -> Result<(Self::State, Logits)>;
}
