//! Real `LanguageModel` backend over `llama-cpp-2`, gated the same way the
//! teacher gates it (`cpu`/`metal`/`cuda`/`vulkan` features).
//!
//! Each [`LlamaState`] is a llama.cpp sequence id plus its token count. The
//! KV cache itself lives inside the shared [`LlamaContext`], which this
//! adapter wraps in a mutex since forward passes are not reentrant (spec
//! §5). `prefill`/`step` never mutate an existing sequence in place —
//! every call allocates a fresh sequence id and uses `llama_kv_cache_seq_cp`
//! to copy the parent sequence's cache into it first, which is what gives
//! `LlamaState: Clone` its deep-copy semantics (design notes §9, option a).

use crate::error::{CoordinatorError, Result};
use crate::model::capability::{LanguageModel, Logits, TokenId};
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::LlamaModel;
use llama_cpp_2::token::LlamaToken;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct LlamaState {
    seq_id: i32,
    n_past: i32,
}

pub struct LlamaAdapter {
    _backend: LlamaBackend,
    model: LlamaModel,
    context: Mutex<LlamaContext<'static>>,
    next_seq_id: AtomicI32,
    vocab_size: usize,
    eos_token: TokenId,
}

impl LlamaAdapter {
    pub fn load(model_path: &str, n_positions: u32) -> Result<Self> {
        let backend = LlamaBackend::init().map_err(|e| CoordinatorError::LoadFailure(format!("backend init failed: {e}")))?;
        let model_params = llama_cpp_2::model::params::LlamaModelParams::default();
        let model = LlamaModel::load_from_file(&backend, model_path, &model_params)
            .map_err(|e| CoordinatorError::LoadFailure(format!("failed to load {model_path}: {e}")))?;

        let ctx_params = LlamaContextParams::default().with_n_ctx(std::num::NonZeroU32::new(n_positions));
        // SAFETY equivalent to the teacher's pattern: the context borrows
        // from `model`, which this struct keeps alive for its own lifetime.
        let context = model
            .new_context(&backend, ctx_params)
            .map_err(|e| CoordinatorError::LoadFailure(format!("failed to create context: {e}")))?;
        let context: LlamaContext<'static> = unsafe { std::mem::transmute(context) };

        let vocab_size = model.n_vocab() as usize;
        let eos_token = model.token_eos().0 as TokenId;

        Ok(Self {
            _backend: backend,
            model,
            context: Mutex::new(context),
            next_seq_id: AtomicI32::new(0),
            vocab_size,
            eos_token,
        })
    }

    fn fresh_seq_id(&self) -> i32 {
        self.next_seq_id.fetch_add(1, Ordering::SeqCst)
    }

    fn logits_for_seq(ctx: &LlamaContext, batch_index: i32) -> Logits {
        ctx.candidates_ith(batch_index).map(|c| c.logit()).collect()
    }
}

impl LanguageModel for LlamaAdapter {
    type State = LlamaState;

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn eos_token(&self) -> TokenId {
        self.eos_token
    }

    fn prefill(&self, tokens: &[TokenId]) -> Result<(Self::State, Logits)> {
        let seq_id = self.fresh_seq_id();
        let mut ctx = self.context.lock().unwrap();

        let mut batch = LlamaBatch::new(tokens.len().max(1), 1);
        let llama_tokens: Vec<LlamaToken> = tokens.iter().map(|&t| LlamaToken(t as i32)).collect();
        for (i, token) in llama_tokens.iter().enumerate() {
            let is_last = i == llama_tokens.len() - 1;
            batch
                .add(*token, i as i32, &[seq_id], is_last)
                .map_err(|e| CoordinatorError::WorkerFault(format!("batch add failed: {e}")))?;
        }
        ctx.decode(&mut batch)
            .map_err(|e| CoordinatorError::WorkerFault(format!("decode failed: {e}")))?;

        let logits = Self::logits_for_seq(&ctx, batch.n_tokens() - 1);
        Ok((
            LlamaState {
                seq_id,
                n_past: tokens.len() as i32,
            },
            logits,
        ))
    }

    fn step(&self, state: &Self::State, token: TokenId) -> Result<(Self::State, Logits)> {
        let new_seq_id = self.fresh_seq_id();
        let mut ctx = self.context.lock().unwrap();

        ctx.get_kv_cache_mut()
            .seq_cp(state.seq_id, new_seq_id, None, None)
            .map_err(|e| CoordinatorError::WorkerFault(format!("kv cache copy failed: {e}")))?;

        let mut batch = LlamaBatch::new(1, 1);
        batch
            .add(LlamaToken(token as i32), state.n_past, &[new_seq_id], true)
            .map_err(|e| CoordinatorError::WorkerFault(format!("batch add failed: {e}")))?;
        ctx.decode(&mut batch)
            .map_err(|e| CoordinatorError::WorkerFault(format!("decode failed: {e}")))?;

        let logits = Self::logits_for_seq(&ctx, 0);
        Ok((
            LlamaState {
                seq_id: new_seq_id,
                n_past: state.n_past + 1,
            },
            logits,
        ))
    }
}

