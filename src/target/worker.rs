//! Target worker: hosts the large model, gives per-token probabilities for
//! drafted chunks, and commits accepted prefixes to the durable KV cache.

use crate::acceptance::{residual_distribution, sample_categorical};
use crate::draft::context::Snapshot;
use crate::error::{CoordinatorError, Result};
use crate::model::{LanguageModel, ModelConfig};
use crate::sampling::softmax;
use crate::target::context::{Scratch, TargetCtx};
use std::collections::HashMap;
use tokio::sync::Mutex;

struct SessionRecord<M: LanguageModel> {
    ctx: TargetCtx<M::State>,
    /// Last tokens committed via `FinalizeBatchTokens`, to detect and no-op
    /// an identical retry rather than double-committing (invariant 5).
    last_finalized: Vec<u32>,
    finished: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TargetSamplingParams {
    pub temperature: f32,
}

impl Default for TargetSamplingParams {
    fn default() -> Self {
        Self { temperature: 1.0 }
    }
}

pub struct TargetWorker<M: LanguageModel> {
    model: M,
    loaded_config: Mutex<Option<ModelConfig>>,
    sessions: Mutex<HashMap<String, SessionRecord<M>>>,
    sampling: TargetSamplingParams,
}

impl<M: LanguageModel> TargetWorker<M> {
    pub fn new(model: M, sampling: TargetSamplingParams) -> Self {
        Self {
            model,
            loaded_config: Mutex::new(None),
            sessions: Mutex::new(HashMap::new()),
            sampling,
        }
    }

    pub async fn load_model(&self, config: ModelConfig) -> Result<()> {
        let mut loaded = self.loaded_config.lock().await;
        match loaded.as_ref() {
            Some(existing) if !existing.same_signature(&config) => Err(CoordinatorError::LoadFailure(
                "model already loaded with a different configuration".into(),
            )),
            _ => {
                *loaded = Some(config);
                Ok(())
            }
        }
    }

    pub fn eos_token(&self) -> crate::model::TokenId {
        self.model.eos_token()
    }

    pub async fn start_session(&self, session_id: String, input_ids: Vec<u32>) -> Result<()> {
        let next_pos = input_ids.len();
        let (state, logits) = self.model.prefill(&input_ids)?;
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            session_id,
            SessionRecord {
                ctx: TargetCtx::new(state, logits, next_pos),
                last_finalized: Vec::new(),
                finished: false,
            },
        );
        Ok(())
    }

    /// Advance a scratch copy of the cache through `draft_tokens`,
    /// returning the target's probability of each under the stored
    /// temperature. Never mutates the committed cache. `scratch.steps[i]`
    /// records the state after exactly `i` tokens, so a later
    /// `FinalizeBatchTokens` can resume from whatever prefix the
    /// acceptance walk actually accepted.
    pub async fn verify_batch(&self, session_id: &str, draft_tokens: &[u32]) -> Result<Vec<f32>> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| CoordinatorError::SessionAbsent(session_id.to_string()))?;

        record.ctx.abort_scratch();
        let mut state = record.ctx.state.clone();
        let mut logits = record.ctx.last_logits.clone();
        let mut steps = Vec::with_capacity(draft_tokens.len() + 1);
        steps.push(Snapshot {
            state: state.clone(),
            logits: logits.clone(),
        });
        let mut probs = Vec::with_capacity(draft_tokens.len());

        for &token in draft_tokens {
            let distribution = softmax(&logits, self.sampling.temperature);
            probs.push(distribution.get(token as usize).copied().unwrap_or(0.0));
            let (new_state, new_logits) = self.model.step(&state, token)?;
            state = new_state;
            logits = new_logits;
            steps.push(Snapshot {
                state: state.clone(),
                logits: logits.clone(),
            });
        }

        record.ctx.scratch = Some(Scratch {
            steps,
            probs_so_far: probs.clone(),
        });
        Ok(probs)
    }

    /// Commit `tokens` (the accepted prefix plus the bonus token) to the
    /// durable cache. `accept_count` is how many leading tokens were
    /// accepted draft tokens, so this resumes from `scratch.steps[accept_count]`
    /// and only replays the trailing forced token(s), rather than assuming
    /// the whole drafted chunk was accepted. A call with tokens identical to
    /// the last finalize is a no-op that returns the same result, rather
    /// than appending twice.
    pub async fn finalize_batch(&self, session_id: &str, tokens: &[u32], accept_count: usize) -> Result<bool> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| CoordinatorError::SessionAbsent(session_id.to_string()))?;

        if record.last_finalized == tokens {
            return Ok(record.finished);
        }

        let resume = record.ctx.scratch.as_ref().and_then(|s| s.at(accept_count)).cloned();
        let (mut state, mut logits) = match resume {
            Some(snapshot) => (snapshot.state, snapshot.logits),
            None => (record.ctx.state.clone(), record.ctx.last_logits.clone()),
        };
        record.ctx.abort_scratch();

        let replay_from = accept_count.min(tokens.len());
        for &token in &tokens[replay_from..] {
            let (new_state, new_logits) = self.model.step(&state, token)?;
            state = new_state;
            logits = new_logits;
        }

        record.ctx.state = state;
        record.ctx.last_logits = logits;
        record.ctx.next_pos += tokens.len();

        let eos = self.model.eos_token();
        let finished = tokens.iter().any(|&t| t == eos);
        record.finished = finished;
        record.last_finalized = tokens.to_vec();
        Ok(finished)
    }

    pub async fn check_token_probability(&self, session_id: &str, token_id: u32) -> Result<f32> {
        let sessions = self.sessions.lock().await;
        let record = sessions
            .get(session_id)
            .ok_or_else(|| CoordinatorError::SessionAbsent(session_id.to_string()))?;
        let distribution = softmax(&record.ctx.last_logits, self.sampling.temperature);
        Ok(distribution.get(token_id as usize).copied().unwrap_or(0.0))
    }

    pub async fn append_token(&self, session_id: &str, token_id: u32) -> Result<bool> {
        {
            let mut sessions = self.sessions.lock().await;
            if let Some(record) = sessions.get_mut(session_id) {
                record.ctx.abort_scratch();
            }
        }
        self.finalize_batch(session_id, &[token_id], 0).await
    }

    /// `draft_distribution` empty => free sample from the target's
    /// distribution at `accept_count`. Otherwise sample from the
    /// renormalized residual `max(P - Q, 0)` at that same position — the
    /// distribution right after the accepted prefix, not the round's
    /// starting distribution.
    pub async fn generate_target_token(
        &self,
        session_id: &str,
        accept_count: usize,
        draft_distribution: &[f32],
        rng: &mut impl rand::Rng,
    ) -> Result<u32> {
        let sessions = self.sessions.lock().await;
        let record = sessions
            .get(session_id)
            .ok_or_else(|| CoordinatorError::SessionAbsent(session_id.to_string()))?;
        let logits = record
            .ctx
            .scratch
            .as_ref()
            .and_then(|s| s.at(accept_count))
            .map(|snap| &snap.logits)
            .unwrap_or(&record.ctx.last_logits);
        let p = softmax(logits, self.sampling.temperature);
        if draft_distribution.is_empty() {
            Ok(sample_categorical(&p, rng))
        } else {
            let residual = residual_distribution(&p, draft_distribution);
            Ok(sample_categorical(&residual, rng))
        }
    }

    pub async fn close_session(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }
}
