//! Draft worker: hosts the small model, answers `GenerateDraft` proposals
//! with rollback-capable snapshots.
//!
//! State machine per session: `SessionOpen -> [Proposed -> Committed]* ->
//! Closed`. `GenerateDraft` is legal from `SessionOpen` or `Committed`;
//! `UpdateDraftContext` only from `Proposed`.

use crate::draft::context::DraftCtx;
use crate::error::{CoordinatorError, Result};
use crate::model::{LanguageModel, ModelConfig};
use crate::sampling::{softmax, top_p_filter};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Open,
    Proposed,
    Committed,
    Closed,
}

struct SessionRecord<M: LanguageModel> {
    ctx: DraftCtx<M>,
    phase: SessionPhase,
}

/// Sampling parameters applied when drafting. Not part of the wire schema —
/// set once at process startup from the worker binary's CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct DraftSamplingParams {
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for DraftSamplingParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.9,
        }
    }
}

pub struct DraftWorker<M: LanguageModel> {
    model: M,
    loaded_config: Mutex<Option<ModelConfig>>,
    sessions: Mutex<HashMap<String, SessionRecord<M>>>,
    sampling: DraftSamplingParams,
}

impl<M: LanguageModel> DraftWorker<M> {
    pub fn new(model: M, sampling: DraftSamplingParams) -> Self {
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
        let (state, logits) = self.model.prefill(&input_ids)?;
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            session_id,
            SessionRecord {
                ctx: DraftCtx::<M>::new(state, logits, 0),
                phase: SessionPhase::Open,
            },
        );
        Ok(())
    }

    /// Propose up to `gamma` tokens for one session, writing the snapshot
    /// stack as it goes. Returns `(tokens, probabilities)`, truncated short
    /// of `gamma` only on early EOS.
    pub async fn generate_draft(&self, session_id: &str, gamma: u32, rng: &mut impl rand::Rng) -> Result<(Vec<u32>, Vec<f32>)> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| CoordinatorError::SessionAbsent(session_id.to_string()))?;
        match record.phase {
            SessionPhase::Closed => return Err(CoordinatorError::Terminated(session_id.to_string())),
            SessionPhase::Proposed => {
                return Err(CoordinatorError::ProtocolError(format!(
                    "GenerateDraft called on session {session_id} with an unfinalized round still open"
                )));
            }
            SessionPhase::Open | SessionPhase::Committed => {}
        }

        record.ctx.snapshot_stack = crate::draft::context::SnapshotStack::new(gamma as usize + 1);
        record.ctx.snapshot_stack.push(&record.ctx.state, &record.ctx.last_logits);

        let mut tokens = Vec::with_capacity(gamma as usize);
        let mut probs = Vec::with_capacity(gamma as usize);
        let eos = self.model.eos_token();

        for _ in 0..gamma {
            let base = softmax(&record.ctx.last_logits, self.sampling.temperature);
            let filtered = top_p_filter(&base, self.sampling.top_p);
            let token = crate::acceptance::sample_categorical(&filtered, rng);
            let q = filtered.get(token as usize).copied().unwrap_or(0.0);

            tokens.push(token);
            probs.push(q);

            let (new_state, new_logits) = self.model.step(&record.ctx.state, token)?;
            record.ctx.state = new_state;
            record.ctx.last_logits = new_logits;
            record.ctx.snapshot_stack.push(&record.ctx.state, &record.ctx.last_logits);

            if token == eos {
                break;
            }
        }

        record.phase = SessionPhase::Proposed;
        Ok((tokens, probs))
    }

    /// The draft's filtered+renormalized distribution `Q_a` at a given
    /// snapshot index (the `GetDraftDistribution` extension RPC).
    pub async fn draft_distribution(&self, session_id: &str, snapshot_index: usize) -> Result<Vec<f32>> {
        let sessions = self.sessions.lock().await;
        let record = sessions
            .get(session_id)
            .ok_or_else(|| CoordinatorError::SessionAbsent(session_id.to_string()))?;
        let snapshot = record
            .ctx
            .snapshot_stack
            .get(snapshot_index)
            .ok_or_else(|| CoordinatorError::ProtocolError(format!("snapshot {snapshot_index} out of range")))?;
        let base = softmax(&snapshot.logits, self.sampling.temperature);
        Ok(top_p_filter(&base, self.sampling.top_p))
    }

    /// Roll back to `snapshot_stack[accepted_count]`, then ingest
    /// `new_token` if nonzero semantics apply (caller passes `None` for "no
    /// forced token", which only happens if the round produced nothing at
    /// all — every real round always supplies a bonus token).
    pub async fn update_draft_context(&self, session_id: &str, accepted_count: usize, new_token: Option<u32>) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| CoordinatorError::SessionAbsent(session_id.to_string()))?;
        if record.phase != SessionPhase::Proposed {
            return Err(CoordinatorError::ProtocolError(format!(
                "UpdateDraftContext called outside Proposed for session {session_id}"
            )));
        }

        let snapshot = record
            .ctx
            .snapshot_stack
            .get(accepted_count)
            .ok_or_else(|| CoordinatorError::ProtocolError(format!("snapshot {accepted_count} out of range")))?
            .clone();
        record.ctx.state = snapshot.state;
        record.ctx.last_logits = snapshot.logits;

        if let Some(token) = new_token {
            let (new_state, new_logits) = self.model.step(&record.ctx.state, token)?;
            record.ctx.state = new_state;
            record.ctx.last_logits = new_logits;
        }

        record.ctx.snapshot_stack.clear();
        record.phase = SessionPhase::Committed;
        Ok(())
    }

    pub async fn close_session(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().await;
        if let Some(record) = sessions.get_mut(session_id) {
            record.phase = SessionPhase::Closed;
        }
    }
}
