//! Multi-session scheduler: drives every active session through exactly one
//! verify round per `step_all` call, batching the propose/verify/finalize
//! RPCs across sessions that share a γ while keeping each session's own
//! round strictly ordered (propose -> verify -> bonus -> commit).

pub mod client;

use crate::acceptance::run_acceptance_walk;
use crate::error::{CoordinatorError, Result};
use crate::protocol::messages::{FinalizeSequence, VerifySequence};
use crate::scheduler::client::{DraftClient, TargetClient};
use crate::session::{Session, SessionParams, SessionStatus};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of one verify round for one session.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub accept_count: u32,
    pub proposed: u32,
    pub forced_token: u32,
    pub finished: bool,
}

/// Final per-session output of a `generate` call.
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub session_id: String,
    pub tokens: Vec<u32>,
    pub status: SessionStatus,
    pub failure_message: Option<String>,
    pub acceptance_rate: f64,
}

pub struct Coordinator {
    draft: Arc<DraftClient>,
    target: Arc<TargetClient>,
    eos_token: u32,
    rng_seed: u64,
    sessions: Mutex<HashMap<String, Session>>,
    rngs: Mutex<HashMap<String, StdRng>>,
    next_id: AtomicU64,
}

impl Coordinator {
    pub fn new(draft: DraftClient, target: TargetClient, eos_token: u32, rng_seed: u64) -> Self {
        Self {
            draft: Arc::new(draft),
            target: Arc::new(target),
            eos_token,
            rng_seed,
            sessions: Mutex::new(HashMap::new()),
            rngs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub async fn start(&self, prompt_ids: Vec<u32>, params: SessionParams) -> Result<String> {
        let ordinal = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("sess-{ordinal}");

        self.draft.start_session(&session_id, prompt_ids.clone()).await?;
        self.target.start_session(&session_id, prompt_ids.clone()).await?;

        let seed = self.rng_seed.wrapping_add(ordinal);
        self.rngs.lock().await.insert(session_id.clone(), StdRng::seed_from_u64(seed));
        self.sessions
            .lock()
            .await
            .insert(session_id.clone(), Session::new(session_id.clone(), prompt_ids, params));
        Ok(session_id)
    }

    /// Run exactly one verify round across every currently active session.
    /// Sessions sharing a γ are batched into one `GenerateDraft` call; the
    /// verify and finalize RPCs are always batched across all sessions
    /// regardless of γ, since neither carries a γ parameter.
    pub async fn step_all(&self) -> Result<HashMap<String, RoundSummary>> {
        let active_ids: Vec<(String, u32)> = {
            let sessions = self.sessions.lock().await;
            sessions
                .values()
                .filter(|s| s.is_active())
                .map(|s| (s.session_id.clone(), s.params.gamma))
                .collect()
        };
        if active_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut by_gamma: HashMap<u32, Vec<String>> = HashMap::new();
        for (id, gamma) in &active_ids {
            by_gamma.entry(*gamma).or_default().push(id.clone());
        }

        let mut proposals: HashMap<String, (Vec<u32>, Vec<f32>)> = HashMap::new();
        for (gamma, ids) in by_gamma {
            match self.draft.generate_draft(ids.clone(), gamma).await {
                Ok(outputs) => {
                    for out in outputs {
                        proposals.insert(out.session_id, (out.tokens, out.probabilities));
                    }
                }
                Err(err) => {
                    self.fail_sessions(&ids, &err.to_string()).await;
                }
            }
        }

        let verify_sequences: Vec<VerifySequence> = proposals
            .iter()
            .map(|(sid, (tokens, _))| VerifySequence {
                session_id: sid.clone(),
                draft_tokens: tokens.clone(),
            })
            .collect();

        let verify_results = if verify_sequences.is_empty() {
            Vec::new()
        } else {
            match self.target.verify_batch(verify_sequences).await {
                Ok(results) => results,
                Err(err) => {
                    let ids: Vec<String> = proposals.keys().cloned().collect();
                    self.fail_sessions(&ids, &err.to_string()).await;
                    Vec::new()
                }
            }
        };
        let probs_by_session: HashMap<String, Vec<f32>> =
            verify_results.into_iter().map(|r| (r.session_id, r.target_probs)).collect();

        let mut summaries = HashMap::new();
        let mut finalize_sequences = Vec::new();
        let mut pending_commit: HashMap<String, (u32, u32, u32)> = HashMap::new(); // session -> (accept, proposed, forced)

        for (session_id, (tokens, q)) in &proposals {
            let Some(p) = probs_by_session.get(session_id) else {
                continue;
            };
            let outcome = match self.run_round_math(session_id, tokens, q, p).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.fail_sessions(std::slice::from_ref(session_id), &err.to_string()).await;
                    continue;
                }
            };

            let mut committed = tokens[..outcome.accept_count].to_vec();
            committed.push(outcome.forced_token);
            finalize_sequences.push(FinalizeSequence {
                session_id: session_id.clone(),
                tokens: committed,
                accept_count: outcome.accept_count as u32,
            });
            pending_commit.insert(
                session_id.clone(),
                (outcome.accept_count as u32, tokens.len() as u32, outcome.forced_token),
            );
        }

        let finalize_results = if finalize_sequences.is_empty() {
            Vec::new()
        } else {
            match self.target.finalize_batch(finalize_sequences).await {
                Ok(results) => results,
                Err(err) => {
                    let ids: Vec<String> = pending_commit.keys().cloned().collect();
                    self.fail_sessions(&ids, &err.to_string()).await;
                    Vec::new()
                }
            }
        };
        let finished_by_session: HashMap<String, bool> = finalize_results.into_iter().map(|r| (r.session_id, r.finished)).collect();

        for (session_id, (accept_count, proposed, forced_token)) in pending_commit {
            if let Err(err) = self
                .draft
                .update_draft_context(&session_id, accept_count, forced_token)
                .await
            {
                self.fail_sessions(std::slice::from_ref(&session_id), &err.to_string()).await;
                continue;
            }

            let mut sessions = self.sessions.lock().await;
            if let Some(session) = sessions.get_mut(&session_id) {
                let mut committed = proposals.get(&session_id).map(|(t, _)| t.clone()).unwrap_or_default();
                committed.truncate(accept_count as usize);
                committed.push(forced_token);
                session.commit(&committed, self.eos_token);
                session.counters.proposed += proposed as u64;
                session.counters.accepted += accept_count as u64;
                session.counters.forced += 1;
                session.counters.rounds += 1;
            }
            drop(sessions);

            let finished_flag = finished_by_session.get(&session_id).copied().unwrap_or(false);
            summaries.insert(
                session_id.clone(),
                RoundSummary {
                    accept_count,
                    proposed,
                    forced_token,
                    finished: finished_flag,
                },
            );
        }

        Ok(summaries)
    }

    /// Steps 2-4 of the round algorithm for a single session: run the
    /// acceptance walk, then draw the bonus token.
    async fn run_round_math(&self, session_id: &str, tokens: &[u32], q: &[f32], p: &[f32]) -> Result<BonusOutcome> {
        let mut rngs = self.rngs.lock().await;
        let rng = rngs
            .get_mut(session_id)
            .ok_or_else(|| CoordinatorError::SessionAbsent(session_id.to_string()))?;

        let walk = run_acceptance_walk(p, q, rng);
        let a = walk.accept_count;
        let l = tokens.len();

        let draft_distribution = if a < l {
            self.draft.get_draft_distribution(session_id, a as u32).await?
        } else {
            Vec::new()
        };
        let forced_token = self.target.generate_target_token(session_id, a as u32, draft_distribution).await?;

        Ok(BonusOutcome {
            accept_count: a,
            forced_token,
        })
    }

    async fn fail_sessions(&self, ids: &[String], message: &str) {
        let mut sessions = self.sessions.lock().await;
        for id in ids {
            if let Some(session) = sessions.get_mut(id) {
                session.fail(message.to_string());
            }
        }
    }

    /// Repeats `step_all` until every session is terminal.
    pub async fn generate(&self) -> Result<Vec<SessionOutput>> {
        loop {
            let any_active = {
                let sessions = self.sessions.lock().await;
                sessions.values().any(|s| s.is_active())
            };
            if !any_active {
                break;
            }
            self.step_all().await?;
        }

        let sessions = self.sessions.lock().await;
        Ok(sessions
            .values()
            .map(|s| SessionOutput {
                session_id: s.session_id.clone(),
                tokens: s.full_sequence(),
                status: s.status,
                failure_message: s.failure_message.clone(),
                acceptance_rate: s.counters.acceptance_rate(),
            })
            .collect())
    }

    /// Releases both workers' state for `session_id` (spec §4.1,
    /// "close(session_id). Releases both workers' state.").
    pub async fn close(&self, session_id: &str) {
        if let Err(err) = self.draft.close_session(session_id).await {
            tracing::warn!(%session_id, error = %err, "draft worker failed to close session");
        }
        if let Err(err) = self.target.close_session(session_id).await {
            tracing::warn!(%session_id, error = %err, "target worker failed to close session");
        }
        self.sessions.lock().await.remove(session_id);
        self.rngs.lock().await.remove(session_id);
    }
}

struct BonusOutcome {
    accept_count: usize,
    forced_token: u32,
}
