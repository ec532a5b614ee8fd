//! Orchestrator-side session bookkeeping: one record per active
//! speculative-decoding session, owned exclusively by its scheduler task.

use serde::{Deserialize, Serialize};

/// Parameters fixed for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParams {
    pub gamma: u32,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            gamma: 4,
            max_new_tokens: 50,
            temperature: 1.0,
            top_p: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Finished,
    Failed,
}

/// Round-over-round counters, reported in the final output and used for
/// profiling sidecars (`token_match_rate` in particular).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionCounters {
    pub proposed: u64,
    pub accepted: u64,
    pub forced: u64,
    pub rounds: u64,
}

impl SessionCounters {
    /// Empirical acceptance rate `a / gamma` averaged over rounds, the
    /// quantity invariant 4 says converges to `sum(min(p_t, q_t))`.
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

/// A paired draft/target session plus its generation progress. Owned and
/// mutated only by the scheduler task driving it (spec invariant: orchestrator
/// never shares KV-cache references, only identifiers).
pub struct Session {
    pub session_id: String,
    pub prompt: Vec<u32>,
    pub generated: Vec<u32>,
    pub params: SessionParams,
    pub status: SessionStatus,
    pub counters: SessionCounters,
    pub failure_message: Option<String>,
}

impl Session {
    pub fn new(session_id: String, prompt: Vec<u32>, params: SessionParams) -> Self {
        Self {
            session_id,
            prompt,
            generated: Vec::new(),
            params,
            status: SessionStatus::Active,
            counters: SessionCounters::default(),
            failure_message: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn remaining_budget(&self) -> u32 {
        self.params.max_new_tokens.saturating_sub(self.generated.len() as u32)
    }

    /// Append newly committed tokens, truncating to `max_new_tokens` and
    /// marking finished on EOS or cutoff (spec §8, "max-tokens cutoff").
    pub fn commit(&mut self, tokens: &[u32], eos_token: u32) {
        let budget = self.remaining_budget() as usize;
        let take = tokens.len().min(budget);
        self.generated.extend_from_slice(&tokens[..take]);

        if tokens[..take].iter().any(|&t| t == eos_token) || self.generated.len() as u32 >= self.params.max_new_tokens {
            self.status = SessionStatus::Finished;
        }
    }

    pub fn fail(&mut self, message: String) {
        self.status = SessionStatus::Failed;
        self.failure_message = Some(message);
    }

    /// `prompt ++ generated`, per the user-visible output contract.
    pub fn full_sequence(&self) -> Vec<u32> {
        let mut out = self.prompt.clone();
        out.extend_from_slice(&self.generated);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_truncates_at_max_new_tokens() {
        let mut session = Session::new(
            "s1".into(),
            vec![1, 2, 3],
            SessionParams {
                gamma: 4,
                max_new_tokens: 3,
                temperature: 1.0,
                top_p: 1.0,
            },
        );
        session.commit(&[4, 5, 6, 7], 999);
        assert_eq!(session.generated, vec![4, 5, 6]);
        assert_eq!(session.status, SessionStatus::Finished);
    }

    #[test]
    fn commit_marks_finished_on_eos() {
        let mut session = Session::new(
            "s1".into(),
            vec![1],
            SessionParams {
                gamma: 4,
                max_new_tokens: 50,
                temperature: 1.0,
                top_p: 1.0,
            },
        );
        session.commit(&[4, 99], 99);
        assert_eq!(session.status, SessionStatus::Finished);
        assert_eq!(session.generated, vec![4, 99]);
    }
}
