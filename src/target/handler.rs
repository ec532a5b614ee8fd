//! Wraps a [`TargetWorker`] as a [`RequestHandler`], mirroring
//! [`crate::draft::handler::DraftHandler`].

use crate::model::{LanguageModel, ModelConfig};
use crate::protocol::messages::*;
use crate::protocol::{Request, RequestHandler, ResponseBody};
use crate::target::worker::TargetWorker;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct TargetHandler<M: LanguageModel> {
    worker: TargetWorker<M>,
    rng_seed: AtomicU64,
}

impl<M: LanguageModel> TargetHandler<M> {
    pub fn new(worker: TargetWorker<M>) -> Self {
        Self {
            worker,
            rng_seed: AtomicU64::new(0),
        }
    }
}

#[async_trait::async_trait]
impl<M: LanguageModel> RequestHandler for TargetHandler<M> {
    async fn handle(&self, request: Request) -> std::result::Result<ResponseBody, String> {
        match request {
            Request::LoadModel(req) => {
                let config = ModelConfig {
                    model_path: req.model_path,
                    n_positions: req.n_positions,
                    batch_size: req.batch_size,
                    tp_degree: req.tp_degree,
                    amp: req.amp,
                };
                match self.worker.load_model(config).await {
                    Ok(()) => Ok(ResponseBody::LoadModel(LoadModelResponse {
                        success: true,
                        message: "ok".into(),
                        eos_token: self.worker.eos_token(),
                    })),
                    Err(e) => Err(e.to_string()),
                }
            }
            Request::StartSession(req) => match self.worker.start_session(req.session_id.clone(), req.input_ids).await {
                Ok(()) => Ok(ResponseBody::StartSession(StartSessionResponse {
                    session_id: req.session_id,
                    success: true,
                    message: "ok".into(),
                })),
                Err(e) => Err(e.to_string()),
            },
            Request::CloseSession(req) => {
                self.worker.close_session(&req.session_id).await;
                Ok(ResponseBody::CloseSession(CloseSessionResponse {
                    success: true,
                    message: "ok".into(),
                }))
            }
            Request::VerifyBatchTokens(req) => {
                let mut results = Vec::with_capacity(req.sequences.len());
                for seq in req.sequences {
                    match self.worker.verify_batch(&seq.session_id, &seq.draft_tokens).await {
                        Ok(target_probs) => results.push(VerifyResult {
                            session_id: seq.session_id,
                            target_probs,
                        }),
                        Err(e) => return Err(e.to_string()),
                    }
                }
                Ok(ResponseBody::VerifyBatchTokens(VerifyBatchResponse { results }))
            }
            Request::FinalizeBatchTokens(req) => {
                let mut results = Vec::with_capacity(req.sequences.len());
                for seq in req.sequences {
                    match self.worker.finalize_batch(&seq.session_id, &seq.tokens, seq.accept_count as usize).await {
                        Ok(finished) => results.push(FinalizeResult {
                            session_id: seq.session_id,
                            finished,
                        }),
                        Err(e) => return Err(e.to_string()),
                    }
                }
                Ok(ResponseBody::FinalizeBatchTokens(FinalizeBatchResponse { results }))
            }
            Request::CheckTokenProbability(req) => match self.worker.check_token_probability(&req.session_id, req.token_id).await {
                Ok(probability) => Ok(ResponseBody::CheckTokenProbability(CheckTokenResponse { probability })),
                Err(e) => Err(e.to_string()),
            },
            Request::AppendToken(req) => match self.worker.append_token(&req.session_id, req.token_id).await {
                Ok(finished) => Ok(ResponseBody::AppendToken(AppendTokenResponse { success: true, finished })),
                Err(e) => Err(e.to_string()),
            },
            Request::GenerateTargetToken(req) => {
                let seed = self.rng_seed.fetch_add(1, Ordering::SeqCst);
                let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                match self
                    .worker
                    .generate_target_token(&req.session_id, req.accept_count as usize, &req.draft_distribution, &mut rng)
                    .await
                {
                    Ok(token_id) => Ok(ResponseBody::GenerateTargetToken(GenerateTargetResponse { token_id })),
                    Err(e) => Err(e.to_string()),
                }
            }
            other => Err(format!("target worker does not serve {other:?}")),
        }
    }
}
