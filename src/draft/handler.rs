//! Wraps a [`DraftWorker`] as a [`RequestHandler`], so both the
//! `draft-worker` binary and in-process tests drive the exact same dispatch
//! path instead of duplicating the `Request` match arms.

use crate::draft::worker::DraftWorker;
use crate::model::{LanguageModel, ModelConfig};
use crate::protocol::messages::*;
use crate::protocol::{Request, RequestHandler, ResponseBody};
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct DraftHandler<M: LanguageModel> {
    worker: DraftWorker<M>,
    rng_seed: AtomicU64,
}

impl<M: LanguageModel> DraftHandler<M> {
    pub fn new(worker: DraftWorker<M>) -> Self {
        Self {
            worker,
            rng_seed: AtomicU64::new(0),
        }
    }
}

#[async_trait::async_trait]
impl<M: LanguageModel> RequestHandler for DraftHandler<M> {
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
            Request::GenerateDraft(req) => {
                let mut outputs = Vec::with_capacity(req.session_ids.len());
                for session_id in req.session_ids {
                    let seed = self.rng_seed.fetch_add(1, Ordering::SeqCst);
                    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                    match self.worker.generate_draft(&session_id, req.draft_length, &mut rng).await {
                        Ok((tokens, probabilities)) => outputs.push(DraftOutput {
                            session_id,
                            tokens,
                            probabilities,
                        }),
                        Err(e) => return Err(e.to_string()),
                    }
                }
                Ok(ResponseBody::GenerateDraft(GenerateDraftResponse { outputs }))
            }
            Request::GetDraftDistribution(req) => match self.worker.draft_distribution(&req.session_id, req.snapshot_index as usize).await {
                Ok(distribution) => Ok(ResponseBody::GetDraftDistribution(GetDraftDistributionResponse { distribution })),
                Err(e) => Err(e.to_string()),
            },
            Request::UpdateDraftContext(req) => {
                let new_token = if req.new_token == 0 { None } else { Some(req.new_token) };
                match self.worker.update_draft_context(&req.session_id, req.accepted_count as usize, new_token).await {
                    Ok(()) => Ok(ResponseBody::UpdateDraftContext(UpdateDraftContextResponse {
                        success: true,
                        message: "ok".into(),
                    })),
                    Err(e) => Err(e.to_string()),
                }
            }
            other => Err(format!("draft worker does not serve {other:?}")),
        }
    }
}
