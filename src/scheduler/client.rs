//! Typed wrappers over the raw NDJSON transport, one per worker role.

use crate::error::{CoordinatorError, Result};
use crate::model::ModelConfig;
use crate::protocol::messages::*;
use crate::protocol::{Request, ResponseBody, RpcClient};

fn expect<T>(body: ResponseBody, extract: impl FnOnce(ResponseBody) -> Option<T>) -> Result<T> {
    extract(body).ok_or_else(|| CoordinatorError::ProtocolError("unexpected response shape".into()))
}

pub struct DraftClient {
    rpc: RpcClient,
}

impl DraftClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::connect(addr).await?,
        })
    }

    pub async fn load_model(&self, config: &ModelConfig) -> Result<TokenId> {
        let body = self
            .rpc
            .call(Request::LoadModel(LoadModelRequest {
                model_path: config.model_path.clone(),
                n_positions: config.n_positions,
                batch_size: config.batch_size,
                tp_degree: config.tp_degree,
                amp: config.amp,
            }))
            .await?;
        let resp = expect(body, |b| match b {
            ResponseBody::LoadModel(r) => Some(r),
            _ => None,
        })?;
        if resp.success {
            Ok(resp.eos_token)
        } else {
            Err(CoordinatorError::LoadFailure(resp.message))
        }
    }

    pub async fn start_session(&self, session_id: &str, input_ids: Vec<u32>) -> Result<()> {
        let body = self
            .rpc
            .call(Request::StartSession(StartSessionRequest {
                session_id: session_id.to_string(),
                input_ids,
            }))
            .await?;
        let resp = expect(body, |b| match b {
            ResponseBody::StartSession(r) => Some(r),
            _ => None,
        })?;
        if resp.success {
            Ok(())
        } else {
            Err(CoordinatorError::WorkerFault(resp.message))
        }
    }

    pub async fn close_session(&self, session_id: &str) -> Result<()> {
        let body = self
            .rpc
            .call(Request::CloseSession(CloseSessionRequest {
                session_id: session_id.to_string(),
            }))
            .await?;
        let resp = expect(body, |b| match b {
            ResponseBody::CloseSession(r) => Some(r),
            _ => None,
        })?;
        if resp.success {
            Ok(())
        } else {
            Err(CoordinatorError::WorkerFault(resp.message))
        }
    }

    pub async fn generate_draft(&self, session_ids: Vec<String>, draft_length: u32) -> Result<Vec<DraftOutput>> {
        let body = self
            .rpc
            .call(Request::GenerateDraft(GenerateDraftRequest {
                session_ids,
                draft_length,
            }))
            .await?;
        let resp = expect(body, |b| match b {
            ResponseBody::GenerateDraft(r) => Some(r),
            _ => None,
        })?;
        Ok(resp.outputs)
    }

    pub async fn get_draft_distribution(&self, session_id: &str, snapshot_index: u32) -> Result<Vec<f32>> {
        let body = self
            .rpc
            .call(Request::GetDraftDistribution(GetDraftDistributionRequest {
                session_id: session_id.to_string(),
                snapshot_index,
            }))
            .await?;
        let resp = expect(body, |b| match b {
            ResponseBody::GetDraftDistribution(r) => Some(r),
            _ => None,
        })?;
        Ok(resp.distribution)
    }

    pub async fn update_draft_context(&self, session_id: &str, accepted_count: u32, new_token: u32) -> Result<()> {
        let body = self
            .rpc
            .call(Request::UpdateDraftContext(UpdateDraftContextRequest {
                session_id: session_id.to_string(),
                accepted_count,
                new_token,
            }))
            .await?;
        let resp = expect(body, |b| match b {
            ResponseBody::UpdateDraftContext(r) => Some(r),
            _ => None,
        })?;
        if resp.success {
            Ok(())
        } else {
            Err(CoordinatorError::WorkerFault(resp.message))
        }
    }
}

pub struct TargetClient {
    rpc: RpcClient,
}

impl TargetClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::connect(addr).await?,
        })
    }

    pub async fn load_model(&self, config: &ModelConfig) -> Result<TokenId> {
        let body = self
            .rpc
            .call(Request::LoadModel(LoadModelRequest {
                model_path: config.model_path.clone(),
                n_positions: config.n_positions,
                batch_size: config.batch_size,
                tp_degree: config.tp_degree,
                amp: config.amp,
            }))
            .await?;
        let resp = expect(body, |b| match b {
            ResponseBody::LoadModel(r) => Some(r),
            _ => None,
        })?;
        if resp.success {
            Ok(resp.eos_token)
        } else {
            Err(CoordinatorError::LoadFailure(resp.message))
        }
    }

    pub async fn start_session(&self, session_id: &str, input_ids: Vec<u32>) -> Result<()> {
        let body = self
            .rpc
            .call(Request::StartSession(StartSessionRequest {
                session_id: session_id.to_string(),
                input_ids,
            }))
            .await?;
        let resp = expect(body, |b| match b {
            ResponseBody::StartSession(r) => Some(r),
            _ => None,
        })?;
        if resp.success {
            Ok(())
        } else {
            Err(CoordinatorError::WorkerFault(resp.message))
        }
    }

    pub async fn close_session(&self, session_id: &str) -> Result<()> {
        let body = self
            .rpc
            .call(Request::CloseSession(CloseSessionRequest {
                session_id: session_id.to_string(),
            }))
            .await?;
        let resp = expect(body, |b| match b {
            ResponseBody::CloseSession(r) => Some(r),
            _ => None,
        })?;
        if resp.success {
            Ok(())
        } else {
            Err(CoordinatorError::WorkerFault(resp.message))
        }
    }

    pub async fn verify_batch(&self, sequences: Vec<VerifySequence>) -> Result<Vec<VerifyResult>> {
        let body = self.rpc.call(Request::VerifyBatchTokens(VerifyBatchRequest { sequences })).await?;
        let resp = expect(body, |b| match b {
            ResponseBody::VerifyBatchTokens(r) => Some(r),
            _ => None,
        })?;
        Ok(resp.results)
    }

    pub async fn finalize_batch(&self, sequences: Vec<FinalizeSequence>) -> Result<Vec<FinalizeResult>> {
        let body = self.rpc.call(Request::FinalizeBatchTokens(FinalizeBatchRequest { sequences })).await?;
        let resp = expect(body, |b| match b {
            ResponseBody::FinalizeBatchTokens(r) => Some(r),
            _ => None,
        })?;
        Ok(resp.results)
    }

    pub async fn generate_target_token(&self, session_id: &str, accept_count: u32, draft_distribution: Vec<f32>) -> Result<u32> {
        let body = self
            .rpc
            .call(Request::GenerateTargetToken(GenerateTargetRequest {
                session_id: session_id.to_string(),
                accept_count,
                draft_distribution,
            }))
            .await?;
        let resp = expect(body, |b| match b {
            ResponseBody::GenerateTargetToken(r) => Some(r),
            _ => None,
        })?;
        Ok(resp.token_id)
    }
}
