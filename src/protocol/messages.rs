//! Wire message schemas shared by all three processes.
//!
//! Framing is NDJSON over a persistent TCP connection (see
//! [`transport`](super::transport)) rather than HTTP/2+protobuf: the spec
//! leaves framing open, and line-delimited JSON lets this crate reuse the
//! `tokio` + `serde_json` stack the teacher already depends on without
//! pulling in a `build.rs`/protoc step this exercise cannot verify by
//! building. The schemas themselves are fixed by the spec regardless of
//! framing.

use serde::{Deserialize, Serialize};

pub type SessionId = String;
pub type TokenId = u32;

// ---------------------------------------------------------------------
// Common
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadModelRequest {
    pub model_path: String,
    pub n_positions: u32,
    pub batch_size: u32,
    pub tp_degree: u32,
    pub amp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadModelResponse {
    pub success: bool,
    pub message: String,
    /// The model's real end-of-sequence token id, so the orchestrator never
    /// has to assume one. Reported back instead of left for the caller to
    /// configure separately, since the worker is the only process that
    /// actually holds the loaded model.
    pub eos_token: TokenId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub session_id: SessionId,
    pub input_ids: Vec<TokenId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: SessionId,
    pub success: bool,
    pub message: String,
}

/// Releases the named session's worker-side state (spec §4.1,
/// `close(session_id)`). Sent to both the draft and target worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSessionRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSessionResponse {
    pub success: bool,
    pub message: String,
}

// ---------------------------------------------------------------------
// Draft-only
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDraftRequest {
    pub session_ids: Vec<SessionId>,
    pub draft_length: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftOutput {
    pub session_id: SessionId,
    pub tokens: Vec<TokenId>,
    pub probabilities: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDraftResponse {
    pub outputs: Vec<DraftOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDraftContextRequest {
    pub session_id: SessionId,
    pub accepted_count: u32,
    pub new_token: TokenId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDraftContextResponse {
    pub success: bool,
    pub message: String,
}

/// Extension beyond the spec's literal RPC list: gives the orchestrator the
/// draft's full vocab-sized distribution `Q_a` at a given snapshot, needed
/// to compute the residual `max(P - Q, 0)` for the bonus token. Without it,
/// only the scalar `q_i` of the sampled token is ever observable, which is
/// not enough to renormalize a residual over the whole vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDraftDistributionRequest {
    pub session_id: SessionId,
    pub snapshot_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDraftDistributionResponse {
    pub distribution: Vec<f32>,
}

// ---------------------------------------------------------------------
// Target-only
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySequence {
    pub session_id: SessionId,
    pub draft_tokens: Vec<TokenId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyBatchRequest {
    pub sequences: Vec<VerifySequence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub session_id: SessionId,
    /// Per-token target probability for each proposed draft token, in
    /// order. This is the distribution-preserving shape the spec commits
    /// to (Open Question 1) — not a server-side greedy comparison.
    pub target_probs: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyBatchResponse {
    pub results: Vec<VerifyResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeSequence {
    pub session_id: SessionId,
    pub tokens: Vec<TokenId>,
    /// How many leading tokens of `tokens` were accepted draft tokens, as
    /// opposed to the trailing forced/bonus token. Lets the worker resume
    /// from its scratch region's matching step instead of replaying from
    /// scratch (pun intended) or misreusing the wrong prefix.
    pub accept_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeBatchRequest {
    pub sequences: Vec<FinalizeSequence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResult {
    pub session_id: SessionId,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeBatchResponse {
    pub results: Vec<FinalizeResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckTokenRequest {
    pub session_id: SessionId,
    pub token_id: TokenId,
    pub position_offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckTokenResponse {
    pub probability: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendTokenRequest {
    pub session_id: SessionId,
    pub token_id: TokenId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendTokenResponse {
    pub success: bool,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateTargetRequest {
    pub session_id: SessionId,
    /// Number of draft tokens the acceptance walk accepted this round; the
    /// bonus token is drawn from the target's distribution at this
    /// position, not the round's starting distribution.
    pub accept_count: u32,
    /// Empty when the full-acceptance path applies (free sample); populated
    /// with the draft's distribution `Q_a` on the partial-acceptance path.
    pub draft_distribution: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateTargetResponse {
    pub token_id: TokenId,
}

// ---------------------------------------------------------------------
// Dispatch envelope
// ---------------------------------------------------------------------

/// Tagged union of every request shape, one NDJSON line per call. The
/// server side matches on `method` and deserializes `params` accordingly;
/// see [`transport`](super::transport).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Request {
    LoadModel(LoadModelRequest),
    StartSession(StartSessionRequest),
    CloseSession(CloseSessionRequest),
    GenerateDraft(GenerateDraftRequest),
    UpdateDraftContext(UpdateDraftContextRequest),
    GetDraftDistribution(GetDraftDistributionRequest),
    VerifyBatchTokens(VerifyBatchRequest),
    FinalizeBatchTokens(FinalizeBatchRequest),
    CheckTokenProbability(CheckTokenRequest),
    AppendToken(AppendTokenRequest),
    GenerateTargetToken(GenerateTargetRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", content = "body")]
pub enum Response {
    Ok(ResponseBody),
    Err { message: String },
}

/// Tagged the same way as [`Request`] (an explicit discriminant, not
/// `#[serde(untagged)]`): several response bodies share an identical field
/// shape (`LoadModelResponse` and `UpdateDraftContextResponse` are both
/// just `{success, message}`-with-extras at different times), so an
/// untagged enum would let serde match the first structurally-compatible
/// variant instead of the one the handler actually returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResponseBody {
    LoadModel(LoadModelResponse),
    StartSession(StartSessionResponse),
    CloseSession(CloseSessionResponse),
    GenerateDraft(GenerateDraftResponse),
    UpdateDraftContext(UpdateDraftContextResponse),
    GetDraftDistribution(GetDraftDistributionResponse),
    VerifyBatchTokens(VerifyBatchResponse),
    FinalizeBatchTokens(FinalizeBatchResponse),
    CheckTokenProbability(CheckTokenResponse),
    AppendToken(AppendTokenResponse),
    GenerateTargetToken(GenerateTargetResponse),
}
