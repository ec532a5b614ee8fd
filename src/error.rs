//! Error taxonomy for the speculative-decoding coordinator.
//!
//! Mirrors the teacher's `ExsaError` in shape (a flat `thiserror` enum with a
//! `Result` alias) but drops the `axum::IntoResponse` impl: this core has no
//! HTTP surface.

use thiserror::Error;

/// Error taxonomy shared by the orchestrator and both workers.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Worker could not instantiate its model. Fatal at startup.
    #[error("load failure: {0}")]
    LoadFailure(String),

    /// An RPC referenced a session id the worker has no record of.
    #[error("session absent: {0}")]
    SessionAbsent(String),

    /// The RPC sequence violated the session state machine (e.g. a missing
    /// snapshot slot, `UpdateDraftContext` called outside `Proposed`).
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// A forward pass or transport call failed mid-round. The session is no
    /// longer trustworthy and is terminated, not retried.
    #[error("worker fault: {0}")]
    WorkerFault(String),

    /// The session already finished normally; further rounds are a no-op.
    #[error("session {0} already terminated")]
    Terminated(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Process exit codes for the orchestrator CLI, per the documented surface:
/// 0 success, 1 invalid args, 2 model load failure, 3 worker RPC failure.
impl CoordinatorError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CoordinatorError::InvalidParameters(_) => 1,
            CoordinatorError::LoadFailure(_) => 2,
            CoordinatorError::SessionAbsent(_)
            | CoordinatorError::ProtocolError(_)
            | CoordinatorError::WorkerFault(_)
            | CoordinatorError::Timeout(_)
            | CoordinatorError::Io(_)
            | CoordinatorError::Serde(_) => 3,
            CoordinatorError::Terminated(_) => 0,
        }
    }
}
