//! Model load configuration, matching the `LoadModelRequest` wire schema.

use serde::{Deserialize, Serialize};

/// Configuration carried by `LoadModelRequest`. `LoadModel` is idempotent
/// within a worker process: a second call with a differing signature is
/// rejected rather than re-instantiating the model (see `draft::worker` and
/// `target::worker`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Path to the model weights (GGUF or equivalent).
    pub model_path: String,
    /// Maximum context length in positions.
    pub n_positions: u32,
    /// Batch size used for prompt prefill.
    pub batch_size: u32,
    /// Tensor-parallel degree across accelerator cores.
    pub tp_degree: u32,
    /// Whether automatic mixed precision is enabled.
    pub amp: bool,
}

impl ModelConfig {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            n_positions: 128,
            batch_size: 1,
            tp_degree: 1,
            amp: false,
        }
    }

    /// Same signature as another config, per `LoadModel`'s idempotency rule:
    /// a worker accepts a repeated `LoadModel` call only if nothing changed.
    pub fn same_signature(&self, other: &ModelConfig) -> bool {
        self == other
    }
}
