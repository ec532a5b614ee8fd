pub mod capability;
pub mod config;
pub mod mock;

#[cfg(feature = "cpu")]
pub mod llama_adapter;

pub use capability::{LanguageModel, Logits, TokenId};
pub use config::ModelConfig;
pub use mock::ArithmeticModel;
