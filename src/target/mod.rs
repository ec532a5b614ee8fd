pub mod context;
pub mod handler;
pub mod worker;

pub use context::TargetCtx;
pub use handler::TargetHandler;
pub use worker::{TargetSamplingParams, TargetWorker};
