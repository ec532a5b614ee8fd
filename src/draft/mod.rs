pub mod context;
pub mod handler;
pub mod worker;

pub use context::{DraftCtx, SnapshotStack};
pub use handler::DraftHandler;
pub use worker::{DraftSamplingParams, DraftWorker};
