//! Shared end-to-end test harness: spins up real draft/target worker
//! processes in-process over loopback TCP, so these tests exercise the
//! actual NDJSON wire protocol rather than calling workers directly.
//!
//! Not a test binary itself — `tests/common/mod.rs` is outside Cargo's
//! flat `tests/*.rs` auto-discovery, so it only exists as a module each
//! scenario file pulls in with `mod common;`.

use speculative_coordinator::draft::{DraftHandler, DraftSamplingParams, DraftWorker};
use speculative_coordinator::model::{ArithmeticModel, ModelConfig};
use speculative_coordinator::protocol::{serve_listener, RequestHandler};
use speculative_coordinator::scheduler::client::{DraftClient, TargetClient};
use speculative_coordinator::target::{TargetHandler, TargetSamplingParams, TargetWorker};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Binds an ephemeral port, spawns the accept loop in the background, and
/// returns the address it landed on. The listener task is detached; it dies
/// with the test process.
async fn spawn<H: RequestHandler + 'static>(handler: Arc<H>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr").to_string();
    tokio::spawn(async move {
        let _ = serve_listener(listener, handler).await;
    });
    addr
}

/// A running draft+target worker pair, deterministic and greedy
/// (`temperature = 0.0`, `top_p = 1.0`) unless the caller's models say
/// otherwise, plus connected clients ready for `Coordinator::new`.
pub struct WorkerPair {
    pub draft: DraftClient,
    pub target: TargetClient,
}

pub async fn spawn_workers(draft_model: ArithmeticModel, target_model: ArithmeticModel) -> WorkerPair {
    spawn_workers_with_sampling(
        draft_model,
        DraftSamplingParams {
            temperature: 0.0,
            top_p: 1.0,
        },
        target_model,
        TargetSamplingParams { temperature: 0.0 },
    )
    .await
}

pub async fn spawn_workers_with_sampling(
    draft_model: ArithmeticModel,
    draft_sampling: DraftSamplingParams,
    target_model: ArithmeticModel,
    target_sampling: TargetSamplingParams,
) -> WorkerPair {
    let draft_handler = Arc::new(DraftHandler::new(DraftWorker::new(draft_model, draft_sampling)));
    let target_handler = Arc::new(TargetHandler::new(TargetWorker::new(target_model, target_sampling)));

    let draft_addr = spawn(draft_handler).await;
    let target_addr = spawn(target_handler).await;

    let draft = DraftClient::connect(&draft_addr).await.expect("connect draft client");
    let target = TargetClient::connect(&target_addr).await.expect("connect target client");

    let config = ModelConfig::new("test-arithmetic-model");
    draft.load_model(&config).await.expect("draft load_model");
    target.load_model(&config).await.expect("target load_model");

    WorkerPair { draft, target }
}
