//! Target worker process entry point.

use clap::Parser;
use speculative_coordinator::model::ArithmeticModel;
use speculative_coordinator::protocol::serve;
use speculative_coordinator::target::{TargetHandler, TargetSamplingParams, TargetWorker};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "target-worker", version, about = "Speculative-decoding target worker")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:7002")]
    bind: String,

    #[arg(long, default_value_t = 32000)]
    vocab_size: usize,

    #[arg(long, default_value_t = 2)]
    eos_token: u32,

    #[arg(long, default_value_t = 1.0)]
    temperature: f32,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("speculative_coordinator=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let model = ArithmeticModel::new(cli.vocab_size, cli.eos_token);
    let sampling = TargetSamplingParams { temperature: cli.temperature };
    let handler = Arc::new(TargetHandler::new(TargetWorker::new(model, sampling)));

    if let Err(e) = serve(&cli.bind, handler).await {
        tracing::error!("target worker exited: {e}");
        std::process::exit(3);
    }
}
