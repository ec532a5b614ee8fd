//! Draft worker process entry point.

use clap::Parser;
use speculative_coordinator::draft::{DraftHandler, DraftSamplingParams, DraftWorker};
use speculative_coordinator::model::ArithmeticModel;
use speculative_coordinator::protocol::serve;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "draft-worker", version, about = "Speculative-decoding draft worker")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:7001")]
    bind: String,

    #[arg(long, default_value_t = 32000)]
    vocab_size: usize,

    #[arg(long, default_value_t = 2)]
    eos_token: u32,

    #[arg(long, default_value_t = 0.9)]
    top_p: f32,

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
    let sampling = DraftSamplingParams {
        temperature: cli.temperature,
        top_p: cli.top_p,
    };
    let handler = Arc::new(DraftHandler::new(DraftWorker::new(model, sampling)));

    if let Err(e) = serve(&cli.bind, handler).await {
        tracing::error!("draft worker exited: {e}");
        std::process::exit(3);
    }
}
