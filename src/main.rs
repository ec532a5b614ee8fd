//! Speculative-decoding orchestrator: drives sessions against a draft and
//! a target worker process until every prompt finishes.

use clap::Parser;
use speculative_coordinator::config::CoordinatorConfig;
use speculative_coordinator::metrics::create_metrics;
use speculative_coordinator::model::ModelConfig;
use speculative_coordinator::scheduler::client::{DraftClient, TargetClient};
use speculative_coordinator::session::SessionParams;
use speculative_coordinator::tokenizer::{Tokenizer, WhitespaceTokenizer};
use speculative_coordinator::{Coordinator, CoordinatorError};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "coordinator", version, about = "Speculative-decoding orchestrator")]
struct Cli {
    #[arg(long)]
    draft_model: String,

    #[arg(long)]
    target_model: String,

    #[arg(long, default_value = "127.0.0.1:7001")]
    draft_server: String,

    #[arg(long, default_value = "127.0.0.1:7002")]
    target_server: String,

    #[arg(long, default_value_t = 4)]
    gamma: u32,

    #[arg(long, default_value_t = 50)]
    max_new_tokens: u32,

    #[arg(long)]
    prompt_text: Option<String>,

    #[arg(long)]
    prompt_file: Option<String>,

    #[arg(long, default_value_t = 128)]
    sequence_length: u32,

    #[arg(long, default_value_t = 0.9)]
    top_p: f32,

    #[arg(long, default_value_t = 1.0)]
    temperature: f32,

    #[arg(long, default_value_t = false)]
    profile: bool,
}

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(env_filter_default())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = CoordinatorConfig::load();
    config.scheduling.gamma = cli.gamma;
    config.scheduling.max_new_tokens = cli.max_new_tokens;
    config.scheduling.temperature = cli.temperature;
    config.scheduling.top_p = cli.top_p;
    config.workers.draft_server = cli.draft_server.clone();
    config.workers.target_server = cli.target_server.clone();

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("invalid configuration: {e}");
        }
        return 1;
    }

    let prompt_text = match (&cli.prompt_text, &cli.prompt_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                error!("failed to read prompt file {path}: {e}");
                return 1;
            }
        },
        (None, None) => {
            error!("one of --prompt_text or --prompt_file is required");
            return 1;
        }
    };

    let tokenizer = WhitespaceTokenizer::new();
    let prompt_ids = tokenizer.encode(&prompt_text);
    if prompt_ids.len() as u32 > cli.sequence_length {
        error!("prompt exceeds --sequence_length");
        return 1;
    }

    info!(draft = %cli.draft_server, target = %cli.target_server, gamma = cli.gamma, "connecting to workers");

    let draft = match DraftClient::connect(&cli.draft_server).await {
        Ok(c) => c,
        Err(e) => {
            error!("failed to connect to draft worker: {e}");
            return 3;
        }
    };
    let target = match TargetClient::connect(&cli.target_server).await {
        Ok(c) => c,
        Err(e) => {
            error!("failed to connect to target worker: {e}");
            return 3;
        }
    };

    let draft_config = ModelConfig {
        model_path: cli.draft_model.clone(),
        n_positions: cli.sequence_length,
        batch_size: 1,
        tp_degree: 1,
        amp: false,
    };
    let target_config = ModelConfig {
        model_path: cli.target_model.clone(),
        n_positions: cli.sequence_length,
        batch_size: 1,
        tp_degree: 1,
        amp: false,
    };

    if let Err(e) = draft.load_model(&draft_config).await {
        error!("draft worker failed to load model: {e}");
        return load_exit_code(&e);
    }
    let eos_token = match target.load_model(&target_config).await {
        Ok(eos_token) => eos_token,
        Err(e) => {
            error!("target worker failed to load model: {e}");
            return load_exit_code(&e);
        }
    };

    let coordinator = Coordinator::new(draft, target, eos_token, config.scheduling.rng_seed);

    let params = SessionParams {
        gamma: cli.gamma,
        max_new_tokens: cli.max_new_tokens,
        temperature: cli.temperature,
        top_p: cli.top_p,
    };

    let session_id = match coordinator.start(prompt_ids, params).await {
        Ok(id) => id,
        Err(e) => {
            error!("failed to start session: {e}");
            return 3;
        }
    };
    info!(%session_id, "session started");

    let metrics = create_metrics();
    let outputs = match coordinator.generate().await {
        Ok(outputs) => outputs,
        Err(e) => {
            error!("generation failed: {e}");
            return 3;
        }
    };

    for output in &outputs {
        let text = tokenizer.decode(&output.tokens);
        info!(session_id = %output.session_id, status = ?output.status, acceptance_rate = output.acceptance_rate, "session complete");
        println!("{text}");
        if let Some(message) = &output.failure_message {
            error!(session_id = %output.session_id, "session failed: {message}");
        }
    }

    if cli.profile {
        let snapshot = metrics.snapshot();
        if let Ok(json) = snapshot.to_json() {
            println!("{json}");
        }
    }

    if outputs.iter().any(|o| o.failure_message.is_some()) {
        3
    } else {
        0
    }
}

fn load_exit_code(_err: &CoordinatorError) -> i32 {
    2
}

fn env_filter_default() -> String {
    std::env::var("SPEC_COORD_LOG").unwrap_or_else(|_| "speculative_coordinator=info".to_string())
}
