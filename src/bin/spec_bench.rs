//! Profiling utility: drives a handful of sessions through a running
//! draft/target worker pair and reports the CSV/JSON sidecar columns.
//!
//! Usage: cargo run --release --bin spec-bench

use speculative_coordinator::model::ModelConfig;
use speculative_coordinator::scheduler::client::{DraftClient, TargetClient};
use speculative_coordinator::session::SessionParams;
use speculative_coordinator::Coordinator;
use std::time::Instant;

#[tokio::main]
async fn main() {
    println!("=== Speculative-Decoding Coordinator Bench ===\n");

    let draft_addr = std::env::var("SPEC_BENCH_DRAFT_SERVER").unwrap_or_else(|_| "127.0.0.1:7001".to_string());
    let target_addr = std::env::var("SPEC_BENCH_TARGET_SERVER").unwrap_or_else(|_| "127.0.0.1:7002".to_string());
    let num_sessions: usize = std::env::var("SPEC_BENCH_SESSIONS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);
    let gamma: u32 = std::env::var("SPEC_BENCH_GAMMA").ok().and_then(|s| s.parse().ok()).unwrap_or(4);
    let max_new_tokens: u32 = std::env::var("SPEC_BENCH_MAX_NEW_TOKENS").ok().and_then(|s| s.parse().ok()).unwrap_or(32);

    println!("draft server:  {draft_addr}");
    println!("target server: {target_addr}");
    println!("sessions: {num_sessions}, gamma: {gamma}, max_new_tokens: {max_new_tokens}\n");

    let draft = match DraftClient::connect(&draft_addr).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to connect to draft worker: {e}");
            std::process::exit(1);
        }
    };
    let target = match TargetClient::connect(&target_addr).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to connect to target worker: {e}");
            std::process::exit(1);
        }
    };

    let model_config = ModelConfig::new("bench-arithmetic-model");
    if let Err(e) = draft.load_model(&model_config).await {
        eprintln!("draft load_model failed: {e}");
        std::process::exit(1);
    }
    let eos_token = match target.load_model(&model_config).await {
        Ok(eos_token) => eos_token,
        Err(e) => {
            eprintln!("target load_model failed: {e}");
            std::process::exit(1);
        }
    };

    let coordinator = Coordinator::new(draft, target, eos_token, 42);
    let params = SessionParams {
        gamma,
        max_new_tokens,
        temperature: 1.0,
        top_p: 1.0,
    };

    let start = Instant::now();
    for i in 0..num_sessions {
        let prompt = vec![1u32, 2, 3].iter().map(|t| t + i as u32).collect();
        if let Err(e) = coordinator.start(prompt, params.clone()).await {
            eprintln!("failed to start session {i}: {e}");
            std::process::exit(1);
        }
    }

    let outputs = match coordinator.generate().await {
        Ok(outputs) => outputs,
        Err(e) => {
            eprintln!("generate failed: {e}");
            std::process::exit(1);
        }
    };
    let elapsed = start.elapsed();

    let total_tokens: usize = outputs.iter().map(|o| o.tokens.len()).sum();
    let throughput = total_tokens as f64 / elapsed.as_secs_f64();
    let avg_match_rate: f64 = if outputs.is_empty() {
        0.0
    } else {
        outputs.iter().map(|o| o.acceptance_rate).sum::<f64>() / outputs.len() as f64
    };
    let avg_token_time = elapsed.as_secs_f64() * 1000.0 / total_tokens.max(1) as f64;

    println!("{}", speculative_coordinator::metrics::ProfileSnapshot::csv_header());
    println!(
        "{},{},{},{},{}",
        elapsed.as_secs_f64(),
        total_tokens,
        throughput,
        avg_token_time,
        avg_match_rate
    );
}
