//! End-to-end scenarios driven over the real NDJSON wire protocol: a
//! `Coordinator` talking to in-process draft/target worker servers.
//!
//! Every scenario pins `temperature = 0.0` on both workers, which collapses
//! sampling to deterministic argmax (see `sampling::softmax`), and uses
//! `ArithmeticModel`'s closed-form successor function (with targeted
//! `with_override`s) to script exact agreement or disagreement between the
//! draft and target model without any real weights.

mod common;

use common::{spawn_workers, WorkerPair};
use speculative_coordinator::model::ArithmeticModel;
use speculative_coordinator::session::{SessionParams, SessionStatus};
use speculative_coordinator::Coordinator;

fn params(gamma: u32, max_new_tokens: u32) -> SessionParams {
    SessionParams {
        gamma,
        max_new_tokens,
        temperature: 0.0,
        top_p: 1.0,
    }
}

#[tokio::test]
async fn greedy_equivalence_accepts_every_round() {
    let WorkerPair { draft, target } = spawn_workers(ArithmeticModel::new(100, 99), ArithmeticModel::new(100, 99)).await;
    let coordinator = Coordinator::new(draft, target, 99, 7);

    coordinator.start(vec![1, 2, 3], params(4, 8)).await.unwrap();
    let outputs = coordinator.generate().await.unwrap();

    assert_eq!(outputs.len(), 1);
    let out = &outputs[0];
    assert_eq!(out.tokens, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
    assert_eq!(out.status, SessionStatus::Finished);
    assert!((out.acceptance_rate - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn single_rejection_resamples_from_the_target() {
    // Draft always predicts the arithmetic successor; the target is forced
    // to disagree at the very first drafted position, so the walk rejects
    // immediately and the bonus token comes from the target's own choice.
    let draft_model = ArithmeticModel::new(100, 99);
    let target_model = ArithmeticModel::new(100, 99).with_override(3, 50);
    let WorkerPair { draft, target } = spawn_workers(draft_model, target_model).await;
    let coordinator = Coordinator::new(draft, target, 99, 3);

    coordinator.start(vec![0, 1, 2], params(4, 1)).await.unwrap();
    let outputs = coordinator.generate().await.unwrap();

    let out = &outputs[0];
    assert_eq!(out.tokens, vec![0, 1, 2, 50]);
    assert_eq!(out.status, SessionStatus::Finished);
    assert!((out.acceptance_rate - 0.0).abs() < 1e-9);
}

#[tokio::test]
async fn draft_early_eos_short_circuits_the_chunk() {
    // Both models agree the very first generated token is EOS, so
    // `GenerateDraft` returns a single token well short of gamma.
    let model = || ArithmeticModel::new(20, 2).with_override(2, 2);
    let WorkerPair { draft, target } = spawn_workers(model(), model()).await;
    let coordinator = Coordinator::new(draft, target, 2, 11);

    coordinator.start(vec![10, 11], params(4, 10)).await.unwrap();
    let outputs = coordinator.generate().await.unwrap();

    let out = &outputs[0];
    assert_eq!(out.tokens, vec![10, 11, 2, 3]);
    assert_eq!(out.status, SessionStatus::Finished);
    assert!((out.acceptance_rate - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn empty_proposal_falls_back_to_target_only_decoding() {
    // gamma = 0: every round proposes nothing and the bonus token is a free
    // sample from the target, i.e. plain autoregressive decoding.
    let WorkerPair { draft, target } = spawn_workers(ArithmeticModel::new(50, 49), ArithmeticModel::new(50, 49)).await;
    let coordinator = Coordinator::new(draft, target, 49, 1);

    coordinator.start(vec![5], params(0, 3)).await.unwrap();
    let outputs = coordinator.generate().await.unwrap();

    let out = &outputs[0];
    assert_eq!(out.tokens, vec![5, 6, 7, 8]);
    assert_eq!(out.status, SessionStatus::Finished);
    assert!((out.acceptance_rate - 0.0).abs() < 1e-9);
}

#[tokio::test]
async fn multiple_sessions_advance_independently_in_one_round() {
    let WorkerPair { draft, target } = spawn_workers(ArithmeticModel::new(100, 99), ArithmeticModel::new(100, 99)).await;
    let coordinator = Coordinator::new(draft, target, 99, 5);

    let a = coordinator.start(vec![1, 2, 3], params(4, 4)).await.unwrap();
    let b = coordinator.start(vec![20, 21], params(4, 4)).await.unwrap();
    let outputs = coordinator.generate().await.unwrap();

    let find = |id: &str| outputs.iter().find(|o| o.session_id == id).unwrap();
    assert_eq!(find(&a).tokens, vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(find(&b).tokens, vec![20, 21, 22, 23, 24, 25]);
    assert_eq!(find(&a).status, SessionStatus::Finished);
    assert_eq!(find(&b).status, SessionStatus::Finished);
}

#[tokio::test]
async fn max_new_tokens_cutoff_keeps_the_bonus_token_in_sequence() {
    // gamma = 4, max_new_tokens = 5: the accepted chunk plus its bonus
    // token exactly fills the budget, so the committed sequence should be
    // the unbroken successor chain, not a truncated or duplicated tail.
    let WorkerPair { draft, target } = spawn_workers(ArithmeticModel::new(50, 49), ArithmeticModel::new(50, 49)).await;
    let coordinator = Coordinator::new(draft, target, 49, 2);

    coordinator.start(vec![0], params(4, 5)).await.unwrap();
    let outputs = coordinator.generate().await.unwrap();

    let out = &outputs[0];
    assert_eq!(out.tokens, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(out.status, SessionStatus::Finished);
}

#[tokio::test]
async fn close_is_safe_to_call_on_an_already_finished_session() {
    let WorkerPair { draft, target } = spawn_workers(ArithmeticModel::new(50, 49), ArithmeticModel::new(50, 49)).await;
    let coordinator = Coordinator::new(draft, target, 49, 4);

    let session_id = coordinator.start(vec![0, 1], params(4, 4)).await.unwrap();
    coordinator.generate().await.unwrap();

    // Releasing a finished session's worker-side state over the real wire
    // protocol must round-trip cleanly, not just when called in-process.
    coordinator.close(&session_id).await;
    coordinator.close(&session_id).await;
}
