//! Direct, in-process tests of invariants that don't need a wire protocol
//! round trip: draft-side rollback, target-side finalize idempotence, and
//! the acceptance kernel's statistical guarantee.

use rand::rngs::StdRng;
use rand::SeedableRng;
use speculative_coordinator::acceptance::{residual_distribution, run_acceptance_walk, sample_categorical};
use speculative_coordinator::draft::{DraftSamplingParams, DraftWorker};
use speculative_coordinator::model::ArithmeticModel;
use speculative_coordinator::target::{TargetSamplingParams, TargetWorker};

fn greedy_draft(vocab_size: usize, eos_token: u32) -> DraftWorker<ArithmeticModel> {
    DraftWorker::new(
        ArithmeticModel::new(vocab_size, eos_token),
        DraftSamplingParams {
            temperature: 0.0,
            top_p: 1.0,
        },
    )
}

fn greedy_target(vocab_size: usize, eos_token: u32) -> TargetWorker<ArithmeticModel> {
    TargetWorker::new(ArithmeticModel::new(vocab_size, eos_token), TargetSamplingParams { temperature: 0.0 })
}

/// Rolling back to a partial-acceptance snapshot and then committing a
/// different forced token must make the *next* round propose from that
/// forced token's successor, not from wherever the original (discarded)
/// proposal would have continued.
#[tokio::test]
async fn draft_rollback_resumes_from_the_accepted_prefix_not_the_discarded_tail() {
    let worker = greedy_draft(100, 99);
    worker.start_session("s1".into(), vec![0]).await.unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let (tokens, _) = worker.generate_draft("s1", 3, &mut rng).await.unwrap();
    assert_eq!(tokens, vec![1, 2, 3]);

    // Only the first proposed token (1) was actually accepted; the round
    // committed a forced token of 99 instead of continuing to 2, 3.
    worker.update_draft_context("s1", 1, Some(99)).await.unwrap();

    let (tokens2, _) = worker.generate_draft("s1", 2, &mut rng).await.unwrap();
    // successor(99) wraps to 0, then successor(0) is 1 — proof the session
    // resumed from the accepted prefix plus the forced token, and the
    // discarded 2, 3 tail left no trace in the live state.
    assert_eq!(tokens2, vec![0, 1]);
}

/// A repeated `FinalizeBatchTokens` call with the same committed tokens
/// must be a pure no-op: the cache advances once, not twice.
#[tokio::test]
async fn finalize_batch_is_idempotent_on_a_repeated_call() {
    let worker = greedy_target(50, 49);
    worker.start_session("s1".into(), vec![0]).await.unwrap();

    worker.finalize_batch("s1", &[1], 0).await.unwrap();
    let after_first = worker.check_token_probability("s1", 2).await.unwrap();
    assert!(after_first > 0.99, "expected the model to now favor 2, got {after_first}");

    // Repeating the identical finalize must not advance the cache again.
    worker.finalize_batch("s1", &[1], 0).await.unwrap();
    let after_repeat = worker.check_token_probability("s1", 2).await.unwrap();
    assert!(
        (after_first - after_repeat).abs() < 1e-6,
        "a repeated finalize moved the cache: {after_first} -> {after_repeat}"
    );

    // A genuinely new finalize still advances normally afterward.
    worker.finalize_batch("s1", &[2], 0).await.unwrap();
    let after_next = worker.check_token_probability("s1", 3).await.unwrap();
    assert!(after_next > 0.99, "expected the model to now favor 3, got {after_next}");
}

/// Closing a session must make it unreachable for further rounds: a
/// `generate_draft` call against a session id `close_session` already tore
/// down has to fail, not silently keep advancing retired state.
#[tokio::test]
async fn closed_session_is_unreachable_for_further_drafting() {
    let worker = greedy_draft(50, 49);
    worker.start_session("s1".into(), vec![0]).await.unwrap();

    worker.close_session("s1").await;

    let mut rng = StdRng::seed_from_u64(3);
    let err = worker.generate_draft("s1", 2, &mut rng).await.unwrap_err();
    assert!(matches!(err, speculative_coordinator::error::CoordinatorError::Terminated(_)));

    // Idempotent: closing an already-closed (or never-opened) session id
    // must not panic.
    worker.close_session("s1").await;
    worker.close_session("never-started").await;
}

/// The acceptance walk's empirical accept frequency for a single drafted
/// token should track the analytic ratio `min(1, p/q)`.
#[test]
fn acceptance_rate_converges_to_the_probability_ratio() {
    let p: Vec<f32> = vec![0.3];
    let q: Vec<f32> = vec![0.6];
    let expected_ratio = (p[0] / q[0]).min(1.0); // 0.5

    let mut rng = StdRng::seed_from_u64(42);
    let trials = 20_000;
    let accepted = (0..trials).filter(|_| run_acceptance_walk(&p, &q, &mut rng).accept_count == 1).count();

    let empirical_rate = accepted as f64 / trials as f64;
    assert!(
        (empirical_rate - expected_ratio as f64).abs() < 0.02,
        "empirical accept rate {empirical_rate} too far from {expected_ratio}"
    );
}

/// On rejection, the bonus token must be resampled only from the part of
/// the target's distribution the draft didn't already cover.
#[test]
fn residual_resampling_never_draws_from_overlapping_mass() {
    let p = vec![0.1, 0.6, 0.3];
    let q = vec![0.4, 0.1, 0.3]; // index 2 fully overlaps; residual mass is only at 0 and 1
    let residual = residual_distribution(&p, &q);

    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..5_000 {
        let drawn = sample_categorical(&residual, &mut rng);
        assert_ne!(drawn, 2, "index 2 has no residual mass and must never be drawn");
    }
}
