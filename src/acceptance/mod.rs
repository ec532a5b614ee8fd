//! Acceptance-and-resampling kernel.
//!
//! Pure functions only — no I/O, no session state. This is the single place
//! the Leviathan/Chen acceptance math lives; both the orchestrator (the
//! accept/reject walk over a drafted chunk) and the target worker's
//! `GenerateTargetToken` handler (residual resampling for the bonus token)
//! call into it, so there is exactly one implementation of the probability
//! arithmetic in the crate.

use rand::Rng;

/// Floor used wherever a probability could be exactly zero in a divisor.
pub const EPSILON: f32 = 1e-9;

/// Result of walking a drafted chunk against target probabilities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkOutcome {
    /// Number of leading draft tokens accepted, `0 <= a <= L`.
    pub accept_count: usize,
}

/// Acceptance ratio `r_i = min(1, p_i / max(q_i, eps))`.
///
/// `q_i = 0` is the degenerate case where the draft assigned zero mass to a
/// token the target nonetheless favors; per spec this is treated as a sure
/// accept (`r_i = 1`), not a division blowup.
pub fn acceptance_ratio(p_i: f32, q_i: f32) -> f32 {
    if q_i <= 0.0 {
        return 1.0;
    }
    (p_i / q_i.max(EPSILON)).min(1.0)
}

/// Walk the drafted chunk `i = 0..L`, drawing one uniform per position from
/// `rng`, accepting while `u_i < r_i`. Stops at the first rejection.
pub fn run_acceptance_walk(p: &[f32], q: &[f32], rng: &mut impl Rng) -> WalkOutcome {
    debug_assert_eq!(p.len(), q.len());
    let mut accept_count = 0;
    for (p_i, q_i) in p.iter().zip(q.iter()) {
        let r_i = acceptance_ratio(*p_i, *q_i);
        let u_i: f32 = rng.gen_range(0.0..1.0);
        if u_i < r_i {
            accept_count += 1;
        } else {
            break;
        }
    }
    WalkOutcome { accept_count }
}

/// The residual distribution `max(P - Q, 0)` renormalized to sum to 1. Falls
/// back to `p` unmodified if the renormalizer is below [`EPSILON`] (the
/// draft already covered everything the target could produce here).
pub fn residual_distribution(p: &[f32], q: &[f32]) -> Vec<f32> {
    debug_assert_eq!(p.len(), q.len());
    let residual: Vec<f32> = p.iter().zip(q.iter()).map(|(pi, qi)| (pi - qi).max(0.0)).collect();
    let s: f32 = residual.iter().sum();
    if s >= EPSILON {
        residual.iter().map(|r| r / s).collect()
    } else {
        p.to_vec()
    }
}

/// Sample a single index from a categorical distribution. The distribution
/// need not be exactly normalized; sampling is done by walking the CDF and
/// falling back to the last nonzero entry on floating-point shortfall.
pub fn sample_categorical(distribution: &[f32], rng: &mut impl Rng) -> u32 {
    let total: f32 = distribution.iter().sum();
    if total <= 0.0 {
        return 0;
    }
    let u: f32 = rng.gen_range(0.0..total);
    let mut cumulative = 0.0f32;
    for (idx, p) in distribution.iter().enumerate() {
        cumulative += p;
        if u < cumulative {
            return idx as u32;
        }
    }
    (distribution.len() - 1) as u32
}

/// Full round-4 bonus-token draw: on partial acceptance, sample from the
/// residual distribution at the break position; on full acceptance, sample
/// freely from the target's distribution.
pub fn bonus_token(accept_count: usize, chunk_len: usize, p_break: &[f32], q_break: &[f32], rng: &mut impl Rng) -> u32 {
    if accept_count < chunk_len {
        let residual = residual_distribution(p_break, q_break);
        sample_categorical(&residual, rng)
    } else {
        sample_categorical(p_break, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn zero_draft_probability_is_a_sure_accept() {
        assert_eq!(acceptance_ratio(0.3, 0.0), 1.0);
    }

    #[test]
    fn ratio_is_clamped_to_one() {
        assert_eq!(acceptance_ratio(0.9, 0.1), 1.0);
        assert!((acceptance_ratio(0.1, 0.9) - (0.1f32 / 0.9)).abs() < 1e-6);
    }

    #[test]
    fn full_match_always_accepts() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = vec![1.0, 1.0, 1.0, 1.0];
        let q = vec![1.0, 1.0, 1.0, 1.0];
        let outcome = run_acceptance_walk(&p, &q, &mut rng);
        assert_eq!(outcome.accept_count, 4);
    }

    #[test]
    fn zero_match_always_rejects_at_first_token() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = vec![0.0, 1.0];
        let q = vec![1.0, 1.0];
        let outcome = run_acceptance_walk(&p, &q, &mut rng);
        assert_eq!(outcome.accept_count, 0);
    }

    #[test]
    fn residual_falls_back_to_p_when_draft_dominates() {
        let p = vec![0.2, 0.3, 0.5];
        let q = vec![0.5, 0.5, 0.5];
        let residual = residual_distribution(&p, &q);
        assert_eq!(residual, p);
    }

    #[test]
    fn residual_is_normalized_and_nonoverlapping_mass() {
        let p = vec![0.1, 0.6, 0.3];
        let q = vec![0.4, 0.1, 0.3];
        let residual = residual_distribution(&p, &q);
        let sum: f32 = residual.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(residual[2].abs() < 1e-6);
    }

    #[test]
    fn sample_categorical_picks_the_only_nonzero_entry() {
        let mut rng = StdRng::seed_from_u64(1);
        let distribution = vec![0.0, 0.0, 1.0, 0.0];
        for _ in 0..20 {
            assert_eq!(sample_categorical(&distribution, &mut rng), 2);
        }
    }
}
