//! Shared logits-to-probability utilities.
//!
//! Temperature is applied identically on both the draft and target side;
//! top-p truncation is applied on the draft side only (spec §4.1, Open
//! Question 2 — applying it symmetrically breaks distributional
//! equivalence).

/// Numerically stable softmax over `logits / temperature`. `temperature`
/// near zero degenerates to a one-hot distribution on the argmax rather
/// than dividing by zero.
pub fn softmax(logits: &[f32], temperature: f32) -> Vec<f32> {
    if temperature <= 1e-6 {
        let mut out = vec![0.0f32; logits.len()];
        if let Some((idx, _)) = logits
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        {
            out[idx] = 1.0;
        }
        return out;
    }
    let scaled: Vec<f32> = logits.iter().map(|l| l / temperature).collect();
    let max = scaled.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scaled.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|v| v / sum).collect()
}

/// Nucleus (top-p) filtering: keep the smallest prefix of probability mass
/// (sorted descending) whose cumulative sum reaches `top_p`, zero out the
/// rest, renormalize. `top_p >= 1.0` is a no-op.
pub fn top_p_filter(probs: &[f32], top_p: f32) -> Vec<f32> {
    if top_p >= 1.0 {
        return probs.to_vec();
    }
    let mut indexed: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

    let mut cumulative = 0.0f32;
    let mut cutoff = indexed.len();
    for (rank, (_, p)) in indexed.iter().enumerate() {
        cumulative += p;
        if cumulative >= top_p {
            cutoff = rank + 1;
            break;
        }
    }

    let mut filtered = vec![0.0f32; probs.len()];
    let mut kept_mass = 0.0f32;
    for &(idx, p) in indexed.iter().take(cutoff) {
        filtered[idx] = p;
        kept_mass += p;
    }
    if kept_mass > 0.0 {
        for v in filtered.iter_mut() {
            *v /= kept_mass;
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0], 1.0);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn near_zero_temperature_is_one_hot_on_argmax() {
        let probs = softmax(&[0.1, 5.0, 0.2], 0.0);
        assert_eq!(probs, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn top_p_one_is_identity() {
        let probs = vec![0.1, 0.6, 0.3];
        assert_eq!(top_p_filter(&probs, 1.0), probs);
    }

    #[test]
    fn top_p_truncates_low_mass_tail() {
        let probs = vec![0.05, 0.8, 0.15];
        let filtered = top_p_filter(&probs, 0.9);
        assert_eq!(filtered[0], 0.0);
        let sum: f32 = filtered.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}
