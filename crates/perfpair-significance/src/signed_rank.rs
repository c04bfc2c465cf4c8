use crate::{EXACT_SIGNED_RANK_MAX, SignificanceError, TestOutcome, check_sizes};
use perfpair_stats::{mid_ranks_abs, special::normal_two_tailed_p};

/// Wilcoxon signed-rank test on paired samples `a[i]`, `b[i]`.
///
/// The statistic is `W+`, the rank sum of positive differences `b - a`.
/// Zero differences are dropped. Unequal sizes are a precondition failure and
/// are never truncated to fit.
pub fn wilcoxon_signed_rank(a: &[f64], b: &[f64]) -> Result<TestOutcome, SignificanceError> {
    if a.len() != b.len() {
        return Err(SignificanceError::UnequalSizes {
            a: a.len(),
            b: b.len(),
        });
    }
    check_sizes(a, b)?;

    let diffs: Vec<f64> = a
        .iter()
        .zip(b)
        .map(|(x, y)| y - x)
        .filter(|d| *d != 0.0)
        .collect();
    if diffs.is_empty() {
        return Ok(TestOutcome::indistinguishable());
    }

    let ranks = mid_ranks_abs(&diffs);
    let w_plus: f64 = diffs
        .iter()
        .zip(&ranks.ranks)
        .filter(|(d, _)| **d > 0.0)
        .map(|(_, r)| r)
        .sum();
    let n = diffs.len();
    let nf = n as f64;
    let w_minus = nf * (nf + 1.0) / 2.0 - w_plus;

    let p_value = if !ranks.has_ties() && n <= EXACT_SIGNED_RANK_MAX {
        let w = w_plus.min(w_minus).round() as usize;
        (2.0 * exact_cdf(n, w)).min(1.0)
    } else {
        let var = nf * (nf + 1.0) * (2.0 * nf + 1.0) / 24.0 - ranks.tie_term() / 48.0;
        if var <= 0.0 {
            1.0
        } else {
            let mu = nf * (nf + 1.0) / 4.0;
            let z = ((w_plus - mu).abs() - 0.5).max(0.0) / var.sqrt();
            normal_two_tailed_p(z)
        }
    };

    Ok(TestOutcome {
        statistic: w_plus,
        p_value,
    })
}

/// `P(W <= w)` for `n` untied pairs: subsets of `{1..=n}` with sum at most `w`
/// over all `2^n` sign assignments.
fn exact_cdf(n: usize, w: usize) -> f64 {
    let max = n * (n + 1) / 2;
    let mut counts = vec![0.0f64; max + 1];
    counts[0] = 1.0;
    for rank in 1..=n {
        for s in (rank..=max).rev() {
            counts[s] += counts[s - rank];
        }
    }
    let total = 2f64.powi(n as i32);
    counts.iter().take(w + 1).sum::<f64>() / total
}
