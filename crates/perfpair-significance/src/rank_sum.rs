use crate::{EXACT_RANK_SUM_MAX, SignificanceError, TestOutcome, check_sizes};
use perfpair_stats::{mid_ranks, special::normal_two_tailed_p};

/// Mann-Whitney-Wilcoxon rank-sum test.
///
/// The statistic is `U` for sample `a`. Small tie-free samples use the exact
/// null distribution; everything else uses the normal approximation with tie
/// and continuity correction.
pub fn mann_whitney_wilcoxon(a: &[f64], b: &[f64]) -> Result<TestOutcome, SignificanceError> {
    check_sizes(a, b)?;
    let (n1, n2) = (a.len(), b.len());
    let combined: Vec<f64> = a.iter().chain(b).copied().collect();
    let ranks = mid_ranks(&combined);

    let r1: f64 = ranks.ranks[..n1].iter().sum();
    let (f1, f2) = (n1 as f64, n2 as f64);
    let u1 = r1 - f1 * (f1 + 1.0) / 2.0;
    let u2 = f1 * f2 - u1;

    let p_value = if !ranks.has_ties() && n1 <= EXACT_RANK_SUM_MAX && n2 <= EXACT_RANK_SUM_MAX {
        let u_min = u1.min(u2).round() as usize;
        (2.0 * exact_cdf(n1, n2, u_min)).min(1.0)
    } else {
        let n = f1 + f2;
        let var = f1 * f2 / 12.0 * ((n + 1.0) - ranks.tie_term() / (n * (n - 1.0)));
        if var <= 0.0 {
            1.0
        } else {
            let mu = f1 * f2 / 2.0;
            let z = ((u1 - mu).abs() - 0.5).max(0.0) / var.sqrt();
            normal_two_tailed_p(z)
        }
    };

    Ok(TestOutcome {
        statistic: u1,
        p_value,
    })
}

/// `P(U <= u)` under the null for sample sizes `m` and `n`.
///
/// `counts[i][j][u]` is the number of orderings of `i` + `j` values whose
/// `U` equals `u`; the largest value comes from either side, which gives
/// `c(i, j, u) = c(i - 1, j, u - j) + c(i, j - 1, u)`.
fn exact_cdf(m: usize, n: usize, u: usize) -> f64 {
    let mut counts: Vec<Vec<Vec<f64>>> = vec![vec![Vec::new(); n + 1]; m + 1];
    for i in 0..=m {
        for j in 0..=n {
            let row = if i == 0 || j == 0 {
                vec![1.0]
            } else {
                (0..=i * j)
                    .map(|k| {
                        let from_a = k
                            .checked_sub(j)
                            .and_then(|prev| counts[i - 1][j].get(prev))
                            .copied()
                            .unwrap_or(0.0);
                        let from_b = counts[i][j - 1].get(k).copied().unwrap_or(0.0);
                        from_a + from_b
                    })
                    .collect()
            };
            counts[i][j] = row;
        }
    }
    let dist = &counts[m][n];
    let total: f64 = dist.iter().sum();
    dist.iter().take(u + 1).sum::<f64>() / total
}
