use crate::{SignificanceError, TestOutcome, check_sizes};
use perfpair_stats::{sorted_copy, special::kolmogorov_q};

/// Two-sample Kolmogorov-Smirnov test.
///
/// The statistic is `D`, the largest gap between the empirical CDFs. The
/// p-value uses the asymptotic Kolmogorov distribution with Stephens'
/// small-sample correction `λ = (√Ne + 0.12 + 0.11/√Ne)·D`.
pub fn kolmogorov_smirnov(a: &[f64], b: &[f64]) -> Result<TestOutcome, SignificanceError> {
    check_sizes(a, b)?;
    let (a, b) = (sorted_copy(a), sorted_copy(b));
    let (na, nb) = (a.len() as f64, b.len() as f64);

    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / na - j as f64 / nb).abs());
    }

    let ne = na * nb / (na + nb);
    let sqrt_ne = ne.sqrt();
    let lambda = (sqrt_ne + 0.12 + 0.11 / sqrt_ne) * d;
    Ok(TestOutcome {
        statistic: d,
        p_value: kolmogorov_q(lambda),
    })
}
