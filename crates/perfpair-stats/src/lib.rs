//! Numeric primitives for perfpair.
//!
//! Everything here is pure and allocation-light: summary statistics,
//! type-7 quantiles, mid-rank ranking, and thin wrappers over the special
//! functions the hypothesis tests need.

use perfpair_error::PerfpairError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub mod preprocess;
pub mod special;

pub use preprocess::{TUKEY_K, clean, downsample, tukey_fences};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatsError {
    #[error("no samples")]
    NoSamples,

    #[error("sample contains a non-finite value ({0})")]
    NonFinite(f64),

    #[error("quantile {0} is outside [0, 1]")]
    InvalidQuantile(f64),
}

impl From<StatsError> for PerfpairError {
    fn from(err: StatsError) -> Self {
        PerfpairError::InsufficientData(err.to_string())
    }
}

/// Reject NaN and infinities before any arithmetic.
pub fn ensure_finite(values: &[f64]) -> Result<(), StatsError> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(v) => Err(StatsError::NonFinite(*v)),
        None => Ok(()),
    }
}

pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

pub fn mean(values: &[f64]) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::NoSamples);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::NoSamples);
    }
    Ok(median_sorted(&sorted_copy(values)))
}

fn median_sorted(sorted: &[f64]) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    let mid = n / 2;
    if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Unbiased sample variance (n - 1 denominator). A single value has variance 0.
pub fn variance(values: &[f64]) -> Result<f64, StatsError> {
    let m = mean(values)?;
    if values.len() < 2 {
        return Ok(0.0);
    }
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Ok(ss / (values.len() - 1) as f64)
}

pub fn std_dev(values: &[f64]) -> Result<f64, StatsError> {
    variance(values).map(f64::sqrt)
}

/// Quantile of already-sorted data by linear interpolation between order
/// statistics (Hyndman-Fan type 7).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Result<f64, StatsError> {
    if sorted.is_empty() {
        return Err(StatsError::NoSamples);
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(StatsError::InvalidQuantile(q));
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    Ok(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

pub fn summarize(values: &[f64]) -> Result<SampleSummary, StatsError> {
    let sorted = sorted_copy(values);
    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return Err(StatsError::NoSamples);
    };
    Ok(SampleSummary {
        n: values.len(),
        mean: mean(values)?,
        median: median_sorted(&sorted),
        std_dev: std_dev(values)?,
        min,
        max,
    })
}

/// Mid-ranks of a sample plus the sizes of its tie groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranks {
    /// 1-based ranks in input order; tied values share the average rank.
    pub ranks: Vec<f64>,
    /// Size of every tie group with more than one member.
    pub ties: Vec<usize>,
}

impl Ranks {
    pub fn has_ties(&self) -> bool {
        !self.ties.is_empty()
    }

    /// Σ (t³ - t) over tie groups.
    pub fn tie_term(&self) -> f64 {
        self.ties
            .iter()
            .map(|&t| {
                let t = t as f64;
                t * t * t - t
            })
            .sum()
    }
}

/// Rank `values` with mid-rank tie correction.
pub fn mid_ranks(values: &[f64]) -> Ranks {
    mid_ranks_by(values, |a, b| a.total_cmp(b))
}

/// Rank by absolute value, as the signed-rank test needs.
pub fn mid_ranks_abs(values: &[f64]) -> Ranks {
    mid_ranks_by(values, |a, b| a.abs().total_cmp(&b.abs()))
}

fn mid_ranks_by(values: &[f64], cmp: impl Fn(&f64, &f64) -> Ordering) -> Ranks {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| cmp(&values[i], &values[j]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && cmp(&values[order[start]], &values[order[end]]) == Ordering::Equal {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        if end - start > 1 {
            ties.push(end - start);
        }
        start = end;
    }
    Ranks { ranks, ties }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn mean_median_variance_basics() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v).unwrap(), 5.0);
        assert_relative_eq!(median(&v).unwrap(), 4.5);
        assert_relative_eq!(variance(&v).unwrap(), 32.0 / 7.0);
        assert_eq!(variance(&[3.0]).unwrap(), 0.0);
        assert_eq!(mean(&[]), Err(StatsError::NoSamples));
    }

    #[test]
    fn quantile_type7_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile_sorted(&sorted, 0.25).unwrap(), 1.75);
        assert_relative_eq!(quantile_sorted(&sorted, 0.75).unwrap(), 3.25);
        assert_relative_eq!(quantile_sorted(&sorted, 1.0).unwrap(), 4.0);
        assert_eq!(
            quantile_sorted(&sorted, 1.5),
            Err(StatsError::InvalidQuantile(1.5))
        );
    }

    #[test]
    fn mid_ranks_average_ties() {
        let r = mid_ranks(&[10.0, 20.0, 20.0, 30.0, 20.0]);
        assert_eq!(r.ranks, vec![1.0, 3.0, 3.0, 5.0, 3.0]);
        assert_eq!(r.ties, vec![3]);
        assert_relative_eq!(r.tie_term(), 24.0);
    }

    #[test]
    fn mid_ranks_abs_ignores_sign() {
        let r = mid_ranks_abs(&[-1.0, 2.0, 1.0]);
        assert_eq!(r.ranks, vec![1.5, 3.0, 1.5]);
    }

    #[test]
    fn ensure_finite_rejects_nan() {
        assert!(ensure_finite(&[1.0, 2.0]).is_ok());
        assert!(matches!(
            ensure_finite(&[1.0, f64::INFINITY]),
            Err(StatsError::NonFinite(_))
        ));
    }

    #[test]
    fn summary_reports_extremes() {
        let s = summarize(&[3.0, 1.0, 2.0]).unwrap();
        assert_eq!((s.n, s.min, s.max), (3, 1.0, 3.0));
        assert_relative_eq!(s.median, 2.0);
    }

    mod property_tests {
        use super::*;

        proptest! {
            #[test]
            fn ranks_sum_to_triangular_number(values in prop::collection::vec(-1e6f64..1e6, 1..200)) {
                let n = values.len() as f64;
                let sum: f64 = mid_ranks(&values).ranks.iter().sum();
                prop_assert!((sum - n * (n + 1.0) / 2.0).abs() < 1e-6);
            }

            #[test]
            fn rounded_values_keep_rank_sum(values in prop::collection::vec(0u8..5, 1..100)) {
                let values: Vec<f64> = values.into_iter().map(f64::from).collect();
                let n = values.len() as f64;
                let sum: f64 = mid_ranks(&values).ranks.iter().sum();
                prop_assert!((sum - n * (n + 1.0) / 2.0).abs() < 1e-9);
            }

            #[test]
            fn median_within_range(values in prop::collection::vec(-1e6f64..1e6, 1..100)) {
                let s = summarize(&values).unwrap();
                prop_assert!(s.min <= s.median && s.median <= s.max);
                prop_assert!(s.min <= s.mean + 1e-6 && s.mean <= s.max + 1e-6);
            }
        }
    }
}
