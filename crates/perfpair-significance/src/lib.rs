//! Two-sample hypothesis tests for perfpair.
//!
//! Every test returns a statistic and a two-tailed p-value. All of them accept
//! constant (zero-variance) input and never produce NaN for finite samples.

use perfpair_error::PerfpairError;
use perfpair_stats::StatsError;
use perfpair_types::TestType;

mod ks;
mod rank_sum;
mod signed_rank;

pub use ks::kolmogorov_smirnov;
pub use rank_sum::mann_whitney_wilcoxon;
pub use signed_rank::wilcoxon_signed_rank;
pub use t_test::welch_t_test;

/// Fewest samples per side any test will accept.
pub const MIN_SAMPLES: usize = 3;

/// Largest per-side size for which the rank-sum test uses its exact distribution.
pub const EXACT_RANK_SUM_MAX: usize = 20;

/// Largest pair count for which the signed-rank test uses its exact distribution.
pub const EXACT_SIGNED_RANK_MAX: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

impl TestOutcome {
    /// Outcome for two samples that cannot be told apart.
    pub fn indistinguishable() -> Self {
        Self {
            statistic: 0.0,
            p_value: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignificanceError {
    #[error("need at least {needed} samples per side, got {a} and {b}")]
    InsufficientSamples { needed: usize, a: usize, b: usize },

    #[error("signed-rank test requires paired samples of equal size, got {a} and {b}")]
    UnequalSizes { a: usize, b: usize },

    #[error("invalid reference distribution: {0}")]
    Distribution(String),

    #[error(transparent)]
    Stats(#[from] StatsError),
}

impl From<SignificanceError> for PerfpairError {
    fn from(err: SignificanceError) -> Self {
        match err {
            SignificanceError::UnequalSizes { .. } => {
                PerfpairError::StatisticalPrecondition(err.to_string())
            }
            SignificanceError::Stats(inner) => inner.into(),
            other => PerfpairError::InsufficientData(other.to_string()),
        }
    }
}

/// Run the configured test on samples `a` (before) and `b` (after).
pub fn run_test(test: TestType, a: &[f64], b: &[f64]) -> Result<TestOutcome, SignificanceError> {
    match test {
        TestType::TTest => welch_t_test(a, b),
        TestType::MannWhitneyWilcoxon => mann_whitney_wilcoxon(a, b),
        TestType::WilcoxonSignedRank => wilcoxon_signed_rank(a, b),
        TestType::KolmogorovSmirnov => kolmogorov_smirnov(a, b),
    }
}

fn check_sizes(a: &[f64], b: &[f64]) -> Result<(), SignificanceError> {
    if a.len() < MIN_SAMPLES || b.len() < MIN_SAMPLES {
        return Err(SignificanceError::InsufficientSamples {
            needed: MIN_SAMPLES,
            a: a.len(),
            b: b.len(),
        });
    }
    perfpair_stats::ensure_finite(a)?;
    perfpair_stats::ensure_finite(b)?;
    Ok(())
}
