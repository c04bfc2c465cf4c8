//! Domain logic for perfpair.
//!
//! This crate is intentionally I/O-free: it decides which groups to compare,
//! runs the statistics and classifies the outcome. Logging, timeouts and
//! publishing belong to `perfpair-app`.

use perfpair_error::PerfpairError;
use perfpair_significance::SignificanceError;
use perfpair_stats::StatsError;

mod detector;
mod engine;

pub use detector::{detect, group_members, resolve_group};
pub use engine::{ComparisonEngine, ComparisonSettings, PairOutcome, classify};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComparisonError {
    #[error("method failed: {method}")]
    MethodFailed { method: String },

    #[error(transparent)]
    Significance(#[from] SignificanceError),

    #[error(transparent)]
    Stats(#[from] StatsError),
}

impl ComparisonError {
    /// Programmer or configuration errors, as opposed to bad data.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ComparisonError::Significance(SignificanceError::UnequalSizes { .. })
        )
    }
}

impl From<ComparisonError> for PerfpairError {
    fn from(err: ComparisonError) -> Self {
        match err {
            ComparisonError::MethodFailed { .. } => PerfpairError::InsufficientData(err.to_string()),
            ComparisonError::Significance(inner) => inner.into(),
            ComparisonError::Stats(inner) => inner.into(),
        }
    }
}
