//! Batch processors, run in order by the [`Pipeline`](crate::Pipeline).

use crate::batching::DispatchedBatch;
use crate::pipeline::DispatchContext;
use async_trait::async_trait;
use perfpair_adapters::PublishError;
use std::time::Duration;

mod comparison;
mod framework;
mod logging;

pub use comparison::MethodComparisonProcessor;
pub use framework::FrameworkPublishingProcessor;
pub use logging::LoggingProcessor;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessorError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
}

impl ProcessorError {
    /// Only transient failures are retried; a timeout has already spent its budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessorError::Transient(_))
    }
}

impl From<PublishError> for ProcessorError {
    fn from(err: PublishError) -> Self {
        if err.is_permanent() {
            ProcessorError::Permanent(err.to_string())
        } else {
            ProcessorError::Transient(format!("{err:#}"))
        }
    }
}

#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Process one batch. Retries call this again with the same context, so
    /// implementations resume rather than repeat finished work.
    async fn process(
        &self,
        batch: &DispatchedBatch,
        ctx: &mut DispatchContext,
    ) -> Result<(), ProcessorError>;

    /// Time allowed for one `process` call.
    fn budget(&self, processing_timeout: Duration) -> Duration {
        processing_timeout
    }

    /// Report whatever this processor could not deliver. Called once the
    /// pipeline has given up on it; returns the number of records reported.
    fn fallback(&self, _batch: &DispatchedBatch, _ctx: &DispatchContext, _reason: &str) -> usize {
        0
    }
}
