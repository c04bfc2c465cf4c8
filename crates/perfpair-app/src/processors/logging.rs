use super::{Processor, ProcessorError};
use crate::batching::DispatchedBatch;
use crate::pipeline::DispatchContext;
use async_trait::async_trait;
use perfpair_stats::summarize;
use tracing::{debug, info};

/// Logs a summary of each batch and its members.
#[derive(Debug, Default, Clone)]
pub struct LoggingProcessor;

#[async_trait]
impl Processor for LoggingProcessor {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn process(
        &self,
        batch: &DispatchedBatch,
        ctx: &mut DispatchContext,
    ) -> Result<(), ProcessorError> {
        info!(
            run_id = %ctx.run_id,
            batch = %batch.key,
            reason = ?batch.reason,
            members = batch.members.len(),
            expected = batch.expected,
            "batch received"
        );
        for event in &batch.members {
            match summarize(&event.raw_durations_ms) {
                Ok(s) => debug!(
                    test_case = %event.test_case_id,
                    success = event.success,
                    samples = s.n,
                    mean_ms = s.mean,
                    median_ms = s.median,
                    "member"
                ),
                Err(_) => debug!(
                    test_case = %event.test_case_id,
                    success = event.success,
                    "member without samples"
                ),
            }
        }
        Ok(())
    }
}
