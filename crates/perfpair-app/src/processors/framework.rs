use super::{Processor, ProcessorError};
use crate::batching::DispatchedBatch;
use crate::pipeline::DispatchContext;
use async_trait::async_trait;
use perfpair_adapters::{FallbackReporter, ResultPublisher};
use std::sync::Arc;
use tracing::debug;

/// Passes every completion event through to the publisher, unpaired.
pub struct FrameworkPublishingProcessor {
    publisher: Arc<dyn ResultPublisher>,
    fallback: Arc<dyn FallbackReporter>,
}

impl FrameworkPublishingProcessor {
    pub fn new(publisher: Arc<dyn ResultPublisher>, fallback: Arc<dyn FallbackReporter>) -> Self {
        Self {
            publisher,
            fallback,
        }
    }
}

#[async_trait]
impl Processor for FrameworkPublishingProcessor {
    fn name(&self) -> &'static str {
        "framework-publishing"
    }

    async fn process(
        &self,
        batch: &DispatchedBatch,
        ctx: &mut DispatchContext,
    ) -> Result<(), ProcessorError> {
        for event in batch.members.iter().skip(ctx.published_completions) {
            self.publisher.publish_completion(event).await?;
            ctx.published_completions += 1;
            debug!(test_case = %event.test_case_id, "completion published");
        }
        Ok(())
    }

    fn fallback(&self, batch: &DispatchedBatch, ctx: &DispatchContext, reason: &str) -> usize {
        let pending = &batch.members[ctx.published_completions.min(batch.members.len())..];
        for event in pending {
            self.fallback.report_completion(event, reason);
        }
        pending.len()
    }
}
