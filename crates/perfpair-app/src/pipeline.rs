//! Ordered processor pipeline with per-processor timeout, retry and fallback.
//!
//! A failing processor is logged and isolated; the ones after it still run.

use crate::batching::DispatchedBatch;
use crate::processors::{
    FrameworkPublishingProcessor, LoggingProcessor, MethodComparisonProcessor, Processor,
    ProcessorError,
};
use crate::retry::RetryPolicy;
use crate::signal::RunSignal;
use perfpair_adapters::{FallbackReporter, ResultPublisher};
use perfpair_config::QueueConfig;
use perfpair_domain::ComparisonEngine;
use perfpair_error::PerfpairError;
use perfpair_types::{ClassCatalog, ComparisonResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Per-dispatch state shared by the processors of one batch.
#[derive(Debug)]
pub struct DispatchContext {
    pub run_id: Uuid,
    pub catalog: Arc<ClassCatalog>,
    pub signal: RunSignal,
    /// Members already handed to the publisher.
    pub published_completions: usize,
    /// Set once comparisons have been computed for this batch.
    pub comparisons: Option<Vec<ComparisonResult>>,
    pub failures: Vec<PerfpairError>,
    pub fallback_reports: usize,
}

impl DispatchContext {
    pub fn new(run_id: Uuid, catalog: Arc<ClassCatalog>, signal: RunSignal) -> Self {
        Self {
            run_id,
            catalog,
            signal,
            published_completions: 0,
            comparisons: None,
            failures: Vec::new(),
            fallback_reports: 0,
        }
    }
}

pub struct Pipeline {
    processors: Vec<Arc<dyn Processor>>,
    retry: RetryPolicy,
    processing_timeout: Duration,
    fallback_enabled: bool,
}

impl Pipeline {
    pub fn new(retry: RetryPolicy, processing_timeout: Duration, fallback_enabled: bool) -> Self {
        Self {
            processors: Vec::new(),
            retry,
            processing_timeout,
            fallback_enabled,
        }
    }

    pub fn with_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// The standard pipeline: framework publishing, logging, method comparison,
    /// each included when enabled.
    pub fn from_config(
        config: &QueueConfig,
        publisher: Arc<dyn ResultPublisher>,
        fallback: Arc<dyn FallbackReporter>,
    ) -> Self {
        let mut pipeline = Pipeline::new(
            RetryPolicy::new(config.max_retry_attempts, config.base_retry_delay()),
            config.processing_timeout(),
            config.enable_fallback_publishing,
        );
        if config.enable_framework_publishing {
            pipeline = pipeline.with_processor(Arc::new(FrameworkPublishingProcessor::new(
                publisher.clone(),
                fallback.clone(),
            )));
        }
        if config.enable_logging_processor {
            pipeline = pipeline.with_processor(Arc::new(LoggingProcessor));
        }
        if config.enable_method_comparison {
            pipeline = pipeline.with_processor(Arc::new(MethodComparisonProcessor::new(
                Arc::new(ComparisonEngine::new(config.comparison_settings())),
                config.comparison_detection_strategy,
                config.comparison_timeout(),
                publisher,
                fallback,
            )));
        }
        pipeline
    }

    pub fn processor_names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub async fn run(&self, batch: &DispatchedBatch, ctx: &mut DispatchContext) {
        for processor in &self.processors {
            let name = processor.name();
            match self.run_one(processor.as_ref(), batch, ctx).await {
                Ok(()) => info!(processor = name, batch = %batch.key, "processor finished"),
                Err(err) => {
                    error!(processor = name, batch = %batch.key, error = %err, "processor failed");
                    ctx.failures.push(PerfpairError::Processor {
                        processor: name.to_string(),
                        message: err.to_string(),
                    });
                    if self.fallback_enabled {
                        let reported = processor.fallback(batch, ctx, &err.to_string());
                        if reported > 0 {
                            warn!(processor = name, batch = %batch.key, reported, "reported through fallback");
                        }
                        ctx.fallback_reports += reported;
                    }
                }
            }
        }
    }

    async fn run_one(
        &self,
        processor: &dyn Processor,
        batch: &DispatchedBatch,
        ctx: &mut DispatchContext,
    ) -> Result<(), ProcessorError> {
        let budget = processor.budget(self.processing_timeout);
        let mut retry = 0;
        loop {
            let err = match tokio::time::timeout(budget, processor.process(batch, ctx)).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => err,
                Err(_) => ProcessorError::Timeout(budget),
            };

            retry += 1;
            if !err.is_retryable() || !self.retry.allows(retry) || ctx.signal.is_cancelled() {
                return Err(err);
            }
            let delay = self.retry.delay(retry);
            warn!(
                processor = processor.name(),
                retry,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "retrying processor"
            );
            let mut signal = ctx.signal.clone();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = signal.cancelled() => return Err(err),
            }
        }
    }
}
