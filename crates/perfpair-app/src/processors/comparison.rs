use super::{Processor, ProcessorError};
use crate::batching::DispatchedBatch;
use crate::pipeline::DispatchContext;
use async_trait::async_trait;
use perfpair_adapters::{FallbackReporter, ResultPublisher};
use perfpair_domain::{ComparisonEngine, PairOutcome, detect, group_members};
use perfpair_error::PerfpairError;
use perfpair_types::{
    ComparisonDetectionStrategy, ComparisonGroupId, ComparisonResult, CompletionEvent,
    TestClassMetadata,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Pairs up methods of each eligible comparison group, runs the statistics
/// off the async runtime and publishes the results.
pub struct MethodComparisonProcessor {
    engine: Arc<ComparisonEngine>,
    strategy: ComparisonDetectionStrategy,
    comparison_timeout: Duration,
    publisher: Arc<dyn ResultPublisher>,
    fallback: Arc<dyn FallbackReporter>,
}

impl MethodComparisonProcessor {
    pub fn new(
        engine: Arc<ComparisonEngine>,
        strategy: ComparisonDetectionStrategy,
        comparison_timeout: Duration,
        publisher: Arc<dyn ResultPublisher>,
        fallback: Arc<dyn FallbackReporter>,
    ) -> Self {
        Self {
            engine,
            strategy,
            comparison_timeout,
            publisher,
            fallback,
        }
    }

    async fn compute(&self, batch: &DispatchedBatch, ctx: &DispatchContext) -> Vec<ComparisonResult> {
        let class = ctx.catalog.get(&batch.key.class).cloned();
        let groups = detect(&batch.members, class.as_ref(), self.strategy);
        if groups.is_empty() {
            return Vec::new();
        }

        let task = {
            let engine = self.engine.clone();
            let members = batch.members.clone();
            let class = class.clone();
            let groups = groups.clone();
            tokio::task::spawn_blocking(move || {
                groups
                    .iter()
                    .flat_map(|g| engine.compare_group(&members, class.as_ref(), g))
                    .collect::<Vec<_>>()
            })
        };

        let mut signal = ctx.signal.clone();
        let outcome = tokio::select! {
            joined = tokio::time::timeout(self.comparison_timeout, task) => match joined {
                Ok(Ok(pairs)) => Ok(pairs),
                Ok(Err(join_err)) => Err(format!("comparison task failed: {join_err}")),
                Err(_) => {
                    let timeout_ms = u64::try_from(self.comparison_timeout.as_millis()).unwrap_or(u64::MAX);
                    Err(PerfpairError::ComparisonTimeout { timeout_ms }.to_string())
                }
            },
            _ = signal.cancelled() => Err("run cancelled".to_string()),
        };

        match outcome {
            Ok(pairs) => pairs.into_iter().map(log_outcome).collect(),
            Err(reason) => {
                warn!(batch = %batch.key, reason = %reason, "comparisons unavailable");
                unavailable_pairs(&batch.members, class.as_ref(), &groups, &reason)
            }
        }
    }
}

fn log_outcome(pair: PairOutcome) -> ComparisonResult {
    match &pair.result {
        Ok(stats) => info!(
            group = %pair.group,
            method_a = %pair.method_a,
            method_b = %pair.method_b,
            test = %stats.test_type,
            p_value = stats.p_value,
            significance = ?stats.significance,
            "comparison complete"
        ),
        Err(err) if err.is_precondition() => error!(
            group = %pair.group,
            method_a = %pair.method_a,
            method_b = %pair.method_b,
            error = %err,
            "statistical precondition violated"
        ),
        Err(err) => warn!(
            group = %pair.group,
            method_a = %pair.method_a,
            method_b = %pair.method_b,
            error = %err,
            "comparison unavailable"
        ),
    }
    pair.into_result()
}

/// Every pair the detector selected, marked unavailable with `reason`.
fn unavailable_pairs(
    members: &[CompletionEvent],
    class: Option<&TestClassMetadata>,
    groups: &BTreeSet<ComparisonGroupId>,
    reason: &str,
) -> Vec<ComparisonResult> {
    let mut results = Vec::new();
    for group in groups {
        let selected = group_members(members, class, group);
        for (i, a) in selected.iter().enumerate() {
            for b in &selected[i + 1..] {
                results.push(ComparisonResult::unavailable(
                    group.clone(),
                    a.method_name.clone(),
                    b.method_name.clone(),
                    reason,
                ));
            }
        }
    }
    results
}

#[async_trait]
impl Processor for MethodComparisonProcessor {
    fn name(&self) -> &'static str {
        "method-comparison"
    }

    async fn process(
        &self,
        batch: &DispatchedBatch,
        ctx: &mut DispatchContext,
    ) -> Result<(), ProcessorError> {
        if ctx.comparisons.is_none() {
            let results = self.compute(batch, ctx).await;
            ctx.comparisons = Some(results);
        }
        let results = ctx.comparisons.as_deref().unwrap_or_default();
        if results.is_empty() {
            return Ok(());
        }
        self.publisher.publish_comparisons(&batch.key, results).await?;
        info!(batch = %batch.key, comparisons = results.len(), "comparisons published");
        Ok(())
    }

    /// The comparison itself is bounded separately, so it gets that budget on top.
    fn budget(&self, processing_timeout: Duration) -> Duration {
        processing_timeout.saturating_add(self.comparison_timeout)
    }

    fn fallback(&self, _batch: &DispatchedBatch, ctx: &DispatchContext, reason: &str) -> usize {
        match ctx.comparisons.as_deref() {
            Some(results) if !results.is_empty() => {
                self.fallback.report_comparisons(results, reason);
                results.len()
            }
            _ => 0,
        }
    }
}
