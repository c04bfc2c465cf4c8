//! Publishing adapters for perfpair.
//!
//! In clean-arch terms: this is where results leave the process. The
//! pipeline talks to a [`ResultPublisher`]; when that path cannot complete it
//! reports synchronously through a [`FallbackReporter`].

use async_trait::async_trait;
use perfpair_types::{BatchKey, ComparisonResult, CompletionEvent};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Retrying cannot help; the pipeline goes straight to fallback.
    #[error("permanent publish failure: {0}")]
    Permanent(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PublishError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, PublishError::Permanent(_))
    }
}

/// Downstream consumer of completions and comparison results.
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    async fn publish_completion(&self, event: &CompletionEvent) -> Result<(), PublishError>;

    async fn publish_comparisons(
        &self,
        batch: &BatchKey,
        results: &[ComparisonResult],
    ) -> Result<(), PublishError>;
}

/// Direct synchronous reporting, used when the queue or pipeline cannot
/// deliver. Implementations must not fail.
pub trait FallbackReporter: Send + Sync {
    fn report_completion(&self, event: &CompletionEvent, reason: &str);

    fn report_comparisons(&self, results: &[ComparisonResult], reason: &str);
}

/// Writes fallback records as structured `tracing` events at warn level.
#[derive(Debug, Default, Clone)]
pub struct TracingFallbackReporter;

impl FallbackReporter for TracingFallbackReporter {
    fn report_completion(&self, event: &CompletionEvent, reason: &str) {
        tracing::warn!(
            test_case = %event.test_case_id,
            success = event.success,
            samples = event.raw_durations_ms.len(),
            reason,
            "fallback completion"
        );
    }

    fn report_comparisons(&self, results: &[ComparisonResult], reason: &str) {
        for result in results {
            match result.statistics() {
                Some(stats) => tracing::warn!(
                    group = %result.group,
                    method_a = %result.method_a,
                    method_b = %result.method_b,
                    p_value = stats.p_value,
                    significance = ?stats.significance,
                    reason,
                    "fallback comparison"
                ),
                None => tracing::warn!(
                    group = %result.group,
                    method_a = %result.method_a,
                    method_b = %result.method_b,
                    reason,
                    "fallback comparison unavailable"
                ),
            }
        }
    }
}

/// A record delivered to an external formatter.
#[derive(Debug, Clone, PartialEq)]
pub enum Published {
    Completion(CompletionEvent),
    Comparisons {
        batch: BatchKey,
        results: Vec<ComparisonResult>,
    },
}

/// Forwards every record to a channel owned by the host's formatter.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<Published>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Published>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, record: Published) -> Result<(), PublishError> {
        self.tx
            .send(record)
            .map_err(|_| PublishError::Permanent("formatter channel closed".to_string()))
    }
}

#[async_trait]
impl ResultPublisher for ChannelPublisher {
    async fn publish_completion(&self, event: &CompletionEvent) -> Result<(), PublishError> {
        self.send(Published::Completion(event.clone()))
    }

    async fn publish_comparisons(
        &self,
        batch: &BatchKey,
        results: &[ComparisonResult],
    ) -> Result<(), PublishError> {
        self.send(Published::Comparisons {
            batch: batch.clone(),
            results: results.to_vec(),
        })
    }
}
