//! Fake publishers and fallback reporters for testing perfpair pipelines.
//!
//! Everything records into shared vectors so tests can assert on exactly what
//! reached the publisher and what went through fallback.

use async_trait::async_trait;
use perfpair_adapters::{FallbackReporter, PublishError, ResultPublisher};
use perfpair_types::{BatchKey, ComparisonResult, CompletionEvent};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records everything published through it.
#[derive(Debug, Default, Clone)]
pub struct RecordingPublisher {
    completions: Arc<Mutex<Vec<CompletionEvent>>>,
    comparisons: Arc<Mutex<Vec<(BatchKey, Vec<ComparisonResult>)>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completions(&self) -> Vec<CompletionEvent> {
        lock(&self.completions).clone()
    }

    /// Published comparison results, flattened across batches.
    pub fn comparisons(&self) -> Vec<ComparisonResult> {
        lock(&self.comparisons)
            .iter()
            .flat_map(|(_, results)| results.iter().cloned())
            .collect()
    }

    pub fn comparison_batches(&self) -> Vec<BatchKey> {
        lock(&self.comparisons).iter().map(|(k, _)| k.clone()).collect()
    }
}

#[async_trait]
impl ResultPublisher for RecordingPublisher {
    async fn publish_completion(&self, event: &CompletionEvent) -> Result<(), PublishError> {
        lock(&self.completions).push(event.clone());
        Ok(())
    }

    async fn publish_comparisons(
        &self,
        batch: &BatchKey,
        results: &[ComparisonResult],
    ) -> Result<(), PublishError> {
        lock(&self.comparisons).push((batch.clone(), results.to_vec()));
        Ok(())
    }
}

/// How a [`FailingPublisher`] misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Fail with a retryable error this many times, then succeed.
    Transient(u32),
    /// Always fail with a permanent error.
    Permanent,
}

/// Wraps a [`RecordingPublisher`] and fails according to [`FailureMode`].
#[derive(Debug, Clone)]
pub struct FailingPublisher {
    inner: RecordingPublisher,
    mode: FailureMode,
    remaining: Arc<AtomicU32>,
    attempts: Arc<AtomicU32>,
}

impl FailingPublisher {
    pub fn new(mode: FailureMode) -> Self {
        let remaining = match mode {
            FailureMode::Transient(n) => n,
            FailureMode::Permanent => 0,
        };
        Self {
            inner: RecordingPublisher::new(),
            mode,
            remaining: Arc::new(AtomicU32::new(remaining)),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn recorded(&self) -> &RecordingPublisher {
        &self.inner
    }

    /// Total publish calls, failed or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), PublishError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            FailureMode::Permanent => Err(PublishError::Permanent("publisher rejected".into())),
            FailureMode::Transient(_) => {
                let failed = self
                    .remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if failed {
                    Err(anyhow::anyhow!("transient publish failure").into())
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[async_trait]
impl ResultPublisher for FailingPublisher {
    async fn publish_completion(&self, event: &CompletionEvent) -> Result<(), PublishError> {
        self.check()?;
        self.inner.publish_completion(event).await
    }

    async fn publish_comparisons(
        &self,
        batch: &BatchKey,
        results: &[ComparisonResult],
    ) -> Result<(), PublishError> {
        self.check()?;
        self.inner.publish_comparisons(batch, results).await
    }
}

/// Sleeps before every publish; used to trip processing timeouts.
#[derive(Debug, Clone)]
pub struct SlowPublisher {
    inner: RecordingPublisher,
    delay: Duration,
}

impl SlowPublisher {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: RecordingPublisher::new(),
            delay,
        }
    }

    pub fn recorded(&self) -> &RecordingPublisher {
        &self.inner
    }
}

#[async_trait]
impl ResultPublisher for SlowPublisher {
    async fn publish_completion(&self, event: &CompletionEvent) -> Result<(), PublishError> {
        tokio::time::sleep(self.delay).await;
        self.inner.publish_completion(event).await
    }

    async fn publish_comparisons(
        &self,
        batch: &BatchKey,
        results: &[ComparisonResult],
    ) -> Result<(), PublishError> {
        tokio::time::sleep(self.delay).await;
        self.inner.publish_comparisons(batch, results).await
    }
}

/// Records fallback reports with their reasons.
#[derive(Debug, Default, Clone)]
pub struct RecordingFallbackReporter {
    completions: Arc<Mutex<Vec<(CompletionEvent, String)>>>,
    comparisons: Arc<Mutex<Vec<(ComparisonResult, String)>>>,
}

impl RecordingFallbackReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completions(&self) -> Vec<(CompletionEvent, String)> {
        lock(&self.completions).clone()
    }

    pub fn comparisons(&self) -> Vec<(ComparisonResult, String)> {
        lock(&self.comparisons).clone()
    }

    pub fn completion_ids(&self) -> Vec<String> {
        lock(&self.completions)
            .iter()
            .map(|(e, _)| e.test_case_id.clone())
            .collect()
    }
}

impl FallbackReporter for RecordingFallbackReporter {
    fn report_completion(&self, event: &CompletionEvent, reason: &str) {
        lock(&self.completions).push((event.clone(), reason.to_string()));
    }

    fn report_comparisons(&self, results: &[ComparisonResult], reason: &str) {
        lock(&self.comparisons).extend(results.iter().map(|r| (r.clone(), reason.to_string())));
    }
}
