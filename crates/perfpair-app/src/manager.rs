//! Run orchestration.
//!
//! One [`RunManager`] per run owns the queue, the batch map and every task of
//! the run. Producers hold a [`RunHandle`]; consumers move events from the
//! queue into batching, a sweeper seals expired batches, and a dispatcher runs
//! ready batches through the [`Pipeline`] on a bounded set of tasks.

use crate::batching::{AddOutcome, BatchingOptions, BatchingService, DispatchedBatch};
use crate::health::{HealthCounters, QueueHealth};
use crate::pipeline::{DispatchContext, Pipeline};
use crate::queue::{CompletionQueue, QueueStats};
use crate::signal::{CancelHandle, RunSignal, run_signal};
use crate::{Clock, SystemClock, lock};
use perfpair_adapters::{FallbackReporter, ResultPublisher, TracingFallbackReporter};
use perfpair_config::QueueConfig;
use perfpair_error::PerfpairError;
use perfpair_types::{BatchKey, ClassCatalog, CompletionEvent, DispatchReason};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::instrument::WithSubscriber;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use uuid::Uuid;

/// A batch that was dispatched before all of its members arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimedOutBatch {
    pub key: BatchKey,
    pub present: usize,
    pub expected: usize,
}

/// What happened during a run. Returned by [`RunManager::shutdown`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: String,
    pub ended_at: String,
    pub events_received: u64,
    pub batches_complete: u64,
    pub batches_timed_out: u64,
    pub batches_standalone: u64,
    pub comparisons_produced: u64,
    pub comparisons_unavailable: u64,
    pub fallback_publications: u64,
    pub processor_failures: u64,
    pub direct_publications: u64,
    pub queue: QueueStats,
    pub health: QueueHealth,
    pub timed_out_batches: Vec<TimedOutBatch>,
}

#[derive(Debug, Default)]
struct RunCounters {
    events_received: AtomicU64,
    batches_complete: AtomicU64,
    batches_timed_out: AtomicU64,
    batches_standalone: AtomicU64,
    comparisons_produced: AtomicU64,
    comparisons_unavailable: AtomicU64,
    fallback_publications: AtomicU64,
    processor_failures: AtomicU64,
    direct_publications: AtomicU64,
}

fn bump(counter: &AtomicU64, by: usize) {
    counter.fetch_add(by as u64, Ordering::Relaxed);
}

/// State shared by every task of one run.
struct Shared {
    run_id: Uuid,
    started_at: String,
    config: QueueConfig,
    catalog: Arc<ClassCatalog>,
    queue: CompletionQueue,
    batching: BatchingService,
    pipeline: Pipeline,
    publisher: Arc<dyn ResultPublisher>,
    fallback: Arc<dyn FallbackReporter>,
    clock: Arc<dyn Clock>,
    cancel: CancelHandle,
    counters: RunCounters,
    timed_out: Mutex<Vec<TimedOutBatch>>,
}

type DispatchSender = mpsc::UnboundedSender<DispatchedBatch>;

impl Shared {
    fn intake(&self, event: CompletionEvent, dispatch: &DispatchSender) {
        debug!(test_case = %event.test_case_id, "event dequeued");
        if let AddOutcome::Ready(batch) = self.batching.add(event, Instant::now()) {
            self.route(batch, dispatch);
        }
    }

    fn route(&self, batch: DispatchedBatch, dispatch: &DispatchSender) {
        match batch.reason {
            DispatchReason::Complete => bump(&self.counters.batches_complete, 1),
            DispatchReason::Standalone => bump(&self.counters.batches_standalone, 1),
            DispatchReason::TimedOut => {
                bump(&self.counters.batches_timed_out, 1);
                let timeout = PerfpairError::BatchTimeout {
                    key: batch.key.to_string(),
                    present: batch.members.len(),
                    expected: batch.expected,
                };
                warn!(error = %timeout, "dispatching partial batch");
                lock(&self.timed_out).push(TimedOutBatch {
                    key: batch.key.clone(),
                    present: batch.members.len(),
                    expected: batch.expected,
                });
            }
        }
        if let Err(mpsc::error::SendError(batch)) = dispatch.send(batch) {
            error!(batch = %batch.key, "dispatcher gone; reporting batch through fallback");
            for event in &batch.members {
                self.report_fallback(event, "dispatcher unavailable");
            }
        }
    }

    async fn dispatch(&self, batch: DispatchedBatch) {
        info!(
            batch = %batch.key,
            reason = ?batch.reason,
            members = batch.members.len(),
            expected = batch.expected,
            "dispatching batch"
        );
        if batch.reason != DispatchReason::Standalone {
            self.batching.mark_dispatched(&batch.key);
        }
        let mut ctx = DispatchContext::new(self.run_id, self.catalog.clone(), self.cancel.signal());
        self.pipeline.run(&batch, &mut ctx).await;

        if let Some(results) = &ctx.comparisons {
            let available = results.iter().filter(|r| r.is_available()).count();
            bump(&self.counters.comparisons_produced, available);
            bump(&self.counters.comparisons_unavailable, results.len() - available);
        }
        bump(&self.counters.processor_failures, ctx.failures.len());
        bump(&self.counters.fallback_publications, ctx.fallback_reports);
    }

    fn report_fallback(&self, event: &CompletionEvent, reason: &str) {
        if self.config.enable_fallback_publishing {
            self.fallback.report_completion(event, reason);
            bump(&self.counters.fallback_publications, 1);
        } else {
            error!(test_case = %event.test_case_id, reason, "event dropped; fallback publishing disabled");
        }
    }

    /// Queue disabled: publish straight through, falling back on failure.
    async fn publish_direct(&self, event: CompletionEvent) -> Result<(), PerfpairError> {
        let published = tokio::time::timeout(
            self.config.processing_timeout(),
            self.publisher.publish_completion(&event),
        )
        .await;
        let message = match published {
            Ok(Ok(())) => {
                bump(&self.counters.direct_publications, 1);
                return Ok(());
            }
            Ok(Err(err)) => format!("{err:#}"),
            Err(_) => format!(
                "timed out after {} ms",
                self.config.processing_timeout().as_millis()
            ),
        };
        warn!(test_case = %event.test_case_id, error = %message, "direct publish failed");
        self.report_fallback(&event, &message);
        Err(PerfpairError::Processor {
            processor: "direct-publishing".to_string(),
            message,
        })
    }

    fn health(&self) -> QueueHealth {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let c = &self.counters;
        let queue = self.queue.stats();
        QueueHealth::assess(&HealthCounters {
            queue,
            events_received: load(&c.events_received),
            errors: queue.rejected + load(&c.processor_failures),
            batches_dispatched: load(&c.batches_complete)
                + load(&c.batches_timed_out)
                + load(&c.batches_standalone),
            batches_timed_out: load(&c.batches_timed_out),
        })
    }

    fn summary(&self) -> RunSummary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let c = &self.counters;
        let mut timed_out_batches = lock(&self.timed_out).clone();
        timed_out_batches.sort_by(|a, b| a.key.cmp(&b.key));
        RunSummary {
            run_id: self.run_id,
            started_at: self.started_at.clone(),
            ended_at: self.clock.now_rfc3339(),
            events_received: load(&c.events_received),
            batches_complete: load(&c.batches_complete),
            batches_timed_out: load(&c.batches_timed_out),
            batches_standalone: load(&c.batches_standalone),
            comparisons_produced: load(&c.comparisons_produced),
            comparisons_unavailable: load(&c.comparisons_unavailable),
            fallback_publications: load(&c.fallback_publications),
            processor_failures: load(&c.processor_failures),
            direct_publications: load(&c.direct_publications),
            queue: self.queue.stats(),
            health: self.health(),
            timed_out_batches,
        }
    }
}

/// Producer side of a run. Cheap to clone into every producer task.
#[derive(Clone)]
pub struct RunHandle {
    shared: Arc<Shared>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.shared.run_id
    }

    /// Hand a finished test case to the run.
    ///
    /// Waits up to the publish timeout for queue room. A rejected event has
    /// already been reported through fallback when this returns an error.
    pub async fn submit(&self, event: CompletionEvent) -> Result<(), PerfpairError> {
        let shared = &self.shared;
        bump(&shared.counters.events_received, 1);
        debug!(test_case = %event.test_case_id, "event received");

        if !shared.config.is_enabled {
            return shared.publish_direct(event).await;
        }

        match shared.queue.enqueue(event, shared.config.publish_timeout()).await {
            Ok(()) => Ok(()),
            Err(rejected) => {
                let err = PerfpairError::from(&rejected);
                warn!(error = %err, "event rejected by queue");
                shared.report_fallback(rejected.event(), &err.to_string());
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.queue.stats()
    }

    /// Current queue health. Logs the findings when the queue is not healthy.
    pub fn health(&self) -> QueueHealth {
        let health = self.shared.health();
        if !health.is_healthy() {
            warn!(level = ?health.level, findings = ?health.findings, "queue health");
        }
        health
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.signal().is_cancelled()
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.shared.run_id)
            .finish_non_exhaustive()
    }
}

/// Configures and starts a run.
pub struct RunManagerBuilder {
    config: QueueConfig,
    catalog: Arc<ClassCatalog>,
    publisher: Arc<dyn ResultPublisher>,
    fallback: Arc<dyn FallbackReporter>,
    clock: Arc<dyn Clock>,
}

impl RunManagerBuilder {
    pub fn fallback(mut self, fallback: Arc<dyn FallbackReporter>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and spawn the run's tasks.
    ///
    /// Configuration errors are fatal: nothing is spawned.
    pub async fn start(self) -> Result<RunManager, PerfpairError> {
        if let Err(err) = self.config.validate() {
            error!(error = %err, "refusing to start run");
            return Err(err.into());
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        let (cancel, signal) = run_signal();
        let config = self.config;
        let batching = BatchingService::new(
            self.catalog.clone(),
            BatchingOptions {
                enabled: config.enable_batch_processing,
                strategy: config.batching_strategy,
                max_batch_size: config.max_batch_size,
                completion_timeout: config.batch_completion_timeout(),
            },
        );
        let pipeline = Pipeline::from_config(&config, self.publisher.clone(), self.fallback.clone());

        let shared = Arc::new(Shared {
            run_id,
            started_at: self.clock.now_rfc3339(),
            queue: CompletionQueue::new(config.max_queue_capacity),
            catalog: self.catalog,
            batching,
            pipeline,
            publisher: self.publisher,
            fallback: self.fallback,
            clock: self.clock,
            cancel,
            counters: RunCounters::default(),
            timed_out: Mutex::new(Vec::new()),
            config,
        });

        span.in_scope(|| {
            info!(
                enabled = shared.config.is_enabled,
                capacity = shared.config.max_queue_capacity,
                consumers = shared.config.consumer_count,
                processors = ?shared.pipeline.processor_names(),
                "run started"
            )
        });

        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let consumers = (0..shared.config.consumer_count)
            .map(|id| {
                tokio::spawn(
                    consume(shared.clone(), dispatch_tx.clone(), signal.clone())
                        .instrument(info_span!(parent: &span, "consumer", id))
                        .with_current_subscriber(),
                )
            })
            .collect();
        let sweeper = tokio::spawn(
            sweep(shared.clone(), dispatch_tx.clone(), signal)
                .instrument(span.clone())
                .with_current_subscriber(),
        );
        let dispatcher = tokio::spawn(
            run_dispatcher(shared.clone(), dispatch_rx)
                .instrument(span.clone())
                .with_current_subscriber(),
        );

        Ok(RunManager {
            shared,
            span,
            tasks: Some(RunTasks {
                consumers,
                sweeper,
                dispatcher,
                dispatch_tx,
            }),
        })
    }
}

struct RunTasks {
    consumers: Vec<JoinHandle<()>>,
    sweeper: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    dispatch_tx: DispatchSender,
}

/// A running run. Call [`RunManager::shutdown`] to drain it and collect the
/// [`RunSummary`]; dropping it cancels the run instead.
pub struct RunManager {
    shared: Arc<Shared>,
    span: Span,
    tasks: Option<RunTasks>,
}

impl RunManager {
    pub fn builder(
        config: QueueConfig,
        catalog: impl Into<Arc<ClassCatalog>>,
        publisher: Arc<dyn ResultPublisher>,
    ) -> RunManagerBuilder {
        RunManagerBuilder {
            config,
            catalog: catalog.into(),
            publisher,
            fallback: Arc::new(TracingFallbackReporter),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.shared.run_id
    }

    pub fn handle(&self) -> RunHandle {
        RunHandle {
            shared: self.shared.clone(),
        }
    }

    /// Cancel the run: stop intake, interrupt retries and in-flight
    /// comparisons, and flush open batches as timed out.
    pub fn cancel(&self) {
        self.span.in_scope(|| info!("run cancelled"));
        self.shared.cancel.cancel();
        self.shared.queue.close();
    }

    /// Close the queue, drain it, flush open batches as timed out and wait for
    /// every dispatch to finish.
    pub async fn shutdown(mut self) -> RunSummary {
        let shared = self.shared.clone();
        let span = self.span.clone();
        let Some(tasks) = self.tasks.take() else {
            return shared.summary();
        };
        async move {
            shared.queue.close();
            for consumer in tasks.consumers {
                log_join("consumer", consumer.await);
            }

            // consumers stop early on cancellation
            for event in shared.queue.drain_now().await {
                shared.intake(event, &tasks.dispatch_tx);
            }

            tasks.sweeper.abort();
            match tasks.sweeper.await {
                Err(err) if err.is_cancelled() => {}
                other => log_join("sweeper", other),
            }
            for batch in shared.batching.flush_open() {
                shared.route(batch, &tasks.dispatch_tx);
            }

            drop(tasks.dispatch_tx);
            log_join("dispatcher", tasks.dispatcher.await);

            let summary = shared.summary();
            info!(
                events = summary.events_received,
                complete = summary.batches_complete,
                timed_out = summary.batches_timed_out,
                comparisons = summary.comparisons_produced,
                unavailable = summary.comparisons_unavailable,
                fallback = summary.fallback_publications,
                health = ?summary.health.level,
                "run finished"
            );
            summary
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for RunManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunManager")
            .field("run_id", &self.shared.run_id)
            .field("running", &self.tasks.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for RunManager {
    fn drop(&mut self) {
        if self.tasks.is_some() {
            self.span.in_scope(|| warn!("run dropped without shutdown; cancelling"));
            self.shared.cancel.cancel();
            self.shared.queue.close();
        }
    }
}

fn log_join(task: &str, joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        error!(task, error = %err, "run task failed");
    }
}

async fn consume(shared: Arc<Shared>, dispatch: DispatchSender, mut signal: RunSignal) {
    while let Some(event) = shared.queue.dequeue(&mut signal).await {
        shared.intake(event, &dispatch);
    }
    debug!("consumer stopped");
}

async fn sweep(shared: Arc<Shared>, dispatch: DispatchSender, mut signal: RunSignal) {
    let mut ticker = tokio::time::interval(shared.config.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for batch in shared.batching.sweep_expired(Instant::now()) {
                    shared.route(batch, &dispatch);
                }
            }
            _ = signal.cancelled() => {
                for batch in shared.batching.flush_open() {
                    shared.route(batch, &dispatch);
                }
                return;
            }
        }
    }
}

async fn run_dispatcher(shared: Arc<Shared>, mut batches: mpsc::UnboundedReceiver<DispatchedBatch>) {
    let permits = Arc::new(Semaphore::new(shared.config.max_concurrent_dispatches));
    let mut in_flight = JoinSet::new();
    while let Some(batch) = batches.recv().await {
        while let Some(done) = in_flight.try_join_next() {
            log_join("dispatch", done);
        }
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let shared = shared.clone();
        in_flight.spawn(
            async move {
                let _permit = permit;
                shared.dispatch(batch).await;
            }
            .in_current_span()
            .with_current_subscriber(),
        );
    }
    while let Some(done) = in_flight.join_next().await {
        log_join("dispatch", done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedClock, TS, sorting_catalog, sorting_event};
    use perfpair_error::ConfigError;
    use perfpair_fake::{FailingPublisher, FailureMode, RecordingFallbackReporter, RecordingPublisher};
    use std::time::Duration;

    fn config() -> QueueConfig {
        QueueConfig {
            batch_completion_timeout_ms: 1_000,
            ..QueueConfig::default()
        }
    }

    async fn start(
        config: QueueConfig,
        publisher: Arc<dyn ResultPublisher>,
        fallback: &RecordingFallbackReporter,
    ) -> RunManager {
        RunManager::builder(config, sorting_catalog(), publisher)
            .fallback(Arc::new(fallback.clone()))
            .clock(Arc::new(FixedClock(TS)))
            .start()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn complete_batch_publishes_completions_and_comparisons() {
        let publisher = RecordingPublisher::new();
        let fallback = RecordingFallbackReporter::new();
        let run = start(config(), Arc::new(publisher.clone()), &fallback).await;
        let handle = run.handle();
        for (method, base) in [("BubbleSort", 90.0), ("QuickSort", 10.0), ("LinqSort", 20.0)] {
            handle.submit(sorting_event(method, base)).await.unwrap();
        }
        let summary = run.shutdown().await;

        assert_eq!(summary.events_received, 3);
        assert_eq!(summary.batches_complete, 1);
        assert_eq!(summary.batches_timed_out, 0);
        assert_eq!(summary.comparisons_produced, 3);
        assert_eq!(summary.comparisons_unavailable, 0);
        assert_eq!(summary.fallback_publications, 0);
        assert!(summary.health.is_healthy(), "{:?}", summary.health);
        assert_eq!(summary.started_at, TS);
        assert_eq!(summary.queue.enqueued, 3);
        assert_eq!(summary.queue.depth, 0);
        assert_eq!(publisher.completions().len(), 3);
        assert_eq!(publisher.comparisons().len(), 3);
        assert_eq!(
            handle
                .shared
                .batching
                .state_of(&BatchKey::class("SortingAlgorithms")),
            Some(perfpair_types::BatchState::Dispatched)
        );
        assert!(fallback.completions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn partial_batch_times_out_once() {
        let publisher = RecordingPublisher::new();
        let fallback = RecordingFallbackReporter::new();
        let run = start(config(), Arc::new(publisher.clone()), &fallback).await;
        let handle = run.handle();
        handle.submit(sorting_event("BubbleSort", 90.0)).await.unwrap();
        handle.submit(sorting_event("QuickSort", 10.0)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(publisher.completions().len(), 2);

        let summary = run.shutdown().await;
        assert_eq!(summary.batches_timed_out, 1);
        assert_eq!(summary.batches_complete, 0);
        assert_eq!(
            summary.timed_out_batches,
            vec![TimedOutBatch {
                key: BatchKey::class("SortingAlgorithms"),
                present: 2,
                expected: 3,
            }]
        );
        // partial group under test-case-count detection
        assert!(publisher.comparisons().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_flushes_open_batches() {
        let publisher = RecordingPublisher::new();
        let fallback = RecordingFallbackReporter::new();
        let run = start(
            QueueConfig {
                batch_completion_timeout_ms: 600_000,
                ..config()
            },
            Arc::new(publisher.clone()),
            &fallback,
        )
        .await;
        let handle = run.handle();
        handle.submit(sorting_event("BubbleSort", 90.0)).await.unwrap();
        tokio::task::yield_now().await;

        run.cancel();
        let late = handle.submit(sorting_event("LinqSort", 20.0)).await.unwrap_err();
        assert!(matches!(late, PerfpairError::QueueClosed { .. }));
        assert!(handle.is_cancelled());

        let summary = run.shutdown().await;
        assert_eq!(summary.batches_timed_out, 1);
        assert_eq!(publisher.completions().len(), 1);
        assert_eq!(fallback.completion_ids(), vec!["SortingAlgorithms.LinqSort".to_string()]);
        assert_eq!(summary.fallback_publications, 1);
    }

    #[tokio::test]
    async fn overflow_event_goes_to_fallback() {
        let publisher = RecordingPublisher::new();
        let fallback = RecordingFallbackReporter::new();
        let run = start(
            QueueConfig {
                max_queue_capacity: 2,
                max_batch_size: 2,
                publish_timeout_ms: 0,
                ..config()
            },
            Arc::new(publisher.clone()),
            &fallback,
        )
        .await;
        let handle = run.handle();

        // single-threaded runtime: consumers cannot run until this task yields
        handle.submit(sorting_event("BubbleSort", 90.0)).await.unwrap();
        handle.submit(sorting_event("QuickSort", 10.0)).await.unwrap();
        let err = handle.submit(sorting_event("LinqSort", 20.0)).await.unwrap_err();
        assert!(matches!(
            err,
            PerfpairError::QueueFull { ref test_case_id, timeout_ms: 0 } if test_case_id == "SortingAlgorithms.LinqSort"
        ));
        assert_eq!(fallback.completion_ids(), vec!["SortingAlgorithms.LinqSort".to_string()]);
        assert_eq!(handle.stats().rejected, 1);
        let health = handle.health();
        assert_eq!(health.level, crate::HealthLevel::Unhealthy);
        assert_eq!(health.depth, 2);
        assert_eq!(health.findings.len(), 2, "{:?}", health.findings);

        let summary = run.shutdown().await;
        assert_eq!(summary.queue.enqueued, 2);
        assert_eq!(summary.fallback_publications, 1);
        assert_eq!(publisher.completions().len(), 2);
    }

    #[tokio::test]
    async fn disabled_queue_publishes_directly() {
        let publisher = RecordingPublisher::new();
        let fallback = RecordingFallbackReporter::new();
        let run = start(
            QueueConfig {
                is_enabled: false,
                ..config()
            },
            Arc::new(publisher.clone()),
            &fallback,
        )
        .await;
        run.handle().submit(sorting_event("BubbleSort", 90.0)).await.unwrap();
        let summary = run.shutdown().await;

        assert_eq!(summary.direct_publications, 1);
        assert_eq!(summary.queue.enqueued, 0);
        assert_eq!(publisher.completions().len(), 1);
        assert!(publisher.comparisons().is_empty());
    }

    #[tokio::test]
    async fn disabled_queue_falls_back_when_publisher_fails() {
        let fallback = RecordingFallbackReporter::new();
        let run = start(
            QueueConfig {
                is_enabled: false,
                ..config()
            },
            Arc::new(FailingPublisher::new(FailureMode::Permanent)),
            &fallback,
        )
        .await;
        let err = run
            .handle()
            .submit(sorting_event("BubbleSort", 90.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PerfpairError::Processor { .. }));
        assert_eq!(fallback.completions().len(), 1);
        run.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_config_is_fatal() {
        let err = RunManager::builder(
            QueueConfig {
                max_queue_capacity: 0,
                alpha_level: 1.5,
                ..QueueConfig::default()
            },
            sorting_catalog(),
            Arc::new(RecordingPublisher::new()),
        )
        .start()
        .await
        .err()
        .unwrap();
        assert!(err.is_fatal());
        match err {
            // capacity, alpha, and batch size exceeding capacity
            PerfpairError::Config(ConfigError::Invalid(violations)) => assert_eq!(violations.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unregistered_class_dispatches_standalone() {
        let publisher = RecordingPublisher::new();
        let fallback = RecordingFallbackReporter::new();
        let run = start(config(), Arc::new(publisher.clone()), &fallback).await;
        run.handle()
            .submit(CompletionEvent::new("Unknown", "Run", vec![1.0, 2.0, 3.0], TS))
            .await
            .unwrap();
        let summary = run.shutdown().await;
        assert_eq!(summary.batches_complete, 1);
        assert_eq!(publisher.completions().len(), 1);
    }

    #[test]
    fn summary_serializes_to_json() {
        let summary = RunSummary {
            run_id: Uuid::nil(),
            started_at: TS.into(),
            ended_at: TS.into(),
            events_received: 3,
            batches_complete: 1,
            batches_timed_out: 0,
            batches_standalone: 0,
            comparisons_produced: 3,
            comparisons_unavailable: 0,
            fallback_publications: 0,
            processor_failures: 0,
            direct_publications: 0,
            queue: QueueStats::default(),
            health: QueueHealth::assess(&HealthCounters::default()),
            timed_out_batches: Vec::new(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["run_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["comparisons_produced"], 3);
        assert_eq!(json["health"]["level"], "Healthy");
    }
}
