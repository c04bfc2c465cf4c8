use perfpair::adapters::{ChannelPublisher, Published};
use perfpair::app::RunManager;
use perfpair::config::QueueConfig;
use perfpair::types::{
    BatchKey, BatchingStrategy, ClassCatalog, ClassRegistration, ComparisonGroupId,
    ComparisonOutcome, CompletionEvent,
};
use perfpair_fake::{FailingPublisher, FailureMode, RecordingFallbackReporter, RecordingPublisher};
use std::sync::Arc;
use std::time::Duration;

const TS: &str = "2024-01-01T00:00:00Z";

fn samples(base: f64) -> Vec<f64> {
    (0..12).map(|i| base + f64::from(i % 4) * 0.2).collect()
}

fn three_method_class(name: &str) -> ClassRegistration {
    ClassRegistration::new(name)
        .method_in_group("Fast", name)
        .method_in_group("Medium", name)
        .method_in_group("Slow", name)
}

fn sorting_catalog() -> ClassCatalog {
    ClassCatalog::builder()
        .class(three_method_class("SortingAlgorithms"))
        .build()
        .unwrap()
}

fn sorting_events() -> Vec<CompletionEvent> {
    [("Fast", 10.0), ("Medium", 40.0), ("Slow", 90.0)]
        .into_iter()
        .map(|(m, base)| CompletionEvent::new("SortingAlgorithms", m, samples(base), TS))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_complete_every_class() {
    let classes: Vec<String> = (0..5).map(|i| format!("Suite{i}")).collect();
    let catalog = classes
        .iter()
        .fold(ClassCatalog::builder(), |b, c| b.class(three_method_class(c)))
        .build()
        .unwrap();
    let (publisher, mut published) = ChannelPublisher::new();
    let run = RunManager::builder(QueueConfig::default(), catalog, Arc::new(publisher))
        .start()
        .await
        .unwrap();

    let mut producers = Vec::new();
    for class in &classes {
        for (method, base) in [("Fast", 10.0), ("Medium", 40.0), ("Slow", 90.0)] {
            let handle = run.handle();
            let event = CompletionEvent::new(class.as_str(), method, samples(base), TS);
            producers.push(tokio::spawn(async move { handle.submit(event).await }));
        }
    }
    for producer in producers {
        producer.await.unwrap().unwrap();
    }
    let summary = run.shutdown().await;

    assert_eq!(summary.events_received, 15);
    assert_eq!(summary.batches_complete, 5);
    assert_eq!(summary.batches_timed_out, 0);
    assert_eq!(summary.comparisons_produced, 15);
    assert_eq!(summary.queue.rejected, 0);

    let mut completions = 0;
    let mut comparison_batches = Vec::new();
    while let Ok(record) = published.try_recv() {
        match record {
            Published::Completion(_) => completions += 1,
            Published::Comparisons { batch, results } => {
                assert_eq!(results.len(), 3, "{batch}");
                comparison_batches.push(batch);
            }
        }
    }
    assert_eq!(completions, 15);
    comparison_batches.sort();
    let expected: Vec<BatchKey> = classes.iter().map(BatchKey::class).collect();
    assert_eq!(comparison_batches, expected);
}

#[tokio::test]
async fn group_batching_dispatches_each_group_on_its_own() {
    let catalog = ClassCatalog::builder()
        .class(
            ClassRegistration::new("Collections")
                .method_in_group("ListAdd", "Append")
                .method_in_group("VecPush", "Append")
                .method_in_group("HashLookup", "Lookup")
                .method_in_group("TreeLookup", "Lookup"),
        )
        .build()
        .unwrap();
    let publisher = RecordingPublisher::new();
    let config = QueueConfig {
        batching_strategy: BatchingStrategy::ByComparisonGroup,
        ..QueueConfig::default()
    };
    let run = RunManager::builder(config, catalog, Arc::new(publisher.clone()))
        .start()
        .await
        .unwrap();
    let handle = run.handle();
    for (method, base) in [("ListAdd", 5.0), ("HashLookup", 2.0), ("VecPush", 4.0), ("TreeLookup", 3.0)] {
        handle
            .submit(CompletionEvent::new("Collections", method, samples(base), TS))
            .await
            .unwrap();
    }
    let summary = run.shutdown().await;

    assert_eq!(summary.batches_complete, 2);
    assert_eq!(summary.comparisons_produced, 2);
    let mut keys = publisher.comparison_batches();
    keys.sort();
    let group = |g: &str| ComparisonGroupId::new(g).unwrap();
    assert_eq!(
        keys,
        vec![
            BatchKey::class_and_group("Collections", group("Append")),
            BatchKey::class_and_group("Collections", group("Lookup")),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn missing_member_times_out_after_batch_timeout() {
    let publisher = RecordingPublisher::new();
    let config = QueueConfig {
        batch_completion_timeout_ms: 5_000,
        ..QueueConfig::default()
    };
    let run = RunManager::builder(config, sorting_catalog(), Arc::new(publisher.clone()))
        .start()
        .await
        .unwrap();
    let handle = run.handle();
    for event in sorting_events().into_iter().take(2) {
        handle.submit(event).await.unwrap();
    }

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(publisher.completions().is_empty(), "dispatched before the deadline");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(publisher.completions().len(), 2);

    let summary = run.shutdown().await;
    assert_eq!(summary.batches_timed_out, 1);
    assert_eq!(summary.timed_out_batches[0].present, 2);
    assert_eq!(summary.timed_out_batches[0].expected, 3);
    assert!(publisher.comparisons().is_empty());
}

#[tokio::test]
async fn transient_publisher_failures_are_retried() {
    let publisher = FailingPublisher::new(FailureMode::Transient(2));
    let fallback = RecordingFallbackReporter::new();
    let config = QueueConfig {
        base_retry_delay_ms: 5,
        ..QueueConfig::default()
    };
    let run = RunManager::builder(config, sorting_catalog(), Arc::new(publisher.clone()))
        .fallback(Arc::new(fallback.clone()))
        .start()
        .await
        .unwrap();
    for event in sorting_events() {
        run.handle().submit(event).await.unwrap();
    }
    let summary = run.shutdown().await;

    assert_eq!(summary.processor_failures, 0);
    assert_eq!(summary.fallback_publications, 0);
    assert_eq!(publisher.recorded().completions().len(), 3);
    assert_eq!(publisher.recorded().comparisons().len(), 3);
    assert!(fallback.completions().is_empty());
}

#[tokio::test]
async fn permanent_publisher_failure_reports_everything_through_fallback() {
    let fallback = RecordingFallbackReporter::new();
    let run = RunManager::builder(
        QueueConfig::default(),
        sorting_catalog(),
        Arc::new(FailingPublisher::new(FailureMode::Permanent)),
    )
    .fallback(Arc::new(fallback.clone()))
    .start()
    .await
    .unwrap();
    for event in sorting_events() {
        run.handle().submit(event).await.unwrap();
    }
    let summary = run.shutdown().await;

    assert_eq!(summary.processor_failures, 2);
    assert_eq!(fallback.completions().len(), 3);
    assert_eq!(fallback.comparisons().len(), 3);
    assert_eq!(summary.fallback_publications, 6);
}

#[tokio::test]
async fn failed_method_pairs_are_reported_unavailable() {
    let publisher = RecordingPublisher::new();
    let run = RunManager::builder(QueueConfig::default(), sorting_catalog(), Arc::new(publisher.clone()))
        .start()
        .await
        .unwrap();
    let mut events = sorting_events();
    events[1] = events[1].clone().failed("IndexOutOfRange");
    for event in events {
        run.handle().submit(event).await.unwrap();
    }
    let summary = run.shutdown().await;

    assert_eq!(summary.comparisons_produced, 1);
    assert_eq!(summary.comparisons_unavailable, 2);
    for result in publisher.comparisons() {
        if let ComparisonOutcome::Unavailable { reason } = &result.outcome {
            assert_eq!(reason, "comparison unavailable: method failed: Medium");
        } else {
            assert_eq!(result.pair(), ("Fast", "Slow"));
        }
    }
}

#[tokio::test]
async fn disabled_queue_bypasses_batching() {
    let publisher = RecordingPublisher::new();
    let config = QueueConfig {
        is_enabled: false,
        ..QueueConfig::default()
    };
    let run = RunManager::builder(config, sorting_catalog(), Arc::new(publisher.clone()))
        .start()
        .await
        .unwrap();
    for event in sorting_events() {
        run.handle().submit(event).await.unwrap();
    }
    // visible before shutdown: nothing was queued
    assert_eq!(publisher.completions().len(), 3);

    let summary = run.shutdown().await;
    assert_eq!(summary.direct_publications, 3);
    assert_eq!(summary.batches_complete, 0);
    assert!(publisher.comparisons().is_empty());
}
