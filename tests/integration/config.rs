use perfpair::config::QueueConfig;
use perfpair::error::{ConfigError, PerfpairError};
use perfpair::types::{BatchingStrategy, ClassCatalog, ComparisonDetectionStrategy, TestType};
use perfpair::RunManager;
use perfpair_fake::RecordingPublisher;
use std::sync::Arc;

const HOST_CONFIG: &str = r#"
maxQueueCapacity = 64
publishTimeoutMs = 250
batchCompletionTimeoutMs = 2000
comparisonDetectionStrategy = "Always"
testType = "MannWhitneyWilcoxon"
alphaLevel = 0.01
batchingStrategy = "ByComparisonGroup"
maxBatchSize = 16
"#;

#[test]
fn host_toml_overrides_defaults() {
    let config = QueueConfig::from_toml_str(HOST_CONFIG).unwrap();
    assert_eq!(config.max_queue_capacity, 64);
    assert_eq!(config.publish_timeout_ms, 250);
    assert_eq!(
        config.comparison_detection_strategy,
        ComparisonDetectionStrategy::Always
    );
    assert_eq!(config.test_type, TestType::MannWhitneyWilcoxon);
    assert_eq!(config.batching_strategy, BatchingStrategy::ByComparisonGroup);
    assert_eq!(config.comparison_settings().alpha, 0.01);
    // untouched fields keep their defaults
    assert_eq!(config.max_retry_attempts, 3);
    assert!(config.enable_fallback_publishing);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = QueueConfig::from_toml_str("maxQueueCapcity = 5").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[tokio::test]
async fn invalid_config_never_starts_a_run() {
    let config = QueueConfig {
        processing_timeout_ms: 0,
        ..QueueConfig::default()
    };
    let publisher = RecordingPublisher::new();
    let err = RunManager::builder(config, ClassCatalog::default(), Arc::new(publisher.clone()))
        .start()
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, PerfpairError::Config(ConfigError::Invalid(_))));
    assert!(publisher.completions().is_empty());
}
