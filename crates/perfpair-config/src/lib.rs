//! Run configuration for perfpair.
//!
//! Field names follow the host's camelCase convention. Every field has a
//! default, so an empty document is a valid configuration. Locating the file
//! is the host's job; this crate only parses and validates.

use perfpair_domain::ComparisonSettings;
use perfpair_error::ConfigError;
use perfpair_types::{
    BatchingStrategy, ComparisonDetectionStrategy, DEFAULT_ALPHA, DownsampleSettings, TestType,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest sample any downsampling may leave behind.
pub const MIN_DOWNSAMPLE_BOUND: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct QueueConfig {
    /// When false, completions bypass the queue and are published directly.
    pub is_enabled: bool,
    pub max_queue_capacity: usize,
    /// How long `submit` waits on a full queue; 0 rejects immediately.
    pub publish_timeout_ms: u64,
    pub processing_timeout_ms: u64,
    pub batch_completion_timeout_ms: u64,
    pub max_retry_attempts: u32,
    pub base_retry_delay_ms: u64,
    pub enable_batch_processing: bool,
    pub max_batch_size: usize,
    pub enable_framework_publishing: bool,
    pub enable_logging_processor: bool,
    pub enable_method_comparison: bool,
    pub comparison_detection_strategy: ComparisonDetectionStrategy,
    pub comparison_timeout_ms: u64,
    pub enable_fallback_publishing: bool,
    pub alpha_level: f64,
    pub test_type: TestType,
    pub enable_outlier_detection: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downsample: Option<DownsampleSettings>,
    pub batching_strategy: BatchingStrategy,
    /// Queue consumer tasks.
    pub consumer_count: usize,
    /// Batches processed concurrently.
    pub max_concurrent_dispatches: usize,
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            is_enabled: true,
            max_queue_capacity: 1000,
            publish_timeout_ms: 5_000,
            processing_timeout_ms: 30_000,
            batch_completion_timeout_ms: 60_000,
            max_retry_attempts: 3,
            base_retry_delay_ms: 1_000,
            enable_batch_processing: true,
            max_batch_size: 50,
            enable_framework_publishing: true,
            enable_logging_processor: false,
            enable_method_comparison: true,
            comparison_detection_strategy: ComparisonDetectionStrategy::ByTestCaseCount,
            comparison_timeout_ms: 30_000,
            enable_fallback_publishing: true,
            alpha_level: DEFAULT_ALPHA,
            test_type: TestType::TTest,
            enable_outlier_detection: true,
            downsample: None,
            batching_strategy: BatchingStrategy::ByTestClass,
            consumer_count: 2,
            max_concurrent_dispatches: 4,
            log_level: "info".to_string(),
        }
    }
}

impl QueueConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: QueueConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field, reporting all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let mut positive = |value: u64, name: &str| {
            if value == 0 {
                errors.push(format!("{name} must be > 0"));
            }
        };
        positive(self.max_queue_capacity as u64, "maxQueueCapacity");
        positive(self.processing_timeout_ms, "processingTimeoutMs");
        positive(self.batch_completion_timeout_ms, "batchCompletionTimeoutMs");
        positive(self.comparison_timeout_ms, "comparisonTimeoutMs");
        positive(self.base_retry_delay_ms, "baseRetryDelayMs");
        positive(self.max_batch_size as u64, "maxBatchSize");
        positive(self.consumer_count as u64, "consumerCount");
        positive(self.max_concurrent_dispatches as u64, "maxConcurrentDispatches");

        if !(self.alpha_level > 0.0 && self.alpha_level < 1.0) {
            errors.push(format!(
                "alphaLevel must be in (0, 1), got {}",
                self.alpha_level
            ));
        }
        if self.enable_batch_processing && self.max_batch_size > self.max_queue_capacity {
            errors.push(format!(
                "maxBatchSize ({}) must not exceed maxQueueCapacity ({}) when batching is enabled",
                self.max_batch_size, self.max_queue_capacity
            ));
        }
        if let Some(d) = &self.downsample {
            if d.min_bound < MIN_DOWNSAMPLE_BOUND {
                errors.push(format!(
                    "downsample.minBound must be >= {MIN_DOWNSAMPLE_BOUND}, got {}",
                    d.min_bound
                ));
            }
            if d.max_size <= d.min_bound {
                errors.push(format!(
                    "downsample.maxSize ({}) must exceed downsample.minBound ({})",
                    d.max_size, d.min_bound
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    pub fn comparison_settings(&self) -> ComparisonSettings {
        ComparisonSettings {
            alpha: self.alpha_level,
            test_type: self.test_type,
            outlier_detection: self.enable_outlier_detection,
            downsample: self.downsample,
        }
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_millis(self.processing_timeout_ms)
    }

    pub fn batch_completion_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_completion_timeout_ms)
    }

    pub fn comparison_timeout(&self) -> Duration {
        Duration::from_millis(self.comparison_timeout_ms)
    }

    pub fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.base_retry_delay_ms)
    }

    /// Period of the expired-batch sweep: a quarter of the batch timeout,
    /// kept within [10 ms, 10 s].
    pub fn sweep_interval(&self) -> Duration {
        (self.batch_completion_timeout() / 4)
            .clamp(Duration::from_millis(10), Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn violations(config: &QueueConfig) -> Vec<String> {
        match config.validate() {
            Ok(()) => Vec::new(),
            Err(ConfigError::Invalid(v)) => v,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_queue_capacity, 1000);
        assert_eq!(config.comparison_settings(), ComparisonSettings::default());
    }

    #[test]
    fn empty_toml_yields_defaults() {
        assert_eq!(QueueConfig::from_toml_str("").unwrap(), QueueConfig::default());
    }

    #[test]
    fn toml_uses_camel_case_names() {
        let config = QueueConfig::from_toml_str(
            r#"
            maxQueueCapacity = 8
            maxBatchSize = 4
            publishTimeoutMs = 0
            testType = "MannWhitneyWilcoxon"
            comparisonDetectionStrategy = "Always"
            batchingStrategy = "ByComparisonGroup"

            [downsample]
            minBound = 3
            maxSize = 10
            seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.max_queue_capacity, 8);
        assert_eq!(config.publish_timeout_ms, 0);
        assert_eq!(config.test_type, TestType::MannWhitneyWilcoxon);
        assert_eq!(config.comparison_detection_strategy, ComparisonDetectionStrategy::Always);
        assert_eq!(config.batching_strategy, BatchingStrategy::ByComparisonGroup);
        assert_eq!(config.downsample.map(|d| d.seed), Some(42));
    }

    #[test]
    fn unknown_fields_are_parse_errors() {
        assert!(matches!(
            QueueConfig::from_toml_str("maxQueueCapacty = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn reports_every_violation() {
        let config = QueueConfig {
            max_queue_capacity: 0,
            processing_timeout_ms: 0,
            alpha_level: 1.5,
            consumer_count: 0,
            ..QueueConfig::default()
        };
        let v = violations(&config);
        assert!(v.iter().any(|m| m.starts_with("maxQueueCapacity")));
        assert!(v.iter().any(|m| m.starts_with("processingTimeoutMs")));
        assert!(v.iter().any(|m| m.starts_with("alphaLevel")));
        assert!(v.iter().any(|m| m.starts_with("consumerCount")));
        assert!(v.iter().any(|m| m.starts_with("maxBatchSize (50)")));
        assert_eq!(v.len(), 5);
    }

    #[test]
    fn batch_size_bound_only_applies_with_batching() {
        let config = QueueConfig {
            max_queue_capacity: 10,
            max_batch_size: 20,
            enable_batch_processing: false,
            ..QueueConfig::default()
        };
        assert!(config.validate().is_ok());
        let batching = QueueConfig {
            enable_batch_processing: true,
            ..config
        };
        assert_eq!(violations(&batching).len(), 1);
    }

    #[test]
    fn downsample_bounds_checked() {
        let config = QueueConfig {
            downsample: Some(DownsampleSettings {
                min_bound: 2,
                max_size: 2,
                seed: 0,
            }),
            ..QueueConfig::default()
        };
        assert_eq!(violations(&config).len(), 2);
    }

    #[test]
    fn nan_alpha_rejected() {
        let config = QueueConfig {
            alpha_level: f64::NAN,
            ..QueueConfig::default()
        };
        assert_eq!(violations(&config).len(), 1);
    }

    #[test]
    fn sweep_interval_is_clamped() {
        let fast = QueueConfig {
            batch_completion_timeout_ms: 8,
            ..QueueConfig::default()
        };
        assert_eq!(fast.sweep_interval(), Duration::from_millis(10));
        assert_eq!(QueueConfig::default().sweep_interval(), Duration::from_secs(10));
        let mid = QueueConfig {
            batch_completion_timeout_ms: 2_000,
            ..QueueConfig::default()
        };
        assert_eq!(mid.sweep_interval(), Duration::from_millis(500));
    }

    #[test]
    fn json_round_trip_keeps_field_names() {
        let json = serde_json::to_value(QueueConfig::default()).unwrap();
        assert_eq!(json["maxQueueCapacity"], 1000);
        assert_eq!(json["enableFallbackPublishing"], true);
        assert!(json.get("downsample").is_none());
    }

    proptest! {
        #[test]
        fn alpha_inside_unit_interval_is_valid(alpha in 0.0001f64..0.9999) {
            let config = QueueConfig { alpha_level: alpha, ..QueueConfig::default() };
            prop_assert!(config.validate().is_ok());
        }
    }
}
