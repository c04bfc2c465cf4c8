//! Shared types for perfpair.
//!
//! Design goal: explicit, immutable, boring.
//! Completion events come in from the execution engine, comparison results go
//! out to whatever formatter or publisher the host wires up.

use perfpair_error::{ValidationError, validate_name};
use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt;

mod catalog;

pub use catalog::{ClassCatalog, ClassCatalogBuilder, ClassRegistration, MethodMetadata, TestClassMetadata};

/// Default significance threshold.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Validated comparison-group tag.
///
/// Built once at registration time; runtime code never matches on raw strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ComparisonGroupId(String);

impl ComparisonGroupId {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComparisonGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ComparisonGroupId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for ComparisonGroupId {
    fn schema_name() -> Cow<'static, str> {
        "ComparisonGroupId".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "string",
            "minLength": 1,
            "maxLength": perfpair_error::MAX_NAME_LEN,
        })
    }
}

/// Grouping key of a batch: the test class, optionally narrowed to one group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchKey {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<ComparisonGroupId>,
}

impl BatchKey {
    pub fn class(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            group: None,
        }
    }

    pub fn class_and_group(class: impl Into<String>, group: ComparisonGroupId) -> Self {
        Self {
            class: class.into(),
            group: Some(group),
        }
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}/{}", self.class, group),
            None => f.write_str(&self.class),
        }
    }
}

/// One finished test case, as reported by the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CompletionEvent {
    pub test_case_id: String,
    pub test_class_name: String,
    pub method_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_group: Option<ComparisonGroupId>,

    /// Per-iteration wall durations, in milliseconds.
    pub raw_durations_ms: Vec<f64>,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,

    /// RFC 3339 completion time.
    pub timestamp: String,
}

impl CompletionEvent {
    /// Successful completion with test case id `Class.Method`.
    pub fn new(
        class: impl Into<String>,
        method: impl Into<String>,
        raw_durations_ms: Vec<f64>,
        timestamp: impl Into<String>,
    ) -> Self {
        let test_class_name = class.into();
        let method_name = method.into();
        Self {
            test_case_id: format!("{test_class_name}.{method_name}"),
            test_class_name,
            method_name,
            comparison_group: None,
            raw_durations_ms,
            success: true,
            exception: None,
            timestamp: timestamp.into(),
        }
    }

    pub fn with_group(mut self, group: ComparisonGroupId) -> Self {
        self.comparison_group = Some(group);
        self
    }

    pub fn with_test_case_id(mut self, id: impl Into<String>) -> Self {
        self.test_case_id = id.into();
        self
    }

    pub fn failed(mut self, exception: impl Into<String>) -> Self {
        self.success = false;
        self.exception = Some(exception.into());
        self
    }
}

/// Outlier partition of one raw sample vector.
///
/// `cleaned`, `lower_outliers` and `upper_outliers` together hold exactly the
/// elements of `raw`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SampleSet {
    pub raw: Vec<f64>,
    pub cleaned: Vec<f64>,
    pub lower_outliers: Vec<f64>,
    pub upper_outliers: Vec<f64>,
}

impl SampleSet {
    /// A sample set with nothing trimmed.
    pub fn untrimmed(raw: &[f64]) -> Self {
        Self {
            raw: raw.to_vec(),
            cleaned: raw.to_vec(),
            lower_outliers: Vec::new(),
            upper_outliers: Vec::new(),
        }
    }

    pub fn outlier_count(&self) -> usize {
        self.lower_outliers.len() + self.upper_outliers.len()
    }
}

/// Deterministic uniform downsampling applied after outlier trimming.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct DownsampleSettings {
    /// Samples at or below this size are never reduced.
    pub min_bound: usize,
    pub max_size: usize,
    pub seed: u64,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
pub enum TestType {
    #[default]
    TTest,
    MannWhitneyWilcoxon,
    WilcoxonSignedRank,
    KolmogorovSmirnov,
}

impl TestType {
    pub fn requires_equal_sizes(self) -> bool {
        matches!(self, TestType::WilcoxonSignedRank)
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestType::TTest => "t-test",
            TestType::MannWhitneyWilcoxon => "mann-whitney-wilcoxon",
            TestType::WilcoxonSignedRank => "wilcoxon-signed-rank",
            TestType::KolmogorovSmirnov => "kolmogorov-smirnov",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum Significance {
    Improved,
    Regressed,
    NoChange,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
pub enum ComparisonDetectionStrategy {
    /// Compare only when every method declared in the group ran.
    #[default]
    ByTestCaseCount,
    /// Compare whenever two or more group members are present.
    Always,
    Never,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
pub enum BatchingStrategy {
    #[default]
    ByTestClass,
    ByComparisonGroup,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BatchState {
    Open,
    Complete,
    TimedOut,
    Dispatched,
}

/// Why a batch left the batching service.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum DispatchReason {
    Complete,
    TimedOut,
    /// Batching disabled, or a late/duplicate event for an already dispatched key.
    Standalone,
}

/// Numeric outcome of one pairwise comparison. `a` is the before side.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PairStatistics {
    pub mean_a: f64,
    pub mean_b: f64,
    pub median_a: f64,
    pub median_b: f64,
    pub p_value: f64,
    pub test_statistic: f64,
    pub test_type: TestType,
    pub significance: Significance,
    pub sample_size_a: usize,
    pub sample_size_b: usize,
    /// Values outside the outlier fences, summed over both sides. Paired tests
    /// also drop each outlier's partner so the sides stay matched; partners are
    /// not counted here, so `sample_size_a` can be smaller than the raw size
    /// minus the `a`-side outliers.
    pub outliers_removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    Completed(PairStatistics),
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ComparisonResult {
    pub group: ComparisonGroupId,
    pub method_a: String,
    pub method_b: String,
    pub outcome: ComparisonOutcome,
}

impl ComparisonResult {
    pub fn unavailable(
        group: ComparisonGroupId,
        method_a: impl Into<String>,
        method_b: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self {
            group,
            method_a: method_a.into(),
            method_b: method_b.into(),
            outcome: ComparisonOutcome::Unavailable {
                reason: format!("comparison unavailable: {reason}"),
            },
        }
    }

    pub fn statistics(&self) -> Option<&PairStatistics> {
        match &self.outcome {
            ComparisonOutcome::Completed(stats) => Some(stats),
            ComparisonOutcome::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.statistics().is_some()
    }

    pub fn significance(&self) -> Option<Significance> {
        self.statistics().map(|s| s.significance)
    }

    /// Unordered pair identity, independent of which side is `a`.
    pub fn pair(&self) -> (&str, &str) {
        if self.method_a <= self.method_b {
            (&self.method_a, &self.method_b)
        } else {
            (&self.method_b, &self.method_a)
        }
    }
}
