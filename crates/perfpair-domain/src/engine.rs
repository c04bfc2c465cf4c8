use crate::ComparisonError;
use crate::detector::group_members;
use perfpair_significance::{SignificanceError, run_test};
use perfpair_stats::{clean, downsample, ensure_finite, mean, median, tukey_fences};
use perfpair_types::{
    ComparisonGroupId, ComparisonOutcome, ComparisonResult, CompletionEvent, DEFAULT_ALPHA,
    DownsampleSettings, PairStatistics, SampleSet, Significance, TestClassMetadata, TestType,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonSettings {
    pub alpha: f64,
    pub test_type: TestType,
    pub outlier_detection: bool,
    pub downsample: Option<DownsampleSettings>,
}

impl Default for ComparisonSettings {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            test_type: TestType::TTest,
            outlier_detection: true,
            downsample: None,
        }
    }
}

/// Classify a test result. `mean_a` is the before side.
///
/// Significance uses the raw p-value; rounding is for display only.
pub fn classify(p_value: f64, alpha: f64, mean_a: f64, mean_b: f64) -> Significance {
    if p_value < alpha {
        if mean_b < mean_a {
            return Significance::Improved;
        }
        if mean_b > mean_a {
            return Significance::Regressed;
        }
    }
    Significance::NoChange
}

/// One pair of a comparison group, before it is turned into a result.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    pub group: ComparisonGroupId,
    pub method_a: String,
    pub method_b: String,
    pub result: Result<PairStatistics, ComparisonError>,
}

impl PairOutcome {
    pub fn into_result(self) -> ComparisonResult {
        match self.result {
            Ok(stats) => ComparisonResult {
                group: self.group,
                method_a: self.method_a,
                method_b: self.method_b,
                outcome: ComparisonOutcome::Completed(stats),
            },
            Err(err) => ComparisonResult::unavailable(self.group, self.method_a, self.method_b, err),
        }
    }
}

struct Prepared {
    a: Vec<f64>,
    b: Vec<f64>,
    outliers_removed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ComparisonEngine {
    settings: ComparisonSettings,
}

impl ComparisonEngine {
    pub fn new(settings: ComparisonSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ComparisonSettings {
        &self.settings
    }

    /// Outlier partition of one raw sample, honoring the outlier switch.
    pub fn clean(&self, raw: &[f64]) -> SampleSet {
        if self.settings.outlier_detection {
            clean(raw)
        } else {
            SampleSet::untrimmed(raw)
        }
    }

    fn reduce(&self, values: Vec<f64>) -> Vec<f64> {
        match self.settings.downsample {
            Some(d) => downsample(&values, d.min_bound, d.max_size, d.seed),
            None => values,
        }
    }

    fn prepare(&self, before: &[f64], after: &[f64]) -> Result<Prepared, ComparisonError> {
        ensure_finite(before)?;
        ensure_finite(after)?;

        if self.settings.test_type.requires_equal_sizes() {
            return self.prepare_paired(before, after);
        }

        let (sa, sb) = (self.clean(before), self.clean(after));
        Ok(Prepared {
            outliers_removed: sa.outlier_count() + sb.outlier_count(),
            a: self.reduce(sa.cleaned),
            b: self.reduce(sb.cleaned),
        })
    }

    /// Paired samples drop whole pairs, so `a[i]` and `b[i]` stay matched.
    fn prepare_paired(&self, before: &[f64], after: &[f64]) -> Result<Prepared, ComparisonError> {
        if before.len() != after.len() {
            return Err(SignificanceError::UnequalSizes {
                a: before.len(),
                b: after.len(),
            }
            .into());
        }
        let (fa, fb) = if self.settings.outlier_detection {
            (tukey_fences(before), tukey_fences(after))
        } else {
            (None, None)
        };
        let inside = |v: f64, fences: Option<(f64, f64)>| {
            fences.is_none_or(|(lo, hi)| v >= lo && v <= hi)
        };

        let outside = |values: &[f64], fences: Option<(f64, f64)>| {
            values.iter().filter(|v| !inside(**v, fences)).count()
        };
        let outliers_removed = outside(before, fa) + outside(after, fb);

        let (a, b): (Vec<f64>, Vec<f64>) = before
            .iter()
            .zip(after)
            .filter(|(x, y)| inside(**x, fa) && inside(**y, fb))
            .map(|(x, y)| (*x, *y))
            .unzip();
        Ok(Prepared {
            outliers_removed,
            a: self.reduce(a),
            b: self.reduce(b),
        })
    }

    /// Compare `before` against `after` with the configured test.
    pub fn compare(&self, before: &[f64], after: &[f64]) -> Result<PairStatistics, ComparisonError> {
        let prepared = self.prepare(before, after)?;
        let outcome = run_test(self.settings.test_type, &prepared.a, &prepared.b)?;
        let (mean_a, mean_b) = (mean(&prepared.a)?, mean(&prepared.b)?);

        Ok(PairStatistics {
            mean_a,
            mean_b,
            median_a: median(&prepared.a)?,
            median_b: median(&prepared.b)?,
            p_value: outcome.p_value,
            test_statistic: outcome.statistic,
            test_type: self.settings.test_type,
            significance: classify(outcome.p_value, self.settings.alpha, mean_a, mean_b),
            sample_size_a: prepared.a.len(),
            sample_size_b: prepared.b.len(),
            outliers_removed: prepared.outliers_removed,
        })
    }

    /// Compare two completion events. A failed method makes the pair unavailable.
    pub fn compare_events(
        &self,
        a: &CompletionEvent,
        b: &CompletionEvent,
    ) -> Result<PairStatistics, ComparisonError> {
        for event in [a, b] {
            if !event.success {
                return Err(ComparisonError::MethodFailed {
                    method: event.method_name.clone(),
                });
            }
        }
        self.compare(&a.raw_durations_ms, &b.raw_durations_ms)
    }

    /// Every unordered pair of `group` present in `members`, in ascending
    /// method-name order.
    pub fn compare_group(
        &self,
        members: &[CompletionEvent],
        class: Option<&TestClassMetadata>,
        group: &ComparisonGroupId,
    ) -> Vec<PairOutcome> {
        let selected = group_members(members, class, group);
        let mut outcomes = Vec::new();
        for (i, a) in selected.iter().enumerate() {
            for b in &selected[i + 1..] {
                outcomes.push(PairOutcome {
                    group: group.clone(),
                    method_a: a.method_name.clone(),
                    method_b: b.method_name.clone(),
                    result: self.compare_events(a, b),
                });
            }
        }
        outcomes
    }
}
