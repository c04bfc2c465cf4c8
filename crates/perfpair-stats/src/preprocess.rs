//! Sample preprocessing: outlier trimming and deterministic downsampling.

use crate::{quantile_sorted, sorted_copy};
use perfpair_types::SampleSet;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Tukey fence multiplier applied to the interquartile range.
pub const TUKEY_K: f64 = 1.5;

/// Samples this short are never trimmed.
const MIN_TRIM_LEN: usize = 4;

/// Lower and upper Tukey fences, or `None` when the sample is too short to trim.
pub fn tukey_fences(raw: &[f64]) -> Option<(f64, f64)> {
    if raw.len() < MIN_TRIM_LEN {
        return None;
    }
    let sorted = sorted_copy(raw);
    let q1 = quantile_sorted(&sorted, 0.25).ok()?;
    let q3 = quantile_sorted(&sorted, 0.75).ok()?;
    let iqr = q3 - q1;
    Some((q1 - TUKEY_K * iqr, q3 + TUKEY_K * iqr))
}

/// Partition `raw` into cleaned values and lower/upper outliers.
///
/// Values strictly outside a fence are outliers. Input order is preserved in
/// every partition.
pub fn clean(raw: &[f64]) -> SampleSet {
    let Some((lower, upper)) = tukey_fences(raw) else {
        return SampleSet::untrimmed(raw);
    };

    let mut set = SampleSet {
        raw: raw.to_vec(),
        cleaned: Vec::with_capacity(raw.len()),
        lower_outliers: Vec::new(),
        upper_outliers: Vec::new(),
    };
    for &v in raw {
        if v < lower {
            set.lower_outliers.push(v);
        } else if v > upper {
            set.upper_outliers.push(v);
        } else {
            set.cleaned.push(v);
        }
    }
    set
}

/// Deterministically reduce `raw` to `max_size` values.
///
/// Returns `raw` unchanged when it already fits or when `max_size <= min_bound`.
/// Otherwise picks `max_size` distinct indices with a partial Fisher-Yates
/// shuffle driven by a `ChaCha8Rng` seeded from `seed`, and keeps them in
/// input order so the result covers the whole run rather than a prefix.
/// ChaCha8 output is value-stable across releases, so a given seed always
/// selects the same values.
pub fn downsample(raw: &[f64], min_bound: usize, max_size: usize, seed: u64) -> Vec<f64> {
    if raw.len() <= max_size || max_size <= min_bound {
        return raw.to_vec();
    }
    let n = raw.len() as u64;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..raw.len()).collect();
    for i in 0..max_size {
        let j = rng.gen_range(i as u64..n) as usize;
        order.swap(i, j);
    }
    let mut picked = order[..max_size].to_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| raw[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn trims_obvious_outliers() {
        let raw = [10.0, 11.0, 10.5, 10.2, 10.8, 95.0, 0.1];
        let set = clean(&raw);
        assert_eq!(set.upper_outliers, vec![95.0]);
        assert_eq!(set.lower_outliers, vec![0.1]);
        assert_eq!(set.cleaned, vec![10.0, 11.0, 10.5, 10.2, 10.8]);
        assert_eq!(set.outlier_count(), 2);
    }

    #[test]
    fn short_samples_are_never_trimmed() {
        let set = clean(&[1.0, 1000.0, 1.0]);
        assert_eq!(set.cleaned, vec![1.0, 1000.0, 1.0]);
        assert_eq!(set.outlier_count(), 0);
    }

    #[test]
    fn constant_sample_keeps_everything() {
        let set = clean(&[5.0; 10]);
        assert_eq!(set.cleaned.len(), 10);
    }

    #[test]
    fn clean_is_deterministic() {
        let raw = [3.0, 9.0, 1.0, 50.0, 4.0, 4.5, 3.3];
        assert_eq!(clean(&raw), clean(&raw));
    }

    #[test]
    fn downsample_passthrough_cases() {
        let raw: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(downsample(&raw, 3, 20, 42), raw);
        assert_eq!(downsample(&raw, 3, 25, 42), raw);
        assert_eq!(downsample(&raw, 10, 10, 42), raw);
        assert_eq!(downsample(&raw, 12, 10, 42), raw);
    }

    #[test]
    fn downsample_seed_42_is_reproducible() {
        let raw: Vec<f64> = (1..=20).map(f64::from).collect();
        let expected = vec![1.0, 3.0, 4.0, 9.0, 10.0, 14.0, 16.0, 17.0, 19.0, 20.0];
        assert_eq!(downsample(&raw, 3, 10, 42), expected);
        assert_eq!(downsample(&raw, 3, 10, 42), expected);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let raw: Vec<f64> = (1..=200).map(f64::from).collect();
        assert_ne!(downsample(&raw, 3, 20, 1), downsample(&raw, 3, 20, 2));
    }

    mod property_tests {
        use super::*;

        proptest! {
            #[test]
            fn clean_partitions_without_loss(raw in prop::collection::vec(-1e6f64..1e6, 0..300)) {
                let set = clean(&raw);
                prop_assert_eq!(
                    set.cleaned.len() + set.lower_outliers.len() + set.upper_outliers.len(),
                    raw.len()
                );
                let mut joined: Vec<f64> = set
                    .cleaned
                    .iter()
                    .chain(&set.lower_outliers)
                    .chain(&set.upper_outliers)
                    .copied()
                    .collect();
                joined.sort_by(f64::total_cmp);
                prop_assert_eq!(joined, sorted_copy(&raw));
            }

            #[test]
            fn downsample_length(
                raw in prop::collection::vec(0f64..1e3, 0..200),
                min_bound in 0usize..10,
                max_size in 0usize..100,
                seed in any::<u64>(),
            ) {
                let out = downsample(&raw, min_bound, max_size, seed);
                if max_size > min_bound {
                    prop_assert_eq!(out.len(), raw.len().min(max_size));
                } else {
                    prop_assert_eq!(out, raw);
                }
            }
        }
    }
}
