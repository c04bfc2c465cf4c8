//! Outlier trimming must partition its input, and downsampling must respect
//! its bounds, for any finite sample.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    raw: Vec<f64>,
    min_bound: u8,
    max_size: u8,
    seed: u64,
}

fuzz_target!(|input: Input| {
    let raw: Vec<f64> = input.raw.into_iter().filter(|v| v.is_finite()).collect();

    let set = perfpair_stats::clean(&raw);
    assert_eq!(
        set.cleaned.len() + set.lower_outliers.len() + set.upper_outliers.len(),
        raw.len()
    );

    let min_bound = usize::from(input.min_bound);
    let max_size = usize::from(input.max_size);
    let picked = perfpair_stats::downsample(&raw, min_bound, max_size, input.seed);
    if raw.len() <= max_size || max_size <= min_bound {
        assert_eq!(picked, raw);
    } else {
        assert_eq!(picked.len(), max_size);
    }
});
