//! Every hypothesis test either rejects its input or returns a p-value in [0, 1].

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use perfpair_types::TestType;

#[derive(Arbitrary, Debug, Clone, Copy)]
enum FuzzTest {
    TTest,
    RankSum,
    SignedRank,
    Ks,
}

impl FuzzTest {
    fn to_test_type(self) -> TestType {
        match self {
            FuzzTest::TTest => TestType::TTest,
            FuzzTest::RankSum => TestType::MannWhitneyWilcoxon,
            FuzzTest::SignedRank => TestType::WilcoxonSignedRank,
            FuzzTest::Ks => TestType::KolmogorovSmirnov,
        }
    }
}

#[derive(Arbitrary, Debug)]
struct Input {
    test: FuzzTest,
    a: Vec<f64>,
    b: Vec<f64>,
}

fuzz_target!(|input: Input| {
    // keep magnitudes sane; overflow to infinity is rejected upstream
    let sane = |v: &f64| v.is_finite() && v.abs() < 1e12;
    let a: Vec<f64> = input.a.iter().copied().filter(sane).take(200).collect();
    let b: Vec<f64> = input.b.iter().copied().filter(sane).take(200).collect();

    if let Ok(outcome) = perfpair_significance::run_test(input.test.to_test_type(), &a, &b) {
        assert!(
            (0.0..=1.0).contains(&outcome.p_value),
            "p = {} for {:?}",
            outcome.p_value,
            input.test
        );
    }
});
