//! Special functions used by the hypothesis tests.

use statrs::function::{erf, factorial, gamma};
use std::f64::consts::SQRT_2;

pub fn erf(x: f64) -> f64 {
    erf::erf(x)
}

pub fn ln_gamma(x: f64) -> f64 {
    gamma::ln_gamma(x)
}

/// `n choose k` as a float.
pub fn binomial(n: u64, k: u64) -> f64 {
    factorial::binomial(n, k)
}

pub fn ln_binomial(n: u64, k: u64) -> f64 {
    factorial::ln_binomial(n, k)
}

/// Standard normal CDF.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erf::erfc(-z / SQRT_2)
}

/// Two-tailed p-value of a standard normal statistic.
pub fn normal_two_tailed_p(z: f64) -> f64 {
    erf::erfc(z.abs() / SQRT_2).clamp(0.0, 1.0)
}

/// Kolmogorov survival function `Q(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)`.
///
/// Small λ uses the Jacobi theta form, which converges where the alternating
/// series does not.
pub fn kolmogorov_q(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    if lambda < 1.18 {
        let y = (-std::f64::consts::PI.powi(2) / (8.0 * lambda * lambda)).exp();
        let sqrt_2pi = (2.0 * std::f64::consts::PI).sqrt();
        let p = sqrt_2pi / lambda * (y + y.powi(9) + y.powi(25) + y.powi(49));
        (1.0 - p).clamp(0.0, 1.0)
    } else {
        let x = (-2.0 * lambda * lambda).exp();
        (2.0 * (x - x.powi(4) + x.powi(9))).clamp(0.0, 1.0)
    }
}
