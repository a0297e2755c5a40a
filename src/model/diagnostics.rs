//! Residual diagnostics
//!
//! The Shapiro–Wilk W test uses Royston's (1995) approximation of the
//! coefficients and of the null distribution of W, valid for 3 ≤ n ≤ 5000.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Result of a normality test on model residuals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalityTest {
    /// Shapiro–Wilk W
    pub statistic: f64,
    pub p_value: f64,
    pub n: usize,
}

const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Shapiro–Wilk test of normality
///
/// Returns `None` when the test is undefined: fewer than 3 or more than
/// 5000 values, non-finite values, or all values equal.
pub fn shapiro_wilk(values: &[f64]) -> Option<NormalityTest> {
    let n = values.len();
    if !(3..=5000).contains(&n) || values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut x = values.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    if ss <= f64::EPSILON * mean.abs().max(1.0) {
        return None;
    }

    let std_normal = Normal::new(0.0, 1.0).ok()?;
    let a = coefficients(n, &std_normal);

    let numerator: f64 = a.iter().zip(&x).map(|(ai, xi)| ai * xi).sum();
    let w = (numerator * numerator / ss).min(1.0);

    let p_value = if n == 3 {
        let p = 6.0 / std::f64::consts::PI * (w.sqrt().asin() - 0.75f64.sqrt().asin());
        p.max(0.0)
    } else if n <= 11 {
        let nf = n as f64;
        let gamma = poly(&G, nf);
        let m = poly(&C3, nf);
        let s = poly(&C4, nf).exp();
        let w1 = (1.0 - w).ln();
        if w1 >= gamma {
            1e-99
        } else {
            let y = -(gamma - w1).ln();
            1.0 - std_normal.cdf((y - m) / s)
        }
    } else {
        let ln_n = (n as f64).ln();
        let m = poly(&C5, ln_n);
        let s = poly(&C6, ln_n).exp();
        1.0 - std_normal.cdf(((1.0 - w).ln() - m) / s)
    };

    Some(NormalityTest {
        statistic: w,
        p_value,
        n,
    })
}

/// Antisymmetric W coefficients for the sorted sample
fn coefficients(n: usize, std_normal: &Normal) -> Vec<f64> {
    if n == 3 {
        let a = 0.5f64.sqrt();
        return vec![-a, 0.0, a];
    }

    let nf = n as f64;
    let m: Vec<f64> = (1..=n)
        .map(|i| std_normal.inverse_cdf((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let mm: f64 = m.iter().map(|v| v * v).sum();
    let u = 1.0 / nf.sqrt();

    let mut a = vec![0.0; n];
    let a_n = m[n - 1] / mm.sqrt() + poly(&C1, u);
    if n > 5 {
        let a_n1 = m[n - 2] / mm.sqrt() + poly(&C2, u);
        let phi = (mm - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * a_n.powi(2) - 2.0 * a_n1.powi(2));
        for i in 2..n - 2 {
            a[i] = m[i] / phi.sqrt();
        }
        a[1] = -a_n1;
        a[n - 2] = a_n1;
    } else {
        let phi = (mm - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * a_n.powi(2));
        for i in 1..n - 1 {
            a[i] = m[i] / phi.sqrt();
        }
    }
    a[0] = -a_n;
    a[n - 1] = a_n;
    a
}
