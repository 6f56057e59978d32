//! Shapiro-Wilk test for normality.
//!
//! Coefficients and the W → p transformation follow Royston's approximation
//! (Applied Statistics algorithm AS R94). The approximation is calibrated for
//! 3 ≤ n ≤ 5000; larger samples are still tested, with a less exact p-value.

use crate::testing::TestResult;
use statrs::distribution::{ContinuousCDF, Normal};

/// Largest sample the p-value approximation is calibrated for.
pub const SHAPIRO_CALIBRATED_N: usize = 5000;

const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

/// Shapiro-Wilk W-test.
///
/// Returns `None` for samples the test is undefined on: fewer than three values,
/// non-finite values, or zero range.
pub fn shapiro_wilk(data: &[f64]) -> Option<TestResult<f64>> {
    let n = data.len();
    if n < 3 || data.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut x = data.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    if x[n - 1] == x[0] {
        return None;
    }

    let normal = Normal::new(0.0, 1.0).ok()?;

    if n == 3 {
        let mean = x.iter().sum::<f64>() / 3.0;
        let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
        let numerator = std::f64::consts::FRAC_1_SQRT_2 * (x[2] - x[0]);
        let w = (numerator * numerator / ss).clamp(0.75, 1.0);
        let p = 1.0 - 6.0 / std::f64::consts::PI * w.sqrt().acos();
        return Some(TestResult::new(w, p.clamp(0.0, 1.0)));
    }

    let coefficients = coefficients(n, &normal)?;
    let w = statistic(&x, &coefficients).min(1.0);
    let p = p_value(w, n, &normal);

    Some(TestResult::new(w, p.clamp(0.0, 1.0)).with_metadata("n", n as f64))
}

/// Horner evaluation of c[0] + c[1]·x + c[2]·x² + ...
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &ci| acc * x + ci)
}

/// Antisymmetric weights for the lower half of the order statistics.
fn coefficients(n: usize, normal: &Normal) -> Option<Vec<f64>> {
    let half = n / 2;
    let nf = n as f64;

    let m: Vec<f64> = (0..half)
        .map(|i| normal.inverse_cdf((i as f64 + 1.0 - 0.375) / (nf + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / nf.sqrt();

    let mut a = vec![0.0; half];
    a[0] = poly(&C1, rsn) - m[0] / ssumm2;

    let corrected = if n > 5 { 2 } else { 1 };
    if corrected == 2 {
        a[1] = -m[1] / ssumm2 + poly(&C2, rsn);
    }

    let fac_sq = summ2 - 2.0 * m[..corrected].iter().map(|v| v * v).sum::<f64>();
    let rest = 1.0 - 2.0 * a[..corrected].iter().map(|v| v * v).sum::<f64>();
    if fac_sq <= 0.0 || rest <= 0.0 {
        return None;
    }
    let fac = (fac_sq / rest).sqrt();
    for i in corrected..half {
        a[i] = -m[i] / fac;
    }

    Some(a)
}

fn statistic(sorted: &[f64], a: &[f64]) -> f64 {
    let n = sorted.len();
    let numerator: f64 = a
        .iter()
        .enumerate()
        .map(|(i, &ai)| ai * (sorted[n - 1 - i] - sorted[i]))
        .sum();

    let mean = sorted.iter().sum::<f64>() / n as f64;
    let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();

    numerator * numerator / ss
}

fn p_value(w: f64, n: usize, normal: &Normal) -> f64 {
    let nf = n as f64;
    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return 1.0;
    }
    let y = w1.ln();

    let (z_input, mean, sd) = if n <= 11 {
        let gamma = poly(&G, nf);
        if y >= gamma {
            return 0.0;
        }
        (-(gamma - y).ln(), poly(&C3, nf), poly(&C4, nf).exp())
    } else {
        let ln_n = nf.ln();
        (y, poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };

    normal.sf((z_input - mean) / sd)
}
