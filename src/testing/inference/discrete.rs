use crate::error::{AnalysisError, Result};
use crate::testing::TestResult;
use ndarray::{Array2, Axis};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Chi-square test of independence with its expected-frequency matrix.
#[derive(Debug, Clone)]
pub struct ChiSquareIndependence {
    pub result: TestResult<f64>,
    /// Expected counts under independence, same shape as the observed table.
    pub expected: Array2<f64>,
    pub degrees_of_freedom: usize,
    pub total: f64,
}

impl ChiSquareIndependence {
    /// Number of expected-frequency cells below `threshold`.
    pub fn cells_below(&self, threshold: f64) -> usize {
        self.expected.iter().filter(|&&e| e < threshold).count()
    }
}

/// Performs a chi-square test of independence on an r×c contingency table.
///
/// With `yates` set, the continuity correction is applied when the table has exactly
/// one degree of freedom: every observed count moves towards its expected count by at
/// most 0.5.
pub fn chi_square_independence(
    observed: &Array2<f64>,
    yates: bool,
) -> Result<ChiSquareIndependence> {
    let (rows, cols) = observed.dim();
    if rows < 2 || cols < 2 {
        return Err(AnalysisError::DegenerateTable { rows, cols });
    }

    let row_sums = observed.sum_axis(Axis(1));
    let col_sums = observed.sum_axis(Axis(0));
    let total = row_sums.sum();

    if let Some(col) = col_sums.iter().position(|&c| c <= 0.0) {
        return Err(AnalysisError::ZeroExpectedFrequency(format!("column {col}")));
    }
    if let Some(row) = row_sums.iter().position(|&r| r <= 0.0) {
        return Err(AnalysisError::ZeroExpectedFrequency(format!("row {row}")));
    }

    let expected = Array2::from_shape_fn((rows, cols), |(i, j)| row_sums[i] * col_sums[j] / total);
    let dof = (rows - 1) * (cols - 1);

    let chi_square: f64 = observed
        .iter()
        .zip(expected.iter())
        .map(|(&o, &e)| {
            let diff = if yates && dof == 1 {
                let d = e - o;
                d - d.signum() * d.abs().min(0.5)
            } else {
                e - o
            };
            diff * diff / e
        })
        .sum();

    let p_value = match ChiSquared::new(dof as f64) {
        Ok(dist) => dist.sf(chi_square),
        Err(_) => 1.0,
    };

    Ok(ChiSquareIndependence {
        result: TestResult::new(chi_square, p_value).with_degrees_of_freedom(dof as f64),
        expected,
        degrees_of_freedom: dof,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_chi_square_2x3() {
        let observed = array![[10.0, 20.0, 30.0], [30.0, 20.0, 10.0]];
        let test = chi_square_independence(&observed, true).unwrap();
        // Expected is 20 everywhere: chi2 = 4 * 100/20 = 20, dof 2, p = exp(-10)
        assert_eq!(test.degrees_of_freedom, 2);
        assert_relative_eq!(test.result.statistic, 20.0, epsilon = 1e-12);
        assert_relative_eq!(test.result.p_value, (-10.0_f64).exp(), epsilon = 1e-12);
        assert_eq!(test.cells_below(5.0), 0);
        assert_relative_eq!(test.total, 120.0);
    }

    #[test]
    fn test_yates_applies_only_with_one_dof() {
        let observed = array![[12.0, 5.0], [9.0, 7.0]];
        let corrected = chi_square_independence(&observed, true).unwrap();
        let raw = chi_square_independence(&observed, false).unwrap();
        assert!(corrected.result.statistic < raw.result.statistic);
        assert!(corrected.result.p_value > raw.result.p_value);
    }

    #[test]
    fn test_expected_frequencies() {
        let observed = array![[3.0, 1.0], [1.0, 3.0]];
        let test = chi_square_independence(&observed, false).unwrap();
        assert_eq!(test.expected, Array2::from_elem((2, 2), 2.0));
        assert_eq!(test.cells_below(5.0), 4);
        // 4 * (1^2 / 2) = 2, df 1
        assert_relative_eq!(test.result.statistic, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_shapes() {
        let single_row = array![[1.0, 2.0, 3.0]];
        assert_eq!(
            chi_square_independence(&single_row, true).unwrap_err(),
            AnalysisError::DegenerateTable { rows: 1, cols: 3 }
        );

        let empty_column = array![[1.0, 0.0], [2.0, 0.0]];
        assert!(matches!(
            chi_square_independence(&empty_column, true),
            Err(AnalysisError::ZeroExpectedFrequency(_))
        ));
    }
}
