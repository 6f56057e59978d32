//! Parametric statistical tests for grouped rating data.
//!
//! One-way ANOVA is computed for every field in a single pass over the per-group
//! matrices, so the F-test result for each column is available regardless of which
//! test ends up governing that column's significance decision.

use crate::error::{AnalysisError, Result};
use crate::testing::TestResult;
use crate::testing::utils::sample_variance;
use ndarray::{Array1, ArrayView2, Axis};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};

/// Perform one-way ANOVA on all fields (columns) across groups.
///
/// # Arguments
///
/// * `groups` - One matrix per group (observations × fields), all with the same columns
///
/// # Returns
///
/// Vector of `TestResult` objects, one per field, holding the F statistic and p-value.
/// Between-group and within-group degrees of freedom are stored as metadata
/// (`df_between`, `df_within`).
pub fn one_way_anova_columns(groups: &[ArrayView2<f64>]) -> Result<Vec<TestResult<f64>>> {
    if groups.len() < 2 {
        return Err(AnalysisError::InsufficientGroups(groups.len()));
    }

    let n_fields = groups[0].ncols();
    for (i, group) in groups.iter().enumerate() {
        if group.ncols() != n_fields {
            return Err(AnalysisError::FieldCountMismatch {
                expected: n_fields,
                found: group.ncols(),
            });
        }
        if group.nrows() == 0 {
            return Err(AnalysisError::EmptyGroup(format!("#{i}")));
        }
    }

    let k = groups.len();
    let total_n: usize = groups.iter().map(|g| g.nrows()).sum();

    let mut grand_sum = Array1::<f64>::zeros(n_fields);
    let mut group_means = Vec::with_capacity(k);
    for group in groups {
        let sums = group.sum_axis(Axis(0));
        grand_sum += &sums;
        group_means.push(sums / group.nrows() as f64);
    }
    let grand_mean = grand_sum / total_n as f64;

    let mut ss_between = Array1::<f64>::zeros(n_fields);
    let mut ss_within = Array1::<f64>::zeros(n_fields);
    for (group, means) in groups.iter().zip(group_means.iter()) {
        let offset = means - &grand_mean;
        ss_between += &(offset.mapv(|d| d * d) * group.nrows() as f64);

        let centered = group - &means.view().insert_axis(Axis(0));
        ss_within += &centered.mapv(|d| d * d).sum_axis(Axis(0));
    }

    let df_between = (k - 1) as f64;
    let df_within = (total_n - k) as f64;

    let results = ss_between
        .iter()
        .zip(ss_within.iter())
        .map(|(&ssb, &ssw)| {
            f_test_from_sums_of_squares(ssb, ssw, df_between, df_within)
                .with_metadata("df_between", df_between)
                .with_metadata("df_within", df_within)
        })
        .collect();

    Ok(results)
}

/// F-test from between/within sums of squares.
///
/// Zero within-group variance yields F = +inf and p = 0 when group means differ, and an
/// undefined result (NaN, p = 1) when they don't.
pub fn f_test_from_sums_of_squares(
    ss_between: f64,
    ss_within: f64,
    df_between: f64,
    df_within: f64,
) -> TestResult<f64> {
    if df_between <= 0.0 || df_within <= 0.0 {
        return TestResult::undefined();
    }

    let ms_between = ss_between / df_between;
    let ms_within = ss_within / df_within;

    if ms_within <= 0.0 {
        return if ms_between > 0.0 {
            TestResult::new(f64::INFINITY, 0.0).with_degrees_of_freedom(df_between)
        } else {
            TestResult::undefined()
        };
    }

    let f_stat = ms_between / ms_within;
    let p_value = match FisherSnedecor::new(df_between, df_within) {
        Ok(dist) => dist.sf(f_stat),
        Err(_) => 1.0,
    };

    TestResult::new(f_stat, p_value).with_degrees_of_freedom(df_between)
}

/// Bartlett's test for equal variances across groups.
///
/// Returns `None` when the statistic is undefined: fewer than two groups, a group with
/// fewer than two observations, or a group with zero variance. Callers that need a
/// decision for such input should check for it up front.
pub fn bartlett(groups: &[&[f64]]) -> Option<TestResult<f64>> {
    let k = groups.len();
    if k < 2 {
        return None;
    }

    let mut sizes = Vec::with_capacity(k);
    let mut variances = Vec::with_capacity(k);
    for group in groups {
        let var = sample_variance(*group)?;
        if var <= 0.0 || !var.is_finite() {
            return None;
        }
        sizes.push(group.len() as f64);
        variances.push(var);
    }

    let total_n: f64 = sizes.iter().sum();
    let df_within = total_n - k as f64;

    let pooled = sizes
        .iter()
        .zip(variances.iter())
        .map(|(&n, &v)| (n - 1.0) * v)
        .sum::<f64>()
        / df_within;

    let numerator = df_within * pooled.ln()
        - sizes
            .iter()
            .zip(variances.iter())
            .map(|(&n, &v)| (n - 1.0) * v.ln())
            .sum::<f64>();

    let reciprocal_sum: f64 = sizes.iter().map(|&n| 1.0 / (n - 1.0)).sum();
    let correction = 1.0 + (reciprocal_sum - 1.0 / df_within) / (3.0 * (k as f64 - 1.0));

    let statistic = numerator / correction;
    let df = (k - 1) as f64;
    let p_value = ChiSquared::new(df).ok()?.sf(statistic);

    Some(
        TestResult::new(statistic, p_value)
            .with_degrees_of_freedom(df)
            .with_metadata("pooled_variance", pooled),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_anova_matches_reference() {
        // SS_between = 57.7333, SS_within = 5.5, df = (2, 12)
        let g1 = array![[5.0], [6.0], [7.0], [5.5], [6.5]];
        let g2 = array![[8.0], [9.0], [8.5], [9.5], [8.0]];
        let g3 = array![[4.0], [3.0], [3.5], [4.5], [4.0]];
        let results = one_way_anova_columns(&[g1.view(), g2.view(), g3.view()]).unwrap();

        assert_eq!(results.len(), 1);
        assert_relative_eq!(results[0].statistic, 62.981818, epsilon = 1e-5);
        assert!(results[0].p_value < 1e-5);
        assert_eq!(results[0].metadata["df_within"], 12.0);
    }

    #[test]
    fn test_anova_is_per_column() {
        // Column 0 differs between groups, column 1 is the same sample in both.
        let g1 = array![[1.0, 3.0], [2.0, 4.0], [3.0, 5.0], [2.0, 4.0]];
        let g2 = array![[7.0, 3.0], [8.0, 4.0], [9.0, 5.0], [8.0, 4.0]];
        let results = one_way_anova_columns(&[g1.view(), g2.view()]).unwrap();

        assert!(results[0].p_value < 1e-4);
        assert_relative_eq!(results[1].statistic, 0.0);
        assert_relative_eq!(results[1].p_value, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_anova_zero_within_variance() {
        let g1 = array![[2.0], [2.0]];
        let g2 = array![[4.0], [4.0]];
        let results = one_way_anova_columns(&[g1.view(), g2.view()]).unwrap();
        assert!(results[0].statistic.is_infinite());
        assert_eq!(results[0].p_value, 0.0);

        let same = one_way_anova_columns(&[g1.view(), g1.view()]).unwrap();
        assert!(same[0].statistic.is_nan());
        assert_eq!(same[0].p_value, 1.0);
    }

    #[test]
    fn test_anova_rejects_mismatched_columns() {
        let g1 = array![[1.0, 2.0], [2.0, 3.0]];
        let g2 = array![[1.0], [2.0]];
        let err = one_way_anova_columns(&[g1.view(), g2.view()]).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::FieldCountMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_bartlett_detects_unequal_variance() {
        // Variances 2.5 and 250, df = 1 so p = erfc(sqrt(T / 2))
        let g1 = [2.0, 3.0, 4.0, 5.0, 6.0];
        let g2 = [10.0, 20.0, 30.0, 40.0, 50.0];
        let result = bartlett(&[&g1[..], &g2[..]]).unwrap();
        assert_relative_eq!(result.statistic, 11.515650, epsilon = 1e-5);
        assert_relative_eq!(result.p_value, 6.901271e-4, epsilon = 1e-8);
    }

    #[test]
    fn test_bartlett_equal_variance() {
        let g1 = [1.0, 2.0, 3.0, 4.0, 5.0];
        let g2 = [11.0, 12.0, 13.0, 14.0, 15.0];
        let result = bartlett(&[&g1[..], &g2[..]]).unwrap();
        assert!(result.statistic.abs() < 1e-12);
        assert!(result.p_value > 0.999);
    }

    #[test]
    fn test_bartlett_undefined_for_constant_group() {
        let g1 = [5.0; 10];
        let g2 = [1.0, 4.0, 2.0, 8.0, 5.0, 7.0, 3.0, 6.0, 9.0, 2.0];
        assert!(bartlett(&[&g1[..], &g2[..]]).is_none());
        let single = [1.0];
        assert!(bartlett(&[&g2[..]]).is_none());
        assert!(bartlett(&[&g2[..], &single[..]]).is_none());
    }
}
