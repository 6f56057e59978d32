//! Validity checks that decide which omnibus test each field gets.
//!
//! Phase 1 runs Bartlett's test on every field. Phase 2 runs Shapiro-Wilk per group,
//! but only on fields that passed phase 1: a field with unequal variances is already
//! routed to Kruskal-Wallis, so its normality does not change the decision.
//!
//! Samples on which a test is undefined (constant values, too few observations) are
//! detected before the test runs and count as violations.

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::grouping::GroupMatrix;
use crate::testing::TestResult;
use crate::testing::inference::normality::{SHAPIRO_CALIBRATED_N, shapiro_wilk};
use crate::testing::inference::parametric::bartlett;
use crate::testing::utils::has_zero_range;

/// Result of one assumption test.
#[derive(Debug, Clone, Serialize)]
pub enum Outcome {
    Tested(TestResult<f64>),
    /// The test statistic is undefined for this input; always a violation.
    Degenerate,
}

impl Outcome {
    pub fn is_violation(&self, alpha: f64) -> bool {
        match self {
            Outcome::Tested(result) => result.p_value < alpha,
            Outcome::Degenerate => true,
        }
    }

    pub fn p_value(&self) -> Option<f64> {
        match self {
            Outcome::Tested(result) => Some(result.p_value),
            Outcome::Degenerate => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupNormality {
    pub group: String,
    pub outcome: Outcome,
    pub violated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldAssumptions {
    pub field: String,
    pub variance: Outcome,
    pub unequal_variance: bool,
    /// Per-group normality; `None` when phase 1 already flagged the field.
    pub normality: Option<Vec<GroupNormality>>,
}

impl FieldAssumptions {
    pub fn non_normal(&self) -> bool {
        self.normality
            .as_ref()
            .is_some_and(|groups| groups.iter().any(|g| g.violated))
    }

    pub fn violated(&self) -> bool {
        self.unequal_variance || self.non_normal()
    }
}

/// Field keys whose group comparison assumptions do not hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssumptionFlags(BTreeSet<String>);

impl AssumptionFlags {
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AssumptionFlags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        AssumptionFlags(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssumptionReport {
    /// One entry per field, in field-key order.
    pub fields: Vec<FieldAssumptions>,
    pub flags: AssumptionFlags,
}

impl AssumptionReport {
    pub fn field(&self, key: &str) -> Option<&FieldAssumptions> {
        self.fields.iter().find(|f| f.field == key)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AssumptionChecker {
    alpha: f64,
}

impl Default for AssumptionChecker {
    fn default() -> Self {
        AssumptionChecker { alpha: 0.05 }
    }
}

impl AssumptionChecker {
    pub fn new(alpha: f64) -> Self {
        AssumptionChecker { alpha }
    }

    /// Check variance homogeneity, then normality, for every field.
    ///
    /// `fields` names the matrix columns in order; all groups must share them.
    pub fn check(&self, groups: &[GroupMatrix], fields: &[String]) -> Result<AssumptionReport> {
        validate_groups(groups, fields)?;

        let columns: HashMap<&str, usize> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.as_str(), i))
            .collect();

        let variance: Vec<(String, Outcome)> = fields
            .par_iter()
            .map(|field| (field.clone(), self.variance_outcome(groups, columns[field.as_str()])))
            .collect();

        let mut report = Vec::with_capacity(fields.len());
        for (field, outcome) in variance {
            let unequal_variance = outcome.is_violation(self.alpha);
            match outcome.p_value() {
                _ if !unequal_variance => tracing::debug!(
                    field = %field,
                    p = ?outcome.p_value(),
                    "equal variance across groups"
                ),
                Some(p) => {
                    tracing::warn!(field = %field, "unequal variance across groups, p={p:.2E}")
                }
                None => {
                    tracing::warn!(field = %field, "variance test undefined for constant input")
                }
            }
            report.push(FieldAssumptions {
                field,
                variance: outcome,
                unequal_variance,
                normality: None,
            });
        }

        let normality: Vec<(usize, Vec<GroupNormality>)> = report
            .par_iter()
            .enumerate()
            .filter(|(_, f)| !f.unequal_variance)
            .map(|(i, f)| (i, self.normality_outcomes(groups, columns[f.field.as_str()])))
            .collect();

        for (i, outcomes) in normality {
            for group in &outcomes {
                match group.outcome.p_value() {
                    _ if !group.violated => tracing::debug!(
                        field = %report[i].field,
                        group = %group.group,
                        p = ?group.outcome.p_value(),
                        "normally distributed"
                    ),
                    Some(p) => tracing::warn!(
                        field = %report[i].field,
                        group = %group.group,
                        "not normally distributed, p={p:.2E}"
                    ),
                    None => tracing::warn!(
                        field = %report[i].field,
                        group = %group.group,
                        "normality test undefined for this sample"
                    ),
                }
            }
            report[i].normality = Some(outcomes);
        }

        let flags: AssumptionFlags = report
            .iter()
            .filter(|f| f.violated())
            .map(|f| f.field.clone())
            .collect();

        if flags.is_empty() {
            tracing::info!("all fields meet the variance and normality assumptions");
        }

        Ok(AssumptionReport {
            fields: report,
            flags,
        })
    }

    fn variance_outcome(&self, groups: &[GroupMatrix], column: usize) -> Outcome {
        let samples: Vec<Vec<f64>> = groups.iter().map(|g| g.column(column).to_vec()).collect();
        if samples.iter().any(|s| s.len() < 2 || has_zero_range(s.as_slice())) {
            return Outcome::Degenerate;
        }

        let slices: Vec<&[f64]> = samples.iter().map(Vec::as_slice).collect();
        bartlett(&slices).map_or(Outcome::Degenerate, Outcome::Tested)
    }

    fn normality_outcomes(&self, groups: &[GroupMatrix], column: usize) -> Vec<GroupNormality> {
        groups
            .iter()
            .map(|group| {
                let sample = group.column(column).to_vec();
                let outcome = if sample.len() < 3 || has_zero_range(sample.as_slice()) {
                    Outcome::Degenerate
                } else {
                    if sample.len() > SHAPIRO_CALIBRATED_N {
                        tracing::warn!(
                            group = %group.label,
                            n = sample.len(),
                            "Shapiro-Wilk p-value may be inaccurate above N={SHAPIRO_CALIBRATED_N}"
                        );
                    }
                    shapiro_wilk(&sample).map_or(Outcome::Degenerate, Outcome::Tested)
                };
                GroupNormality {
                    group: group.label.clone(),
                    violated: outcome.is_violation(self.alpha),
                    outcome,
                }
            })
            .collect()
    }
}

pub(crate) fn validate_groups(groups: &[GroupMatrix], fields: &[String]) -> Result<()> {
    if groups.len() < 2 {
        return Err(AnalysisError::InsufficientGroups(groups.len()));
    }
    for group in groups {
        if group.values.ncols() != fields.len() {
            return Err(AnalysisError::FieldCountMismatch {
                expected: fields.len(),
                found: group.values.ncols(),
            });
        }
        if group.rows() == 0 {
            return Err(AnalysisError::EmptyGroup(group.label.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn matrix(label: &str, columns: &[&[f64]]) -> GroupMatrix {
        let rows = columns[0].len();
        let values = Array2::from_shape_fn((rows, columns.len()), |(i, j)| columns[j][i]);
        GroupMatrix::new(label, values, rows)
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    const SPREAD_A: [f64; 10] = [4.1, 5.3, 3.8, 4.9, 5.6, 4.4, 5.0, 4.7, 5.2, 4.0];
    const SPREAD_B: [f64; 10] = [5.0, 6.1, 4.6, 5.8, 6.4, 5.2, 5.9, 5.5, 6.0, 4.9];

    #[test]
    fn test_constant_group_is_flagged() {
        let constant = [5.0; 10];
        let groups = vec![matrix("A", &[&constant]), matrix("B", &[&SPREAD_B])];
        let report = AssumptionChecker::default()
            .check(&groups, &keys(&["Happy"]))
            .unwrap();

        assert!(report.flags.contains("Happy"));
        let field = report.field("Happy").unwrap();
        assert!(matches!(field.variance, Outcome::Degenerate));
        assert!(field.unequal_variance);
        assert!(field.normality.is_none());
    }

    #[test]
    fn test_well_behaved_field_passes() {
        let groups = vec![matrix("A", &[&SPREAD_A]), matrix("B", &[&SPREAD_B])];
        let report = AssumptionChecker::default()
            .check(&groups, &keys(&["Calm"]))
            .unwrap();

        assert!(report.flags.is_empty());
        let normality = report.field("Calm").unwrap().normality.as_ref().unwrap();
        assert_eq!(normality.len(), 2);
        assert!(normality.iter().all(|g| !g.violated));
    }

    #[test]
    fn test_normality_uses_the_right_column() {
        // Field 0 fails Bartlett; field 1 passes Bartlett but group B is skewed.
        let wide = [1.0, 40.0, 3.0, 70.0, 12.0, 55.0, 25.0, 90.0, 8.0, 33.0];
        let skewed = [4.0, 4.05, 4.1, 4.1, 4.15, 4.2, 4.3, 4.4, 4.8, 6.0];
        let groups = vec![
            matrix("A", &[&SPREAD_A, &SPREAD_A]),
            matrix("B", &[&wide, &skewed]),
        ];
        let report = AssumptionChecker::default()
            .check(&groups, &keys(&["Angry", "Calm"]))
            .unwrap();

        let angry = report.field("Angry").unwrap();
        assert!(angry.unequal_variance);
        assert!(angry.normality.is_none());

        let calm = report.field("Calm").unwrap();
        let normality = calm.normality.as_ref().unwrap();
        assert!(!normality[0].violated);
        assert!(normality[1].violated);
        assert_eq!(report.flags.len(), 2);
    }

    #[test]
    fn test_too_small_sample_is_degenerate() {
        let groups = vec![
            matrix("A", &[&[1.0, 2.0]]),
            matrix("B", &[&[2.0, 3.5]]),
        ];
        let report = AssumptionChecker::default()
            .check(&groups, &keys(&["Happy"]))
            .unwrap();
        let field = report.field("Happy").unwrap();
        if let Some(normality) = &field.normality {
            assert!(normality.iter().all(|g| matches!(g.outcome, Outcome::Degenerate)));
        }
        assert!(report.flags.contains("Happy"));
    }

    #[test]
    fn test_large_normal_groups_are_tested() {
        use statrs::distribution::{ContinuousCDF, Normal};

        let n = SHAPIRO_CALIBRATED_N + 1;
        let normal = Normal::new(0.0, 1.0).unwrap();
        let quantiles: Vec<f64> = (0..n)
            .map(|i| normal.inverse_cdf((i as f64 + 0.5) / n as f64))
            .collect();
        let groups = vec![matrix("A", &[&quantiles[..]]), matrix("B", &[&quantiles[..]])];
        let report = AssumptionChecker::default()
            .check(&groups, &keys(&["Calm"]))
            .unwrap();

        let normality = report.field("Calm").unwrap().normality.as_ref().unwrap();
        assert!(normality.iter().all(|g| matches!(g.outcome, Outcome::Tested(_))));
        assert!(normality.iter().all(|g| !g.violated));
        assert!(report.flags.is_empty());
    }

    #[test]
    fn test_rejects_single_group() {
        let groups = vec![matrix("A", &[&SPREAD_A])];
        let err = AssumptionChecker::default()
            .check(&groups, &keys(&["Happy"]))
            .unwrap_err();
        assert_eq!(err, AnalysisError::InsufficientGroups(1));
    }
}
