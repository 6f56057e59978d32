//! Omnibus comparison of group means, one decision per field.
//!
//! ANOVA is computed for every field in one vectorized pass. Fields flagged by the
//! assumption checks are decided by Kruskal-Wallis instead; every other field by its
//! F-test. No field is ever decided by both.

use serde::Serialize;

use crate::assumptions::{AssumptionFlags, validate_groups};
use crate::config::{AnalysisConfig, SampleSizeScaling};
use crate::error::Result;
use crate::grouping::GroupMatrix;
use crate::testing::OmnibusTest;
use crate::testing::inference::nonparametric::kruskal_wallis;
use crate::testing::inference::parametric::one_way_anova_columns;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSize {
    pub label: String,
    /// Rating rows that entered the tests.
    pub rows: usize,
    /// Sample size as reported, after repeated-measures scaling.
    pub reported: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub label: String,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub field: String,
    pub test: OmnibusTest,
    pub statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    /// Per-group means, only computed for significant fields.
    pub group_means: Option<Vec<GroupMean>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub group_sizes: Vec<GroupSize>,
    /// One entry per field, in field-key order.
    pub fields: Vec<FieldComparison>,
    pub significant_fields: Vec<String>,
}

impl ComparisonReport {
    pub fn field(&self, key: &str) -> Option<&FieldComparison> {
        self.fields.iter().find(|f| f.field == key)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GroupComparisonEngine {
    alpha: f64,
    sample_size: SampleSizeScaling,
}

impl Default for GroupComparisonEngine {
    fn default() -> Self {
        GroupComparisonEngine {
            alpha: 0.05,
            sample_size: SampleSizeScaling::Raw,
        }
    }
}

impl GroupComparisonEngine {
    pub fn new(alpha: f64) -> Self {
        GroupComparisonEngine {
            alpha,
            ..Default::default()
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        GroupComparisonEngine {
            alpha: config.alpha,
            sample_size: config.sample_size,
        }
    }

    pub fn with_sample_size(mut self, scaling: SampleSizeScaling) -> Self {
        self.sample_size = scaling;
        self
    }

    pub fn compare(
        &self,
        groups: &[GroupMatrix],
        flags: &AssumptionFlags,
        fields: &[String],
    ) -> Result<ComparisonReport> {
        validate_groups(groups, fields)?;

        let views: Vec<_> = groups.iter().map(|g| g.values.view()).collect();
        let anova = one_way_anova_columns(&views)?;

        let group_sizes: Vec<GroupSize> = groups
            .iter()
            .map(|g| GroupSize {
                label: g.label.clone(),
                rows: g.rows(),
                reported: self.sample_size.reported(g.rows(), g.stimuli),
            })
            .collect();
        for size in &group_sizes {
            tracing::info!(group = %size.label, "N={}", size.reported);
        }

        let mut comparisons = Vec::with_capacity(fields.len());
        let mut significant_fields = Vec::new();

        for (column, (field, f_test)) in fields.iter().zip(anova).enumerate() {
            let (test, result) = if flags.contains(field) {
                let samples: Vec<Vec<f64>> =
                    groups.iter().map(|g| g.column(column).to_vec()).collect();
                let slices: Vec<&[f64]> = samples.iter().map(Vec::as_slice).collect();
                (OmnibusTest::KruskalWallis, kruskal_wallis(&slices))
            } else {
                (OmnibusTest::OneWayAnova, f_test)
            };

            let significant = result.is_significant(self.alpha);
            let group_means = significant.then(|| {
                groups
                    .iter()
                    .map(|g| GroupMean {
                        label: g.label.clone(),
                        mean: g.column(column).mean().unwrap_or(f64::NAN),
                    })
                    .collect::<Vec<_>>()
            });

            if let Some(means) = &group_means {
                tracing::info!(
                    field = %field,
                    "{}={:.2}, p={:.2E}",
                    test.symbol(),
                    result.statistic,
                    result.p_value
                );
                for mean in means {
                    tracing::debug!(field = %field, group = %mean.label, "avg: {:.2}", mean.mean);
                }
                significant_fields.push(field.clone());
            }

            comparisons.push(FieldComparison {
                field: field.clone(),
                test,
                statistic: result.statistic,
                p_value: result.p_value,
                significant,
                group_means,
            });
        }

        if significant_fields.is_empty() {
            tracing::info!("no significant differences");
        }

        Ok(ComparisonReport {
            group_sizes,
            fields: comparisons,
            significant_fields,
        })
    }
}
