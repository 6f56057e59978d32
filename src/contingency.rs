//! Contingency tables of a categorical field against target groups.
//!
//! Rows are field categories, columns are target labels, cells count the stimuli that
//! carry the presence marker. Rows are addressed by category name throughout; dropping
//! and merging rows never shifts which counts belong to which category.

use std::collections::HashMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, TargetGrouping};
use crate::data::StimulusTable;
use crate::error::{AnalysisError, Result};
use crate::testing::inference::discrete::chi_square_independence;

/// Sum several categories into one new row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeDirective {
    pub merged: String,
    pub categories: Vec<String>,
}

impl MergeDirective {
    pub fn new<I, S>(merged: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MergeDirective {
            merged: merged.into(),
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContingencyRow {
    pub category: String,
    /// One count per target, in the table's target order.
    pub counts: Vec<u64>,
}

impl ContingencyRow {
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContingencyTable {
    targets: Vec<String>,
    rows: Vec<ContingencyRow>,
}

impl ContingencyTable {
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn rows(&self) -> &[ContingencyRow] {
        &self.rows
    }

    pub fn categories(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.category.as_str()).collect()
    }

    pub fn row(&self, category: &str) -> Option<&ContingencyRow> {
        self.rows.iter().find(|r| r.category == category)
    }

    /// Count of one (category, target) cell.
    pub fn count(&self, category: &str, target: &str) -> Option<u64> {
        let column = self.targets.iter().position(|t| t == target)?;
        self.row(category).map(|r| r.counts[column])
    }

    pub fn total(&self) -> u64 {
        self.rows.iter().map(ContingencyRow::total).sum()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.targets.len())
    }

    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn(self.shape(), |(i, j)| self.rows[i].counts[j] as f64)
    }

    fn remove_row(&mut self, category: &str) -> Option<ContingencyRow> {
        let position = self.rows.iter().position(|r| r.category == category)?;
        Some(self.rows.remove(position))
    }

    fn drop_empty_rows(&mut self) -> Vec<String> {
        let (kept, dropped): (Vec<_>, Vec<_>) =
            self.rows.drain(..).partition(|r| r.total() > 0);
        self.rows = kept;
        dropped.into_iter().map(|r| r.category).collect()
    }

    /// Replace the directive's rows by their element-wise sum, appended last.
    fn merge(&mut self, directive: &MergeDirective) -> Result<()> {
        if directive.categories.is_empty() {
            return Err(AnalysisError::EmptyMerge(directive.merged.clone()));
        }

        let mut merged = vec![0u64; self.targets.len()];
        for category in &directive.categories {
            let row = self
                .remove_row(category)
                .ok_or_else(|| AnalysisError::UnknownMergeCategory {
                    merged: directive.merged.clone(),
                    category: category.clone(),
                })?;
            for (acc, count) in merged.iter_mut().zip(row.counts) {
                *acc += count;
            }
        }

        if self.row(&directive.merged).is_some() {
            return Err(AnalysisError::MergeNameCollision(directive.merged.clone()));
        }

        self.rows.push(ContingencyRow {
            category: directive.merged.clone(),
            counts: merged,
        });
        Ok(())
    }
}

/// Count and share of one category within a target group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetShare {
    pub target: String,
    pub count: u64,
    /// Fraction of the target's counted stimuli, 0 for an empty target.
    pub fraction: f64,
}

/// How one category of the field is distributed, before rows are dropped or merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub count: u64,
    /// Fraction of all stimuli in the dataset.
    pub fraction: f64,
    pub targets: Vec<TargetShare>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContingencyReport {
    pub field: String,
    pub table: ContingencyTable,
    pub expected: Array2<f64>,
    pub chi_square: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    pub total: u64,
    /// Expected-frequency cells under the configured minimum (5 by default).
    pub low_expected_cells: usize,
    pub low_expected_fraction: f64,
    /// Categories removed because no target group contains them.
    pub dropped_categories: Vec<String>,
    pub categories: Vec<CategoryBreakdown>,
}

/// Builds the contingency table of one field and runs the independence test.
#[derive(Debug, Clone)]
pub struct ContingencyTableBuilder<'a> {
    stimuli: &'a StimulusTable,
    field: &'a str,
    target_grouping: Option<&'a TargetGrouping>,
    merges: Vec<MergeDirective>,
    config: Option<&'a AnalysisConfig>,
}

impl<'a> ContingencyTableBuilder<'a> {
    pub fn new(stimuli: &'a StimulusTable, field: &'a str) -> Self {
        ContingencyTableBuilder {
            stimuli,
            field,
            target_grouping: None,
            merges: Vec::new(),
            config: None,
        }
    }

    /// Columns of the table; defaults to the configured target grouping.
    pub fn target_grouping(mut self, grouping: &'a TargetGrouping) -> Self {
        self.target_grouping = Some(grouping);
        self
    }

    pub fn merge(mut self, directive: MergeDirective) -> Self {
        self.merges.push(directive);
        self
    }

    pub fn merges<I>(mut self, directives: I) -> Self
    where
        I: IntoIterator<Item = MergeDirective>,
    {
        self.merges.extend(directives);
        self
    }

    pub fn config(mut self, config: &'a AnalysisConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<ContingencyReport> {
        let default_config;
        let config = match self.config {
            Some(config) => config,
            None => {
                default_config = AnalysisConfig::default();
                &default_config
            }
        };
        let grouping = self.target_grouping.unwrap_or(&config.target_grouping);

        for attribute in [self.field, grouping.attribute.as_str()] {
            if !self.stimuli.has_attribute(attribute) {
                return Err(AnalysisError::MissingAttribute(attribute.to_string()));
            }
        }

        let mut global_counts: HashMap<&str, u64> = HashMap::new();
        let mut target_counts: HashMap<(&str, &str), u64> = HashMap::new();
        let mut target_totals: HashMap<&str, u64> = HashMap::new();
        for record in self.stimuli.records().iter().filter(|r| r.download) {
            let Some(category) = record.attribute(self.field) else {
                continue;
            };
            *global_counts.entry(category).or_default() += 1;
            if let Some(target) = record.attribute(&grouping.attribute) {
                *target_counts.entry((target, category)).or_default() += 1;
                *target_totals.entry(target).or_default() += 1;
            }
        }
        let grand_total = self.stimuli.len() as u64;

        let mut table = ContingencyTable {
            targets: grouping.targets.clone(),
            rows: Vec::new(),
        };
        let mut categories = Vec::new();

        for category in self.stimuli.distinct_values(self.field) {
            let count = global_counts.get(category).copied().unwrap_or(0);
            let shares: Vec<TargetShare> = grouping
                .targets
                .iter()
                .map(|target| {
                    let count = target_counts
                        .get(&(target.as_str(), category))
                        .copied()
                        .unwrap_or(0);
                    let target_total = target_totals.get(target.as_str()).copied().unwrap_or(0);
                    TargetShare {
                        target: target.clone(),
                        count,
                        fraction: fraction(count, target_total),
                    }
                })
                .collect();

            tracing::debug!(
                field = self.field,
                category,
                count,
                percent = 100.0 * fraction(count, grand_total),
                targets = ?shares.iter().map(|s| (s.target.as_str(), s.count)).collect::<Vec<_>>(),
                "category breakdown"
            );

            table.rows.push(ContingencyRow {
                category: category.to_string(),
                counts: shares.iter().map(|s| s.count).collect(),
            });
            categories.push(CategoryBreakdown {
                category: category.to_string(),
                count,
                fraction: fraction(count, grand_total),
                targets: shares,
            });
        }

        let dropped_categories = table.drop_empty_rows();
        if !dropped_categories.is_empty() {
            tracing::debug!(
                field = self.field,
                dropped = ?dropped_categories,
                "dropped empty categories"
            );
        }

        for directive in &self.merges {
            table.merge(directive)?;
        }

        let (rows, cols) = table.shape();
        if rows < 2 || cols < 2 {
            return Err(AnalysisError::DegenerateTable { rows, cols });
        }
        let col_totals = table.to_array().sum_axis(ndarray::Axis(0));
        if let Some(empty) = col_totals.iter().position(|&c| c <= 0.0) {
            return Err(AnalysisError::ZeroExpectedFrequency(table.targets[empty].clone()));
        }

        let test = chi_square_independence(&table.to_array(), config.yates_correction)?;
        let low_expected_cells = test.cells_below(config.min_expected_frequency);
        let low_expected_fraction = low_expected_cells as f64 / test.expected.len() as f64;
        let total = table.total();

        tracing::info!(
            field = self.field,
            "Chi2({}, N={}) = {:.2}, p = {:.4}",
            test.degrees_of_freedom,
            total,
            test.result.statistic,
            test.result.p_value
        );
        if low_expected_cells > 0 {
            tracing::warn!(
                field = self.field,
                "{} expected frequency cells are below {} ({:.2}%)",
                low_expected_cells,
                config.min_expected_frequency,
                100.0 * low_expected_fraction
            );
        }

        Ok(ContingencyReport {
            field: self.field.to_string(),
            table,
            chi_square: test.result.statistic,
            degrees_of_freedom: test.degrees_of_freedom,
            p_value: test.result.p_value,
            expected: test.expected,
            total,
            low_expected_cells,
            low_expected_fraction,
            dropped_categories,
            categories,
        })
    }
}

fn fraction(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}
