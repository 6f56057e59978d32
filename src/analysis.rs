//! End-to-end group comparison: registry, groups, rating matrices, assumption checks,
//! omnibus tests.

use std::collections::BTreeSet;

use ndarray::Array2;
use serde::Serialize;

use crate::assumptions::{AssumptionChecker, AssumptionReport};
use crate::comparison::{ComparisonReport, GroupComparisonEngine, GroupSize};
use crate::config::AnalysisConfig;
use crate::data::{RatingRecord, RatingTable, StimulusTable};
use crate::error::{AnalysisError, Result};
use crate::fields::{Experiment, FieldRegistry};
use crate::grouping::{Group, GroupMatrix, PartitionSpec, partition};

/// Where the groups of an analysis come from.
#[derive(Debug, Clone)]
pub enum GroupSource {
    /// Groups built by the caller; partition parameters do not apply.
    Prebuilt(Vec<Group>),
    /// Partition the stimulus table by the analysis attribute.
    Partition(PartitionSpec),
}

impl Default for GroupSource {
    fn default() -> Self {
        GroupSource::Partition(PartitionSpec::default())
    }
}

/// A rating row stamped with the label of the group its stimulus belongs to.
#[derive(Debug, Clone, Copy)]
pub struct LabeledRating<'a> {
    pub label: &'a str,
    pub record: &'a RatingRecord,
}

/// Keep the rating rows whose stimulus belongs to a group, in table order.
///
/// A stimulus in several groups is stamped with the label of the last of them. The stamp
/// is informational; group membership is always decided by [`Group::members`].
pub fn reduce_ratings<'a>(
    ratings: &'a RatingTable,
    groups: &'a [Group],
) -> Vec<LabeledRating<'a>> {
    ratings
        .rows()
        .iter()
        .filter_map(|record| {
            groups
                .iter()
                .rev()
                .find(|g| g.contains(&record.stimulus_id))
                .map(|g| LabeledRating {
                    label: g.label.as_str(),
                    record,
                })
        })
        .collect()
}

/// Build one matrix per group; columns follow `fields`, values are looked up by key.
///
/// Each matrix holds the rows of the group's own members, so groups that share a label
/// or a stimulus still get their own samples.
pub fn group_matrices(
    ratings: &RatingTable,
    groups: &[Group],
    fields: &[String],
) -> Result<Vec<GroupMatrix>> {
    for stimulus in groups.iter().flat_map(|g| g.members.iter()) {
        if !ratings.contains(stimulus) {
            tracing::warn!(stimulus = %stimulus, "stimulus has no ratings, skipped");
        }
    }

    let reduced = reduce_ratings(ratings, groups);
    let mut matrices = Vec::with_capacity(groups.len());

    for group in groups {
        let rows: Vec<&RatingRecord> = reduced
            .iter()
            .map(|r| r.record)
            .filter(|record| group.contains(&record.stimulus_id))
            .collect();
        if rows.is_empty() {
            return Err(AnalysisError::EmptyGroup(group.label.clone()));
        }

        let mut values = Array2::zeros((rows.len(), fields.len()));
        for (i, record) in rows.iter().enumerate() {
            for (j, field) in fields.iter().enumerate() {
                let value = record.value(field).ok_or_else(|| AnalysisError::MissingRatingField {
                    stimulus: record.stimulus_id.clone(),
                    field: field.clone(),
                })?;
                values[[i, j]] = value;
            }
        }

        let stimuli = rows
            .iter()
            .map(|r| r.stimulus_id.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        matrices.push(GroupMatrix::new(group.label.clone(), values, stimuli));
    }

    Ok(matrices)
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub experiment: Experiment,
    pub attribute: String,
    pub groups: Vec<GroupSize>,
    pub assumptions: AssumptionReport,
    pub comparison: ComparisonReport,
    /// Field keys, in registry order, whose omnibus test is significant.
    pub significant_fields: Vec<String>,
}

pub struct AnalysisOrchestrator<'a> {
    registry: &'a FieldRegistry,
    config: &'a AnalysisConfig,
}

impl<'a> AnalysisOrchestrator<'a> {
    pub fn new(registry: &'a FieldRegistry, config: &'a AnalysisConfig) -> Self {
        AnalysisOrchestrator { registry, config }
    }

    pub fn analyze(
        &self,
        attribute: &str,
        stimuli: &StimulusTable,
        ratings: &RatingTable,
        experiment_id: &str,
        source: GroupSource,
    ) -> Result<AnalysisReport> {
        let field_set = self.registry.resolve(experiment_id)?;
        let fields = field_set.keys();

        let groups = match source {
            GroupSource::Prebuilt(groups) => groups,
            GroupSource::Partition(spec) => partition(stimuli, attribute, &spec)?,
        };
        if groups.len() < 2 {
            return Err(AnalysisError::InsufficientGroups(groups.len()));
        }

        tracing::info!(
            experiment = %field_set.experiment(),
            attribute,
            groups = groups.len(),
            "comparing groups"
        );

        let matrices = group_matrices(ratings, &groups, &fields)?;

        let assumptions =
            AssumptionChecker::new(self.config.assumption_alpha).check(&matrices, &fields)?;
        let comparison = GroupComparisonEngine::from_config(self.config).compare(
            &matrices,
            &assumptions.flags,
            &fields,
        )?;

        Ok(AnalysisReport {
            experiment: field_set.experiment(),
            attribute: attribute.to_string(),
            groups: comparison.group_sizes.clone(),
            significant_fields: comparison.significant_fields.clone(),
            assumptions,
            comparison,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings() -> RatingTable {
        RatingTable::new(vec![
            RatingRecord::new("a").with_value("x", 1.0),
            RatingRecord::new("b").with_value("x", 2.0),
            RatingRecord::new("a").with_value("x", 3.0),
            RatingRecord::new("c").with_value("x", 4.0),
        ])
    }

    fn keys() -> Vec<String> {
        vec!["x".to_string()]
    }

    #[test]
    fn test_reduce_keeps_only_grouped_rows() {
        let ratings = ratings();
        let groups = vec![Group::new("g1", ["a"]), Group::new("g2", ["b"])];
        let reduced = reduce_ratings(&ratings, &groups);
        let ids: Vec<_> = reduced.iter().map(|r| r.record.stimulus_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "a"]);
        assert_eq!(reduced[1].label, "g2");
    }

    #[test]
    fn test_overlap_stamps_last_group() {
        let ratings = ratings();
        let groups = vec![Group::new("g1", ["a", "b"]), Group::new("g2", ["b", "c"])];
        let reduced = reduce_ratings(&ratings, &groups);
        let b = reduced.iter().find(|r| r.record.stimulus_id == "b").unwrap();
        assert_eq!(b.label, "g2");
    }

    #[test]
    fn test_overlapping_groups_keep_shared_rows() {
        let ratings = ratings();
        let groups = vec![Group::new("some", ["a"]), Group::new("all", ["a", "b", "c"])];
        let matrices = group_matrices(&ratings, &groups, &keys()).unwrap();
        assert_eq!(matrices[0].values.column(0).to_vec(), vec![1.0, 3.0]);
        assert_eq!(matrices[1].values.column(0).to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(matrices[1].stimuli, 3);
    }

    #[test]
    fn test_groups_sharing_a_label_stay_separate() {
        let ratings = ratings();
        let groups = vec![
            Group::new("pop", ["a"]),
            Group::new("rock", ["b"]),
            Group::new("pop", ["c"]),
        ];
        let matrices = group_matrices(&ratings, &groups, &keys()).unwrap();
        assert_eq!(matrices[0].values.column(0).to_vec(), vec![1.0, 3.0]);
        assert_eq!(matrices[1].values.column(0).to_vec(), vec![2.0]);
        assert_eq!(matrices[2].values.column(0).to_vec(), vec![4.0]);
        assert_eq!(matrices[2].label, "pop");
    }

    #[test]
    fn test_group_matrices_counts_rows_and_stimuli() {
        let ratings = ratings();
        let groups = vec![Group::new("g1", ["a"]), Group::new("g2", ["b", "c", "z"])];
        let matrices = group_matrices(&ratings, &groups, &keys()).unwrap();
        assert_eq!(matrices[0].rows(), 2);
        assert_eq!(matrices[0].stimuli, 1);
        assert_eq!(matrices[0].values.column(0).to_vec(), vec![1.0, 3.0]);
        assert_eq!(matrices[1].rows(), 2);
        assert_eq!(matrices[1].stimuli, 2);
    }

    #[test]
    fn test_group_without_ratings_is_an_error() {
        let ratings = ratings();
        let groups = vec![Group::new("g1", ["a"]), Group::new("g2", ["z"])];
        let err = group_matrices(&ratings, &groups, &keys()).unwrap_err();
        assert_eq!(err, AnalysisError::EmptyGroup("g2".to_string()));
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let ratings = ratings();
        let groups = vec![Group::new("g1", ["a"]), Group::new("g2", ["b"])];
        let fields = vec!["x".to_string(), "y".to_string()];
        let err = group_matrices(&ratings, &groups, &fields).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::MissingRatingField {
                stimulus: "a".to_string(),
                field: "y".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_experiment() {
        let registry = FieldRegistry::standard();
        let config = AnalysisConfig::default();
        let err = AnalysisOrchestrator::new(&registry, &config)
            .analyze(
                "genre",
                &StimulusTable::default(),
                &RatingTable::default(),
                "zz",
                GroupSource::default(),
            )
            .unwrap_err();
        assert_eq!(err, AnalysisError::UnknownExperiment("zz".to_string()));
    }

    #[test]
    fn test_single_prebuilt_group() {
        let registry = FieldRegistry::standard();
        let config = AnalysisConfig::default();
        let err = AnalysisOrchestrator::new(&registry, &config)
            .analyze(
                "genre",
                &StimulusTable::default(),
                &ratings(),
                "mm",
                GroupSource::Prebuilt(vec![Group::new("only", ["a"])]),
            )
            .unwrap_err();
        assert_eq!(err, AnalysisError::InsufficientGroups(1));
    }
}
