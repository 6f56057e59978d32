//! Partition stimuli into labelled groups by a categorical attribute.

use std::collections::BTreeSet;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::data::StimulusTable;
use crate::error::{AnalysisError, Result};

/// A named subset of stimulus ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub label: String,
    pub members: BTreeSet<String>,
}

impl Group {
    pub fn new<I, S>(label: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Group {
            label: label.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, stimulus_id: &str) -> bool {
        self.members.contains(stimulus_id)
    }
}

/// Ratings of one group: rows are observations, columns follow the field-key order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMatrix {
    pub label: String,
    pub values: Array2<f64>,
    /// Distinct stimuli contributing rows.
    pub stimuli: usize,
}

impl GroupMatrix {
    pub fn new(label: impl Into<String>, values: Array2<f64>, stimuli: usize) -> Self {
        GroupMatrix {
            label: label.into(),
            values,
            stimuli,
        }
    }

    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.column(index)
    }
}

/// Fusion and exclusion rules applied when partitioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    /// Category values unioned into one trailing group.
    pub fuse: Vec<String>,
    /// Label of the fused group; defaults to the fused values joined by `/`.
    pub fused_label: Option<String>,
    /// Category values left out of every group.
    pub exclude: Vec<String>,
}

impl PartitionSpec {
    pub fn fuse<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fuse = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn fused_label(mut self, label: impl Into<String>) -> Self {
        self.fused_label = Some(label.into());
        self
    }

    pub fn exclude<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = categories.into_iter().map(Into::into).collect();
        self
    }

    fn resolved_fused_label(&self) -> String {
        self.fused_label
            .clone()
            .unwrap_or_else(|| self.fuse.join("/"))
    }
}

/// Split the stimuli of `table` into groups by `attribute`.
///
/// Unfused, non-excluded categories come first in first-seen order, each labelled by
/// its literal value. A non-empty fuse list appends one more group holding the union of
/// its non-excluded categories.
pub fn partition(
    table: &StimulusTable,
    attribute: &str,
    spec: &PartitionSpec,
) -> Result<Vec<Group>> {
    if !table.has_attribute(attribute) {
        return Err(AnalysisError::MissingAttribute(attribute.to_string()));
    }

    let is_fused = |category: &str| spec.fuse.iter().any(|c| c == category);
    let is_excluded = |category: &str| spec.exclude.iter().any(|c| c == category);

    let mut groups: Vec<Group> = table
        .distinct_values(attribute)
        .into_iter()
        .filter(|&category| !is_fused(category) && !is_excluded(category))
        .map(|category| Group {
            label: category.to_string(),
            members: table.ids_with(attribute, category),
        })
        .collect();

    if !spec.fuse.is_empty() {
        let members = spec
            .fuse
            .iter()
            .filter(|category| !is_excluded(category.as_str()))
            .flat_map(|category| table.ids_with(attribute, category.as_str()))
            .collect();
        groups.push(Group {
            label: spec.resolved_fused_label(),
            members,
        });
    }

    tracing::debug!(
        attribute,
        groups = ?groups.iter().map(|g| (g.label.as_str(), g.len())).collect::<Vec<_>>(),
        "partitioned stimuli"
    );

    Ok(groups)
}
