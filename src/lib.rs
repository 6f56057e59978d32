//! # perceptual-stats
//!
//! Statistical analysis of perceptual music experiments: listeners rate stimuli on emotion or
//! perceptual-feature scales, stimuli are grouped by demographic or content categories, and
//! this crate decides whether those groups differ.
//!
//! ## Core Features
//!
//! - **Contingency Analysis**: cross-tabulation with sparse-category merging and a chi-square
//!   test of independence, including the expected-frequency caveat
//! - **Assumption Checks**: Bartlett's test for equal variances, then Shapiro-Wilk per group
//! - **Group Comparison**: vectorized one-way ANOVA, with Kruskal-Wallis for every field whose
//!   assumptions do not hold
//!
//! ## Quick Start
//!
//! Build a [`FieldRegistry`] once, then hand both data tables to an [`AnalysisOrchestrator`]
//! together with the grouping attribute and the experiment id (`"mm"` or `"mf"`). Every result
//! is a plain serializable struct; rendering is left to the caller.
//!
//! ## Module Organization
//!
//! - **[`fields`]**: Field registries of the two experiments
//! - **[`data`]**: Stimulus and rating tables
//! - **[`grouping`]**: Partitioning with fusion and exclusion
//! - **[`contingency`]**: Contingency tables and chi-square reports
//! - **[`assumptions`]**: Variance and normality checks
//! - **[`comparison`]**: Omnibus group comparisons
//! - **[`analysis`]**: The end-to-end pipeline
//! - **[`testing`]**: Statistical kernels

pub mod analysis;
pub mod assumptions;
pub mod comparison;
pub mod config;
pub mod contingency;
pub mod data;
pub mod error;
pub mod fields;
pub mod grouping;
pub mod testing;

pub use analysis::{AnalysisOrchestrator, AnalysisReport, GroupSource};
pub use assumptions::{AssumptionChecker, AssumptionFlags, AssumptionReport};
pub use comparison::{ComparisonReport, GroupComparisonEngine};
pub use config::{AnalysisConfig, SampleSizeScaling, TargetGrouping};
pub use contingency::{ContingencyReport, ContingencyTableBuilder, MergeDirective};
pub use data::{RatingRecord, RatingTable, StimulusRecord, StimulusTable};
pub use error::{AnalysisError, Result};
pub use fields::{Experiment, FieldRegistry};
pub use grouping::{Group, GroupMatrix, PartitionSpec, partition};
pub use testing::{OmnibusTest, TestResult};
