//! Analysis thresholds and defaults.
//!
//! Every field has a default matching the conventional choices (alpha 0.05, expected
//! frequency caveat below 5, Yates correction for 2x2 tables), so a config file only
//! needs to list what it overrides:
//!
//! ```toml
//! alpha = 0.01
//!
//! [sample_size]
//! fixed = 6
//!
//! [target_grouping]
//! attribute = "all_genders"
//! targets = ["Girls/women", "Boys/men"]
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// How per-group sample sizes are reported next to comparison results.
///
/// Only the reported N is affected, never the tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSizeScaling {
    /// Number of rating rows in the group.
    #[default]
    Raw,
    /// Rating rows divided by a fixed repeated-measures factor.
    Fixed(usize),
    /// Number of distinct stimuli in the group.
    PerStimulus,
}

impl SampleSizeScaling {
    /// Factor applied to raw counts when ratings are repeated per stimulus.
    pub const REPEATED_RATINGS: usize = 6;

    pub fn repeated_ratings() -> Self {
        SampleSizeScaling::Fixed(Self::REPEATED_RATINGS)
    }

    /// Reported N from a group's raw row count and its distinct stimulus count.
    pub fn reported(&self, rows: usize, stimuli: usize) -> usize {
        match *self {
            SampleSizeScaling::Raw => rows,
            SampleSizeScaling::Fixed(factor) => rows / factor.max(1),
            SampleSizeScaling::PerStimulus => stimuli,
        }
    }
}

/// Grouping attribute and the ordered target labels used as contingency columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGrouping {
    pub attribute: String,
    pub targets: Vec<String>,
}

impl TargetGrouping {
    pub fn new<I, S>(attribute: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TargetGrouping {
            attribute: attribute.into(),
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for TargetGrouping {
    /// Three-way gender-presentation grouping.
    fn default() -> Self {
        TargetGrouping::new("all_genders", ["Girls/women", "Boys/men", "Mixed"])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Significance threshold for the omnibus group comparisons.
    pub alpha: f64,
    /// Threshold below which a Bartlett or Shapiro-Wilk p-value flags a violation.
    pub assumption_alpha: f64,
    /// Expected frequency under which a chi-square cell is reported as low.
    pub min_expected_frequency: f64,
    /// Apply Yates' continuity correction to chi-square tests with one degree of freedom.
    pub yates_correction: bool,
    pub sample_size: SampleSizeScaling,
    pub target_grouping: TargetGrouping,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            alpha: 0.05,
            assumption_alpha: 0.05,
            min_expected_frequency: 5.0,
            yates_correction: true,
            sample_size: SampleSizeScaling::Raw,
            target_grouping: TargetGrouping::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        let config: AnalysisConfig =
            toml::from_str(source).context("failed to parse analysis config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("alpha", self.alpha), ("assumption_alpha", self.assumption_alpha)] {
            if !(value > 0.0 && value < 1.0) {
                return Err(AnalysisError::Config(format!(
                    "{name} must lie in (0, 1), got {value}"
                )));
            }
        }
        if !(self.min_expected_frequency >= 0.0) {
            return Err(AnalysisError::Config(format!(
                "min_expected_frequency must be non-negative, got {}",
                self.min_expected_frequency
            )));
        }
        if self.sample_size == SampleSizeScaling::Fixed(0) {
            return Err(AnalysisError::Config(
                "fixed sample size factor must be at least 1".to_string(),
            ));
        }
        if self.target_grouping.targets.is_empty() {
            return Err(AnalysisError::Config(
                "target grouping lists no targets".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.alpha, 0.05);
        assert_eq!(config.target_grouping.attribute, "all_genders");
        assert_eq!(config.target_grouping.targets.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            alpha = 0.01
            yates_correction = false

            [sample_size]
            fixed = 6

            [target_grouping]
            attribute = "gender"
            targets = ["F", "M"]
            "#,
        )
        .unwrap();
        assert_eq!(config.alpha, 0.01);
        assert_eq!(config.assumption_alpha, 0.05);
        assert!(!config.yates_correction);
        assert_eq!(config.sample_size, SampleSizeScaling::repeated_ratings());
        assert_eq!(config.target_grouping.targets, vec!["F", "M"]);
    }

    #[test]
    fn test_unit_variant_from_toml() {
        let config = AnalysisConfig::from_toml_str(r#"sample_size = "per_stimulus""#).unwrap();
        assert_eq!(config.sample_size, SampleSizeScaling::PerStimulus);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(AnalysisConfig::from_toml_str("alpha = 1.5").is_err());
        assert!(AnalysisConfig::from_toml_str("[sample_size]\nfixed = 0").is_err());
        assert!(AnalysisConfig::from_toml_str("min_expected_frequency = -1.0").is_err());
    }

    #[test]
    fn test_reported_sample_size() {
        assert_eq!(SampleSizeScaling::Raw.reported(60, 10), 60);
        assert_eq!(SampleSizeScaling::repeated_ratings().reported(60, 10), 10);
        assert_eq!(SampleSizeScaling::Fixed(4).reported(10, 3), 2);
        assert_eq!(SampleSizeScaling::PerStimulus.reported(60, 12), 12);
    }
}
