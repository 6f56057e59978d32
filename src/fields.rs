//! Field registries for the two rating experiments.
//!
//! Each experiment rates stimuli on a fixed set of scales. The registry maps the raw
//! column identifiers produced by the data collection (`emotion_1`, `feature_3`, ...) to
//! the field keys used throughout the analysis, and each key to its descriptive label.
//! Iteration order of a [`FieldSet`] is authoritative for column order everywhere a
//! per-group matrix is built.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Experiment {
    /// `"mm"`: emotions evoked by the music.
    Emotions,
    /// `"mf"`: bipolar perceptual features of the music.
    PerceptualFeatures,
}

impl Experiment {
    pub fn id(&self) -> &'static str {
        match self {
            Experiment::Emotions => "mm",
            Experiment::PerceptualFeatures => "mf",
        }
    }
}

impl FromStr for Experiment {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mm" => Ok(Experiment::Emotions),
            "mf" => Ok(Experiment::PerceptualFeatures),
            other => Err(AnalysisError::UnknownExperiment(other.to_string())),
        }
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Descriptive label of a rating scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldLabel {
    /// Unipolar scale, e.g. "Happy or delightful".
    Unipolar(&'static str),
    /// Bipolar scale between two poles, e.g. ("Electric", "Acoustic").
    Bipolar(&'static str, &'static str),
}

impl fmt::Display for FieldLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldLabel::Unipolar(label) => f.write_str(label),
            FieldLabel::Bipolar(low, high) => write!(f, "{low} - {high}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    /// Column identifier as collected, e.g. `emotion_1`.
    pub raw_id: &'static str,
    /// Field key used in rating tables and results, e.g. `Happy`.
    pub key: String,
    pub label: FieldLabel,
}

/// Ordered field definitions of one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSet {
    experiment: Experiment,
    fields: Vec<FieldDescriptor>,
}

impl FieldSet {
    pub fn experiment(&self) -> Experiment {
        self.experiment
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Field keys in registry order.
    pub fn keys(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.key.clone()).collect()
    }

    /// Key to descriptive label, in registry order.
    pub fn labels(&self) -> Vec<(&str, &FieldLabel)> {
        self.fields
            .iter()
            .map(|f| (f.key.as_str(), &f.label))
            .collect()
    }

    /// Raw column identifier to field key, in registry order.
    pub fn short_labels(&self) -> Vec<(&'static str, &str)> {
        self.fields
            .iter()
            .map(|f| (f.raw_id, f.key.as_str()))
            .collect()
    }

    pub fn label(&self, key: &str) -> Option<&FieldLabel> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.label)
    }

    pub fn key_for_raw_id(&self, raw_id: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.raw_id == raw_id)
            .map(|f| f.key.as_str())
    }
}

const EMOTIONS: [(&str, &str); 7] = [
    ("emotion_1", "Happy or delightful"),
    ("emotion_2", "Amusing or funny"),
    ("emotion_3", "Beauty or liking"),
    ("emotion_4", "Calm or relaxing"),
    ("emotion_5", "Energizing or invigorating"),
    ("emotion_6", "Angry or aggressive"),
    ("emotion_7", "Triumphant or awe-inspiring"),
];

const PERCEPTUAL_FEATURES: [(&str, &str, &str); 15] = [
    ("feature_1", "Electric", "Acoustic"),
    ("feature_2", "Distorted", "Clear"),
    ("feature_3", "Many Instruments", "Few Instruments"),
    ("feature_4", "Loud", "Soft"),
    ("feature_5", "Heavy", "Light"),
    ("feature_6", "High pitch", "Low pitch"),
    ("feature_7", "Wide pitch variation", "Narrow pitch variation"),
    ("feature_8", "Punchy", "Smooth"),
    ("feature_9", "Harmonious", "Disharmonious"),
    ("feature_10", "Clear melody", "No melody"),
    ("feature_11", "Repetitive", "Non-repetitive"),
    ("feature_12", "Complex rhythm", "Simple rhythm"),
    ("feature_13", "Fast tempo", "Slow tempo"),
    ("feature_14", "Dense", "Sparse"),
    ("feature_15", "Strong beat", "Weak beat"),
];

/// Immutable registry of every experiment's fields.
///
/// Build it once at start-up with [`FieldRegistry::standard`] and pass it by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRegistry {
    emotions: FieldSet,
    perceptual_features: FieldSet,
}

impl FieldRegistry {
    pub fn standard() -> Self {
        // Emotion keys are the first word of the label ("Happy or delightful" -> "Happy").
        let emotions = EMOTIONS
            .iter()
            .map(|&(raw_id, label)| FieldDescriptor {
                raw_id,
                key: label.split(' ').next().unwrap_or(label).to_string(),
                label: FieldLabel::Unipolar(label),
            })
            .collect();

        // Feature keys join both poles ("Electric/Acoustic").
        let perceptual_features = PERCEPTUAL_FEATURES
            .iter()
            .map(|&(raw_id, low, high)| FieldDescriptor {
                raw_id,
                key: format!("{low}/{high}"),
                label: FieldLabel::Bipolar(low, high),
            })
            .collect();

        FieldRegistry {
            emotions: FieldSet {
                experiment: Experiment::Emotions,
                fields: emotions,
            },
            perceptual_features: FieldSet {
                experiment: Experiment::PerceptualFeatures,
                fields: perceptual_features,
            },
        }
    }

    pub fn fields(&self, experiment: Experiment) -> &FieldSet {
        match experiment {
            Experiment::Emotions => &self.emotions,
            Experiment::PerceptualFeatures => &self.perceptual_features,
        }
    }

    /// Resolve a field set from its experiment identifier (`"mm"` or `"mf"`).
    pub fn resolve(&self, experiment_id: &str) -> crate::error::Result<&FieldSet> {
        let experiment: Experiment = experiment_id.parse()?;
        Ok(self.fields(experiment))
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
