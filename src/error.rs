use thiserror::Error;

/// Conditions that abort an analysis call.
///
/// Every variant except [`AnalysisError::Config`] is an invalid-input condition: the
/// caller handed over data or parameters the pipeline cannot analyze. Degenerate
/// statistics (constant or zero-range samples) are not errors, they are routed to the
/// conservative test path instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("invalid experiment `{0}`, must be `mm` or `mf`")]
    UnknownExperiment(String),

    #[error("attribute `{0}` does not exist in the dataset")]
    MissingAttribute(String),

    #[error("merge `{merged}` references category `{category}`, which is not in the table")]
    UnknownMergeCategory { merged: String, category: String },

    #[error("merge `{0}` does not list any category")]
    EmptyMerge(String),

    #[error("merged row name `{0}` collides with an existing row")]
    MergeNameCollision(String),

    #[error("contingency table is {rows}x{cols}, chi-square needs at least 2x2")]
    DegenerateTable { rows: usize, cols: usize },

    #[error("target `{0}` has no observations, expected frequencies would be zero")]
    ZeroExpectedFrequency(String),

    #[error("group comparison needs at least 2 groups, got {0}")]
    InsufficientGroups(usize),

    #[error("group matrices disagree on field count: expected {expected}, found {found}")]
    FieldCountMismatch { expected: usize, found: usize },

    #[error("group `{0}` has no rating rows")]
    EmptyGroup(String),

    #[error("rating row for stimulus `{stimulus}` has no value for field `{field}`")]
    MissingRatingField { stimulus: String, field: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
