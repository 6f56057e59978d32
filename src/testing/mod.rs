use num_traits::Float;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub mod inference;

pub mod utils;

/// Omnibus test used to compare all groups on one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OmnibusTest {
    /// One-way ANOVA, F statistic. Used when the field meets the test assumptions.
    OneWayAnova,
    /// Kruskal-Wallis, H statistic. Used for fields flagged by the assumption checks.
    KruskalWallis,
}

impl OmnibusTest {
    /// Symbol of the test statistic, `F` or `H`.
    pub fn symbol(&self) -> &'static str {
        match self {
            OmnibusTest::OneWayAnova => "F",
            OmnibusTest::KruskalWallis => "H",
        }
    }

    pub fn is_parametric(&self) -> bool {
        matches!(self, OmnibusTest::OneWayAnova)
    }
}

impl fmt::Display for OmnibusTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OmnibusTest::OneWayAnova => f.write_str("one-way ANOVA (F)"),
            OmnibusTest::KruskalWallis => f.write_str("Kruskal-Wallis (H)"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestResult<T> {
    /// The test statistic value (e.g., F, H, W, chi-square)
    pub statistic: T,
    /// The p-value of the test
    pub p_value: T,
    /// Degrees of freedom (numerator only for F-tests)
    pub degrees_of_freedom: Option<T>,
    /// Additional test-specific information
    pub metadata: HashMap<String, T>,
}

impl<T> TestResult<T>
where
    T: Float,
{
    /// Create a new test result with minimal information
    pub fn new(statistic: T, p_value: T) -> Self {
        TestResult {
            statistic,
            p_value,
            degrees_of_freedom: None,
            metadata: HashMap::new(),
        }
    }

    /// Result of a test that could not produce a statistic: NaN with p = 1.
    pub fn undefined() -> Self {
        TestResult::new(T::nan(), T::one())
    }

    /// Add degrees of freedom to the result
    pub fn with_degrees_of_freedom(mut self, df: T) -> Self {
        self.degrees_of_freedom = Some(df);
        self
    }

    /// Add additional metadata
    pub fn with_metadata(mut self, key: &str, value: T) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Check if the result is statistically significant at the given threshold
    pub fn is_significant(&self, alpha: T) -> bool {
        self.p_value < alpha
    }
}
