//! Hypothesis tests used by the analysis pipeline.
//!
//! - **[`parametric`]**: one-way ANOVA across all fields at once, Bartlett's test
//! - **[`nonparametric`]**: Kruskal-Wallis H-test
//! - **[`normality`]**: Shapiro-Wilk W-test
//! - **[`discrete`]**: chi-square test of independence on contingency tables

pub mod discrete;

pub mod normality;

pub mod parametric;

pub mod nonparametric;
