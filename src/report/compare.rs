//! Side-by-side comparison of two analyses
//!
//! Typical uses are fixed against mixed models on the same data, or a
//! balanced dataset against its unbalanced counterpart.

use serde::{Deserialize, Serialize};

use super::BackTransformed;
use crate::data::{Parameter, Treatment};

/// Differences `b − a` for one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub parameter: Parameter,
    /// Per-treatment difference of the geometric means, reference first
    pub gmean_differences: Vec<(Treatment, f64)>,
    /// Percentage points
    pub ratio_difference: f64,
    pub lower_difference: f64,
    pub upper_difference: f64,
    pub gcv_difference: f64,
    /// Whether both analyses reach the same bioequivalence verdict
    pub same_verdict: bool,
}

impl Comparison {
    /// Largest absolute difference over the ratio and its confidence limits
    pub fn max_ratio_shift(&self) -> f64 {
        [
            self.ratio_difference,
            self.lower_difference,
            self.upper_difference,
        ]
        .iter()
        .fold(0.0, |acc: f64, d| acc.max(d.abs()))
    }
}

/// Compare two result sets parameter by parameter
///
/// Parameters are matched by label and reported in the order of `a`;
/// a parameter missing from `b` is skipped.
pub fn compare_tables(a: &[BackTransformed], b: &[BackTransformed]) -> Vec<Comparison> {
    a.iter()
        .filter_map(|left| {
            let right = b.iter().find(|r| r.parameter == left.parameter)?;
            let gmean_differences = left
                .means
                .iter()
                .filter_map(|m| {
                    right
                        .mean(m.treatment)
                        .map(|other| (m.treatment, other.adj_gmean - m.adj_gmean))
                })
                .collect();
            Some(Comparison {
                parameter: left.parameter,
                gmean_differences,
                ratio_difference: right.ratio - left.ratio,
                lower_difference: right.lower - left.lower,
                upper_difference: right.upper - left.upper,
                gcv_difference: right.gcv - left.gcv,
                same_verdict: left.is_bioequivalent() == right.is_bioequivalent(),
            })
        })
        .collect()
}
