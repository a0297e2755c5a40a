//! Back-transformation of log-scale estimates
//!
//! Converts a [ModelResult] into geometric means, the test/reference ratio
//! in percent and its confidence interval, plus the geometric coefficient of
//! variation. All functions here are pure and leave formatting to
//! [`crate::report::table`].

use serde::{Deserialize, Serialize};

use crate::data::{Parameter, Treatment};
use crate::model::ModelResult;

/// Lower bioequivalence acceptance limit, in percent
pub const BE_LOWER: f64 = 80.0;
/// Upper bioequivalence acceptance limit, in percent
pub const BE_UPPER: f64 = 125.0;

/// Geometric mean of one treatment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometricMean {
    pub treatment: Treatment,
    /// Adjusted geometric mean, `exp(estimate)`
    pub adj_gmean: f64,
    /// Geometric standard error, `exp(se)`
    pub adj_gse: f64,
}

/// Natural-scale summary of one fitted parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackTransformed {
    pub parameter: Parameter,
    /// One entry per treatment, reference first
    pub means: Vec<GeometricMean>,
    /// Test/reference ratio of geometric means (%)
    pub ratio: f64,
    /// Geometric standard error of the ratio, `exp(se)`
    pub gse: f64,
    /// Lower confidence limit of the ratio (%)
    pub lower: f64,
    /// Upper confidence limit of the ratio (%)
    pub upper: f64,
    /// Geometric coefficient of variation (%)
    pub gcv: f64,
    pub confidence_level: f64,
}

impl BackTransformed {
    pub fn mean(&self, treatment: Treatment) -> Option<&GeometricMean> {
        self.means.iter().find(|m| m.treatment == treatment)
    }

    /// Whether the confidence interval lies within 80.00–125.00%
    pub fn is_bioequivalent(&self) -> bool {
        self.lower >= BE_LOWER && self.upper <= BE_UPPER
    }
}

/// Log-scale difference to percent ratio
pub fn ratio_percent(log_difference: f64) -> f64 {
    log_difference.exp() * 100.0
}

/// Geometric CV (%) for a log-scale standard deviation
///
/// Always non-negative; zero only for `sd == 0`.
pub fn gcv_percent(sd: f64) -> f64 {
    (sd * sd).exp_m1().max(0.0).sqrt() * 100.0
}

/// Back-transform a fitted model
pub fn back_transform(result: &ModelResult) -> BackTransformed {
    let contrast = &result.contrast;
    BackTransformed {
        parameter: result.parameter,
        means: result
            .means
            .iter()
            .map(|m| GeometricMean {
                treatment: m.treatment,
                adj_gmean: m.estimate.exp(),
                adj_gse: m.se.exp(),
            })
            .collect(),
        ratio: ratio_percent(contrast.estimate),
        gse: contrast.se.exp(),
        lower: ratio_percent(contrast.lower),
        upper: ratio_percent(contrast.upper),
        gcv: gcv_percent(result.residual_sd),
        confidence_level: result.confidence_level,
    }
}

/// Back-transform every result, keeping their order
pub fn back_transform_all(results: &[ModelResult]) -> Vec<BackTransformed> {
    results.iter().map(back_transform).collect()
}
