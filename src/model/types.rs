//! Model result types

use serde::{Deserialize, Serialize};

use super::{diagnostics::NormalityTest, ModelForm};
use crate::data::{Parameter, Treatment};

/// Estimated marginal mean of one treatment (log scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginalMean {
    pub treatment: Treatment,
    pub estimate: f64,
    pub se: f64,
    pub df: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Test-minus-reference contrast (log scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contrast {
    pub estimate: f64,
    pub se: f64,
    pub df: f64,
    pub lower: f64,
    pub upper: f64,
    /// t statistic for a zero difference
    pub t_ratio: f64,
    /// Two-sided p-value for a zero difference
    pub p_value: f64,
}

/// Estimated variability on the log scale, as standard deviations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VarianceComponents {
    /// Residual only (subject as a fixed effect)
    Residual { sigma: f64 },
    /// Random subject intercept and residual
    Subject { between: f64, within: f64 },
    /// Separate residual per treatment group
    Group { reference: f64, test: f64 },
}

/// Everything estimated for one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub parameter: Parameter,
    pub form: ModelForm,
    pub confidence_level: f64,
    pub n_observations: usize,
    pub n_subjects: usize,
    /// One entry per treatment, reference first
    pub means: Vec<MarginalMean>,
    pub contrast: Contrast,
    /// Residual standard deviation used for the gCV
    pub residual_sd: f64,
    pub variance: VarianceComponents,
    pub normality: Option<NormalityTest>,
    pub residuals: Vec<f64>,
}

impl ModelResult {
    pub fn mean(&self, treatment: Treatment) -> Option<&MarginalMean> {
        self.means.iter().find(|m| m.treatment == treatment)
    }
}
