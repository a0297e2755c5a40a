//! Population reference tables used by the simulators
//!
//! A [ReferenceTable] holds the log-scale population mean of every
//! (treatment, parameter) cell and the variability of every parameter.
//! Repeated-measures designs split variability into a between-subject and a
//! within-subject standard deviation; the parallel design uses a single
//! standard deviation per parameter.

use serde::{Deserialize, Serialize};

use crate::data::{Design, Parameter, Treatment};
use crate::PkbeError;

/// Log-scale population mean of one (treatment, parameter) cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationMean {
    pub treatment: Treatment,
    pub parameter: Parameter,
    pub log_mean: f64,
}

/// Standard deviations on the log scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Variability {
    /// Subject-level effect plus a residual per period
    BetweenWithin { between: f64, within: f64 },
    /// A single residual per subject
    Total { sd: f64 },
}

impl Variability {
    fn is_valid(&self) -> bool {
        let ok = |sd: f64| sd.is_finite() && sd > 0.0;
        match *self {
            Variability::BetweenWithin { between, within } => ok(between) && ok(within),
            Variability::Total { sd } => ok(sd),
        }
    }
}

/// Variability of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterVariability {
    pub parameter: Parameter,
    pub variability: Variability,
}

/// Static mean and variance tables for one design
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTable {
    means: Vec<PopulationMean>,
    variability: Vec<ParameterVariability>,
}

// Log-scale means shared by every design: (parameter, reference, test)
const LOG_MEANS: [(Parameter, f64, f64); 3] = [
    (Parameter::AUC0_tz, 7.60, 7.55),
    (Parameter::AUCINF_pred, 7.65, 7.60),
    (Parameter::Cmax, 5.30, 5.35),
];

fn default_means() -> Vec<PopulationMean> {
    LOG_MEANS
        .iter()
        .flat_map(|&(parameter, reference, test)| {
            [
                PopulationMean {
                    treatment: Treatment::Reference,
                    parameter,
                    log_mean: reference,
                },
                PopulationMean {
                    treatment: Treatment::Test,
                    parameter,
                    log_mean: test,
                },
            ]
        })
        .collect()
}

impl ReferenceTable {
    pub fn new(means: Vec<PopulationMean>, variability: Vec<ParameterVariability>) -> Self {
        ReferenceTable { means, variability }
    }

    /// Defaults for the two-period designs (crossover and fixed-sequence)
    pub fn repeated_measures() -> Self {
        let spread = [
            (Parameter::AUC0_tz, 0.30, 0.15),
            (Parameter::AUCINF_pred, 0.30, 0.16),
            (Parameter::Cmax, 0.35, 0.22),
        ];
        ReferenceTable {
            means: default_means(),
            variability: spread
                .iter()
                .map(|&(parameter, between, within)| ParameterVariability {
                    parameter,
                    variability: Variability::BetweenWithin { between, within },
                })
                .collect(),
        }
    }

    /// Defaults for the parallel-group design
    pub fn parallel() -> Self {
        let spread = [
            (Parameter::AUC0_tz, 0.35),
            (Parameter::AUCINF_pred, 0.36),
            (Parameter::Cmax, 0.40),
        ];
        ReferenceTable {
            means: default_means(),
            variability: spread
                .iter()
                .map(|&(parameter, sd)| ParameterVariability {
                    parameter,
                    variability: Variability::Total { sd },
                })
                .collect(),
        }
    }

    /// Default table for `design`
    pub fn for_design(design: Design) -> Self {
        match design {
            Design::Crossover | Design::FixedSequence => Self::repeated_measures(),
            Design::Parallel => Self::parallel(),
        }
    }

    pub fn means(&self) -> &[PopulationMean] {
        &self.means
    }

    pub fn mean(&self, treatment: Treatment, parameter: Parameter) -> Option<f64> {
        self.means
            .iter()
            .find(|m| m.treatment == treatment && m.parameter == parameter)
            .map(|m| m.log_mean)
    }

    pub fn variability(&self, parameter: Parameter) -> Option<Variability> {
        self.variability
            .iter()
            .find(|v| v.parameter == parameter)
            .map(|v| v.variability)
    }

    /// Replace (or add) the mean of one cell
    pub fn with_mean(mut self, treatment: Treatment, parameter: Parameter, log_mean: f64) -> Self {
        self.means
            .retain(|m| !(m.treatment == treatment && m.parameter == parameter));
        self.means.push(PopulationMean {
            treatment,
            parameter,
            log_mean,
        });
        self
    }

    /// Replace (or add) the variability of one parameter
    pub fn with_variability(mut self, parameter: Parameter, variability: Variability) -> Self {
        self.variability.retain(|v| v.parameter != parameter);
        self.variability.push(ParameterVariability {
            parameter,
            variability,
        });
        self
    }

    /// Check that the table covers `parameters` with the variability kind
    /// `design` needs
    pub(crate) fn check(&self, design: Design, parameters: &[Parameter]) -> Result<(), PkbeError> {
        for &parameter in parameters {
            for treatment in Treatment::LEVELS {
                match self.mean(treatment, parameter) {
                    Some(m) if m.is_finite() => {}
                    _ => {
                        return Err(PkbeError::InvalidArgument(format!(
                            "reference table has no finite mean for {treatment} / {parameter}"
                        )))
                    }
                }
            }
            let variability = self.variability(parameter).ok_or_else(|| {
                PkbeError::InvalidArgument(format!("reference table has no variability for {parameter}"))
            })?;
            if !variability.is_valid() {
                return Err(PkbeError::InvalidArgument(format!(
                    "standard deviations for {parameter} must be finite and positive"
                )));
            }
            let matches_design = matches!(
                (design.has_periods(), variability),
                (true, Variability::BetweenWithin { .. }) | (false, Variability::Total { .. })
            );
            if !matches_design {
                return Err(PkbeError::InvalidArgument(format!(
                    "{design} design cannot use {variability:?} for {parameter}"
                )));
            }
        }
        Ok(())
    }
}
