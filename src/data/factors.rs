//! Categorical factors of a bioavailability dataset
//!
//! Every factor is a closed enumeration so that a dataset cannot carry an
//! unknown treatment or parameter label. The textual labels match the column
//! values used in the CSV and JSON representations.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::DataError;
use crate::PkbeError;

/// Trial design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Design {
    /// Two-period, two-sequence crossover (TR/RT)
    Crossover,
    /// Every subject receives the treatments in the same order
    FixedSequence,
    /// Each subject receives exactly one treatment
    Parallel,
}

impl Design {
    /// Whether observations of this design carry a period
    pub fn has_periods(&self) -> bool {
        !matches!(self, Design::Parallel)
    }

    /// Number of periods per subject
    pub fn n_periods(&self) -> usize {
        match self {
            Design::Crossover | Design::FixedSequence => 2,
            Design::Parallel => 1,
        }
    }
}

impl fmt::Display for Design {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Design::Crossover => write!(f, "crossover"),
            Design::FixedSequence => write!(f, "fixed-sequence"),
            Design::Parallel => write!(f, "parallel"),
        }
    }
}

impl FromStr for Design {
    type Err = PkbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crossover" => Ok(Design::Crossover),
            "fixed-sequence" | "fixed_sequence" | "fixedsequence" => Ok(Design::FixedSequence),
            "parallel" => Ok(Design::Parallel),
            other => Err(PkbeError::InvalidArgument(format!(
                "unknown design '{other}', expected one of crossover, fixed-sequence, parallel"
            ))),
        }
    }
}

/// Treatment administered in a period
///
/// The reference formulation is always the first level, which makes it the
/// baseline of every contrast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Treatment {
    #[serde(rename = "R")]
    Reference,
    #[serde(rename = "T")]
    Test,
}

impl Treatment {
    /// All levels in factor order
    pub const LEVELS: [Treatment; 2] = [Treatment::Reference, Treatment::Test];

    pub fn label(&self) -> &'static str {
        match self {
            Treatment::Reference => "R",
            Treatment::Test => "T",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Treatment::Reference => 0,
            Treatment::Test => 1,
        }
    }
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Treatment {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "R" => Ok(Treatment::Reference),
            "T" => Ok(Treatment::Test),
            other => Err(DataError::UnknownLevel {
                column: "Treatment".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Treatment order across the two periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sequence {
    /// Test in period 1, reference in period 2
    TR,
    /// Reference in period 1, test in period 2
    RT,
}

impl Sequence {
    pub const LEVELS: [Sequence; 2] = [Sequence::TR, Sequence::RT];

    /// Treatment given in `period` (1-based)
    pub fn treatment_in(&self, period: u8) -> Option<Treatment> {
        match (self, period) {
            (Sequence::TR, 1) | (Sequence::RT, 2) => Some(Treatment::Test),
            (Sequence::TR, 2) | (Sequence::RT, 1) => Some(Treatment::Reference),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sequence::TR => "TR",
            Sequence::RT => "RT",
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Sequence {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "TR" => Ok(Sequence::TR),
            "RT" => Ok(Sequence::RT),
            other => Err(DataError::UnknownLevel {
                column: "Sequence".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Pharmacokinetic parameter
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Parameter {
    /// AUC from zero to the last quantifiable concentration
    AUC0_tz,
    /// AUC extrapolated to infinity using the predicted last concentration
    AUCINF_pred,
    /// Maximum observed concentration
    Cmax,
}

impl Parameter {
    pub const ALL: [Parameter; 3] = [Parameter::AUC0_tz, Parameter::AUCINF_pred, Parameter::Cmax];

    pub fn label(&self) -> &'static str {
        match self {
            Parameter::AUC0_tz => "AUC0_tz",
            Parameter::AUCINF_pred => "AUCINF_pred",
            Parameter::Cmax => "Cmax",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Parameter {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "AUC0_tz" => Ok(Parameter::AUC0_tz),
            "AUCINF_pred" => Ok(Parameter::AUCINF_pred),
            "Cmax" => Ok(Parameter::Cmax),
            other => Err(DataError::UnknownLevel {
                column: "Parameter".to_string(),
                value: other.to_string(),
            }),
        }
    }
}
