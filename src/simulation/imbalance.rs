//! Removal of observations to create unbalanced datasets
//!
//! An unbalanced counterpart of a two-period dataset is produced by dropping
//! every row of selected subjects in one period, as if those subjects had
//! discontinued before it.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::data::Dataset;
use crate::PkbeError;

/// Which subjects lose which period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImbalanceSpec {
    pub subjects: Vec<u32>,
    pub period: u8,
}

impl ImbalanceSpec {
    pub fn new(subjects: Vec<u32>, period: u8) -> Self {
        ImbalanceSpec { subjects, period }
    }
}

impl Default for ImbalanceSpec {
    /// Subjects 5 and 6 miss period 2
    fn default() -> Self {
        ImbalanceSpec {
            subjects: vec![5, 6],
            period: 2,
        }
    }
}

/// Remove all rows with `subject ∈ spec.subjects` and `period == spec.period`
///
/// All other rows are kept unchanged and in their original order.
///
/// # Errors
///
/// Returns [`PkbeError::InvalidArgument`] for designs without periods.
pub fn drop_period(dataset: &Dataset, spec: &ImbalanceSpec) -> Result<Dataset, PkbeError> {
    if !dataset.design().has_periods() {
        return Err(PkbeError::InvalidArgument(format!(
            "cannot drop a period from a {} dataset",
            dataset.design()
        )));
    }

    let present = dataset.subjects();
    for subject in &spec.subjects {
        if !present.contains(subject) {
            tracing::warn!(subject, "subject selected for removal is not in the dataset");
        }
    }

    let unbalanced = dataset.filter(|o| {
        !(spec.subjects.contains(&o.subject()) && o.period() == Some(spec.period))
    });
    tracing::debug!(
        removed = dataset.len() - unbalanced.len(),
        period = spec.period,
        "dropped observations"
    );
    Ok(unbalanced)
}

/// Balanced or unbalanced variant of a dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Balance {
    #[default]
    Balanced,
    Unbalanced,
}

impl Balance {
    /// The dataset itself for [`Balance::Balanced`], otherwise the dataset
    /// with `spec` applied
    pub fn apply(&self, dataset: &Dataset, spec: &ImbalanceSpec) -> Result<Dataset, PkbeError> {
        match self {
            Balance::Balanced => Ok(dataset.clone()),
            Balance::Unbalanced => drop_period(dataset, spec),
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balance::Balanced => write!(f, "balanced"),
            Balance::Unbalanced => write!(f, "unbalanced"),
        }
    }
}

impl FromStr for Balance {
    type Err = PkbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "balanced" => Ok(Balance::Balanced),
            "unbalanced" => Ok(Balance::Unbalanced),
            other => Err(PkbeError::InvalidArgument(format!(
                "'{other}' is not one of balanced, unbalanced"
            ))),
        }
    }
}
