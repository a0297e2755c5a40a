//! Model fitting for bioavailability datasets
//!
//! Each PK parameter is fitted separately on the log scale. The model form
//! is chosen from the design and the [`ModelKind`]:
//!
//! | Design | Fixed | Mixed |
//! |--------|-------|-------|
//! | Crossover | `logPK ~ Sequence + Subject(Sequence) + Period + Treatment` | `logPK ~ Sequence + Period + Treatment + (1 \| Subject)` |
//! | Fixed-sequence | `logPK ~ Subject + Treatment` | `logPK ~ Treatment + (1 \| Subject)` |
//! | Parallel | GLS `logPK ~ Treatment`, one variance per treatment | not available |
//!
//! Fixed-effects models are fitted by least squares, mixed models by REML
//! and the parallel model by generalized least squares. For every fit the
//! estimated marginal means of both treatments and the T − R contrast are
//! reported with confidence intervals (90% by default).
//!
//! ```rust
//! use pkbe::model::{fit, FitOptions, ModelKind};
//! use pkbe::simulation::simulate_crossover;
//! use pkbe::data::Parameter;
//!
//! let data = simulate_crossover(16, 646997).unwrap();
//! let result = fit(&data, Parameter::Cmax, ModelKind::Fixed, &FitOptions::default()).unwrap();
//! assert_eq!(result.means.len(), 2);
//! assert!(result.contrast.lower < result.contrast.upper);
//! ```

pub mod diagnostics;
mod emmeans;
mod error;
mod frame;
mod gls;
mod lmm;
mod ols;
mod types;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::data::{DataError, Dataset, Design, Parameter, Treatment};
use crate::PkbeError;

pub use error::FitError;
pub use types::{Contrast, MarginalMean, ModelResult, VarianceComponents};

/// Whether subjects enter the model as fixed or random effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Fixed,
    Mixed,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Fixed => write!(f, "fixed"),
            ModelKind::Mixed => write!(f, "mixed"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = PkbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(ModelKind::Fixed),
            "mixed" => Ok(ModelKind::Mixed),
            other => Err(PkbeError::InvalidArgument(format!(
                "'{other}' is not one of fixed, mixed"
            ))),
        }
    }
}

/// The closed set of model forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelForm {
    CrossoverFixed,
    CrossoverMixed,
    FixedSequenceFixed,
    FixedSequenceMixed,
    ParallelGls,
}

impl ModelForm {
    /// Model form for a design and kind
    ///
    /// # Errors
    ///
    /// The parallel design has no mixed variant.
    pub fn select(design: Design, kind: ModelKind) -> Result<ModelForm, PkbeError> {
        match (design, kind) {
            (Design::Crossover, ModelKind::Fixed) => Ok(ModelForm::CrossoverFixed),
            (Design::Crossover, ModelKind::Mixed) => Ok(ModelForm::CrossoverMixed),
            (Design::FixedSequence, ModelKind::Fixed) => Ok(ModelForm::FixedSequenceFixed),
            (Design::FixedSequence, ModelKind::Mixed) => Ok(ModelForm::FixedSequenceMixed),
            (Design::Parallel, ModelKind::Fixed) => Ok(ModelForm::ParallelGls),
            (Design::Parallel, ModelKind::Mixed) => Err(PkbeError::InvalidArgument(
                "the parallel design has no mixed model".to_string(),
            )),
        }
    }

    pub fn design(&self) -> Design {
        match self {
            ModelForm::CrossoverFixed | ModelForm::CrossoverMixed => Design::Crossover,
            ModelForm::FixedSequenceFixed | ModelForm::FixedSequenceMixed => Design::FixedSequence,
            ModelForm::ParallelGls => Design::Parallel,
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelForm::CrossoverMixed | ModelForm::FixedSequenceMixed => ModelKind::Mixed,
            _ => ModelKind::Fixed,
        }
    }

    pub fn formula(&self) -> &'static str {
        match self {
            ModelForm::CrossoverFixed => "logPK ~ Sequence + Subject(Sequence) + Period + Treatment",
            ModelForm::CrossoverMixed => "logPK ~ Sequence + Period + Treatment + (1 | Subject)",
            ModelForm::FixedSequenceFixed => "logPK ~ Subject + Treatment",
            ModelForm::FixedSequenceMixed => "logPK ~ Treatment + (1 | Subject)",
            ModelForm::ParallelGls => "logPK ~ Treatment, weights = varIdent(~1 | Treatment)",
        }
    }
}

impl fmt::Display for ModelForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} model", self.design(), self.kind())
    }
}

/// Fitting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Confidence level of all intervals (default 0.90)
    pub confidence_level: f64,
    /// Fit parameters on the rayon thread pool
    pub parallel: bool,
    /// Run a Shapiro–Wilk test on the residuals
    pub normality: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            confidence_level: 0.90,
            parallel: false,
            normality: true,
        }
    }
}

impl FitOptions {
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_normality(mut self, normality: bool) -> Self {
        self.normality = normality;
        self
    }

    fn validate(&self) -> Result<(), PkbeError> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(PkbeError::InvalidArgument(format!(
                "confidence level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }
}

/// Fit one parameter of `dataset`
///
/// # Errors
///
/// - [`PkbeError::InvalidArgument`] for an impossible design/kind combination
///   or a bad confidence level
/// - [`PkbeError::DataError`] when the data lack what the model needs
/// - [`PkbeError::FitError`] when the model cannot be estimated
pub fn fit(
    dataset: &Dataset,
    parameter: Parameter,
    kind: ModelKind,
    options: &FitOptions,
) -> Result<ModelResult, PkbeError> {
    let form = ModelForm::select(dataset.design(), kind)?;
    options.validate()?;
    dataset.validate()?;

    let rows = dataset.for_parameter(parameter);
    if rows.is_empty() {
        return Err(DataError::NoObservations {
            parameter: parameter.to_string(),
        }
        .into());
    }
    for treatment in Treatment::LEVELS {
        if !rows.iter().any(|o| o.treatment() == treatment) {
            return Err(DataError::MissingTreatment {
                parameter: parameter.to_string(),
                treatment: treatment.to_string(),
            }
            .into());
        }
    }

    let result = match form {
        ModelForm::ParallelGls => gls::fit(form, parameter, &rows, options)?,
        ModelForm::CrossoverFixed | ModelForm::FixedSequenceFixed => {
            let frame = frame::ModelFrame::new(form, &rows)?;
            ols::fit(&frame, parameter, options)?
        }
        ModelForm::CrossoverMixed | ModelForm::FixedSequenceMixed => {
            let frame = frame::ModelFrame::new(form, &rows)?;
            lmm::fit(&frame, parameter, options)?
        }
    };

    tracing::debug!(
        parameter = %parameter,
        form = %form,
        estimate = result.contrast.estimate,
        residual_sd = result.residual_sd,
        "model fitted"
    );
    Ok(result)
}

/// Fit every parameter in `parameters`, keeping their order
///
/// The first failure aborts the batch. With [`FitOptions::parallel`] the
/// parameters are fitted concurrently; the output order is unchanged.
pub fn fit_all(
    dataset: &Dataset,
    parameters: &[Parameter],
    kind: ModelKind,
    options: &FitOptions,
) -> Result<Vec<ModelResult>, PkbeError> {
    if options.parallel {
        parameters
            .par_iter()
            .map(|&p| fit(dataset, p, kind, options))
            .collect()
    } else {
        parameters
            .iter()
            .map(|&p| fit(dataset, p, kind, options))
            .collect()
    }
}
