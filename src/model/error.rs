//! Model fitting errors

use thiserror::Error;

use super::ModelForm;

/// Errors raised while fitting a model
///
/// None of these are retried: a failed fit is reported to the caller as is.
#[derive(Error, Debug, Clone)]
pub enum FitError {
    /// Fewer observations than estimable coefficients plus one
    #[error("{form}: no residual degrees of freedom ({n} observations, {p} coefficients)")]
    InsufficientDf { form: ModelForm, n: usize, p: usize },

    /// A treatment group is too small to estimate its own variance
    #[error("{form}: treatment {treatment} has {n} observations, at least 2 are needed")]
    SmallGroup {
        form: ModelForm,
        treatment: String,
        n: usize,
    },

    /// A cross-product matrix could not be factorized
    #[error("{form}: singular fit: {reason}")]
    Singular { form: ModelForm, reason: String },

    /// The treatment effect is aliased with other terms
    #[error("{form}: the treatment contrast is not estimable")]
    NotEstimable { form: ModelForm },

    /// The variance optimizer stopped without converging
    #[error("{form}: did not converge: {reason}")]
    NonConvergence { form: ModelForm, reason: String },

    /// The between-subject variance was estimated at zero
    #[error("{form}: boundary (singular) fit, between-subject variance is zero")]
    BoundaryFit { form: ModelForm },

    /// Invalid value in a statistical computation
    #[error("{form}: numerical error: {reason}")]
    Numerical { form: ModelForm, reason: String },
}
