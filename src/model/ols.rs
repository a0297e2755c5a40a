//! Ordinary least squares with subject as a fixed effect

use nalgebra::{DMatrix, DVector};

use super::diagnostics::shapiro_wilk;
use super::frame::ModelFrame;
use super::{emmeans, FitError, FitOptions, ModelResult, VarianceComponents};
use crate::data::Parameter;

/// Least-squares solution of a full-column-rank system
#[derive(Debug, Clone)]
pub(crate) struct LeastSquares {
    pub coefficients: DVector<f64>,
    /// Covariance of the coefficients, `σ² (X'X)⁻¹`
    pub covariance: DMatrix<f64>,
    pub sigma: f64,
    pub df: usize,
    pub residuals: DVector<f64>,
}

pub(crate) fn least_squares(
    form: super::ModelForm,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
) -> Result<LeastSquares, FitError> {
    let (n, p) = x.shape();
    if n <= p {
        return Err(FitError::InsufficientDf { form, n, p });
    }

    let cholesky = x.tr_mul(x).cholesky().ok_or_else(|| FitError::Singular {
        form,
        reason: "X'X is not positive definite".to_string(),
    })?;
    let coefficients = cholesky.solve(&x.tr_mul(y));
    let residuals = y - x * &coefficients;
    let df = n - p;
    let sigma2 = residuals.norm_squared() / df as f64;

    Ok(LeastSquares {
        coefficients,
        covariance: cholesky.inverse() * sigma2,
        sigma: sigma2.sqrt(),
        df,
        residuals,
    })
}

pub(crate) fn fit(
    frame: &ModelFrame,
    parameter: Parameter,
    options: &FitOptions,
) -> Result<ModelResult, FitError> {
    let design = frame.fixed_design()?;
    tracing::trace!(
        terms = ?frame.term_names(),
        columns = design.x.ncols(),
        dropped = design.full_width - design.kept.len(),
        "least-squares design"
    );
    let ls = least_squares(frame.form, &design.x, &frame.y)?;

    let df = ls.df as f64;
    let (means, contrast) = emmeans::summarize(
        frame,
        &design,
        &ls.coefficients,
        &ls.covariance,
        options.confidence_level,
        |_| df,
    )?;

    let residuals: Vec<f64> = ls.residuals.iter().copied().collect();
    Ok(ModelResult {
        parameter,
        form: frame.form,
        confidence_level: options.confidence_level,
        n_observations: frame.n(),
        n_subjects: frame.n_subjects(),
        means,
        contrast,
        residual_sd: ls.sigma,
        variance: VarianceComponents::Residual { sigma: ls.sigma },
        normality: if options.normality {
            shapiro_wilk(&residuals)
        } else {
            None
        },
        residuals,
    })
}
