//! Estimated marginal means and the treatment contrast
//!
//! Given fixed-effect estimates, their covariance and a degrees-of-freedom
//! rule, every linear function `l'b` of the coefficients is reported with a
//! standard error and a t-based confidence interval.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::frame::{FixedDesign, ModelFrame};
use super::{Contrast, FitError, MarginalMean, ModelForm};
use crate::data::Treatment;

/// Two-sided t quantile for `level`
pub(crate) fn t_critical(form: ModelForm, level: f64, df: f64) -> Result<f64, FitError> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| FitError::Numerical {
        form,
        reason: format!("t distribution with {df} df: {e}"),
    })?;
    Ok(dist.inverse_cdf(1.0 - (1.0 - level) / 2.0))
}

/// Two-sided p-value of a t statistic
pub(crate) fn t_p_value(form: ModelForm, t: f64, df: f64) -> Result<f64, FitError> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| FitError::Numerical {
        form,
        reason: format!("t distribution with {df} df: {e}"),
    })?;
    Ok(2.0 * (1.0 - dist.cdf(t.abs())))
}

/// Estimate and standard error of `l'b`
pub(crate) fn linear_estimate(l: &DVector<f64>, b: &DVector<f64>, cov: &DMatrix<f64>) -> (f64, f64) {
    let estimate = l.dot(b);
    let variance = (l.transpose() * cov * l)[(0, 0)];
    (estimate, variance.max(0.0).sqrt())
}

pub(crate) fn marginal_mean(
    form: ModelForm,
    treatment: Treatment,
    (estimate, se): (f64, f64),
    df: f64,
    level: f64,
) -> Result<MarginalMean, FitError> {
    let t = t_critical(form, level, df)?;
    Ok(MarginalMean {
        treatment,
        estimate,
        se,
        df,
        lower: estimate - t * se,
        upper: estimate + t * se,
    })
}

pub(crate) fn contrast(
    form: ModelForm,
    (estimate, se): (f64, f64),
    df: f64,
    level: f64,
) -> Result<Contrast, FitError> {
    let t = t_critical(form, level, df)?;
    let t_ratio = if se > 0.0 { estimate / se } else { f64::NAN };
    let p_value = if t_ratio.is_finite() {
        t_p_value(form, t_ratio, df)?
    } else {
        f64::NAN
    };
    Ok(Contrast {
        estimate,
        se,
        df,
        lower: estimate - t * se,
        upper: estimate + t * se,
        t_ratio,
        p_value,
    })
}

/// Marginal means of both treatments and the T − R contrast for a linear
/// fit, with `df` giving the degrees of freedom of each linear function
pub(crate) fn summarize<F>(
    frame: &ModelFrame,
    design: &FixedDesign,
    b: &DVector<f64>,
    cov: &DMatrix<f64>,
    level: f64,
    mut df: F,
) -> Result<(Vec<MarginalMean>, Contrast), FitError>
where
    F: FnMut(&DVector<f64>) -> f64,
{
    let mut means = Vec::with_capacity(Treatment::LEVELS.len());
    for treatment in Treatment::LEVELS {
        let l = frame.grid_row(treatment, design);
        let mean = marginal_mean(frame.form, treatment, linear_estimate(&l, b, cov), df(&l), level)?;
        means.push(mean);
    }

    let l = frame.grid_row(Treatment::Test, design) - frame.grid_row(Treatment::Reference, design);
    let contrast = contrast(frame.form, linear_estimate(&l, b, cov), df(&l), level)?;
    Ok((means, contrast))
}
