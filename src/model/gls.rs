//! Generalized least squares for the parallel design
//!
//! `logPK ~ Treatment` with a separate residual variance per treatment
//! group. With a single categorical predictor the REML solution is closed
//! form: each group mean is the sample mean and each group variance the
//! unbiased sample variance. Degrees of freedom follow Satterthwaite, which
//! reduces to `n_g − 1` for a group mean and to Welch's formula for the
//! contrast.

use super::diagnostics::shapiro_wilk;
use super::{emmeans, FitError, FitOptions, ModelForm, ModelResult, VarianceComponents};
use crate::data::{Observation, Parameter, Treatment};

#[derive(Debug, Clone, Copy)]
struct GroupSummary {
    n: usize,
    mean: f64,
    variance: f64,
}

fn summarize_group(
    form: ModelForm,
    treatment: Treatment,
    values: &[f64],
) -> Result<GroupSummary, FitError> {
    let n = values.len();
    if n < 2 {
        return Err(FitError::SmallGroup {
            form,
            treatment: treatment.to_string(),
            n,
        });
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    if !(variance > 0.0) {
        return Err(FitError::Singular {
            form,
            reason: format!("treatment {treatment} has zero variance"),
        });
    }
    Ok(GroupSummary { n, mean, variance })
}

/// Welch–Satterthwaite degrees of freedom of a difference of two means
fn welch_df(a: &GroupSummary, b: &GroupSummary) -> f64 {
    let va = a.variance / a.n as f64;
    let vb = b.variance / b.n as f64;
    (va + vb).powi(2) / (va * va / (a.n - 1) as f64 + vb * vb / (b.n - 1) as f64)
}

pub(crate) fn fit(
    form: ModelForm,
    parameter: Parameter,
    rows: &[&Observation],
    options: &FitOptions,
) -> Result<ModelResult, FitError> {
    let level = options.confidence_level;
    let values = |t: Treatment| -> Vec<f64> {
        rows.iter()
            .filter(|o| o.treatment() == t)
            .map(|o| o.log_pk())
            .collect()
    };
    let reference = summarize_group(form, Treatment::Reference, &values(Treatment::Reference))?;
    let test = summarize_group(form, Treatment::Test, &values(Treatment::Test))?;
    let group = |t: Treatment| match t {
        Treatment::Reference => &reference,
        Treatment::Test => &test,
    };

    let mut means = Vec::with_capacity(Treatment::LEVELS.len());
    for treatment in Treatment::LEVELS {
        let g = group(treatment);
        let se = (g.variance / g.n as f64).sqrt();
        means.push(emmeans::marginal_mean(
            form,
            treatment,
            (g.mean, se),
            (g.n - 1) as f64,
            level,
        )?);
    }

    let se = (reference.variance / reference.n as f64 + test.variance / test.n as f64).sqrt();
    let contrast = emmeans::contrast(
        form,
        (test.mean - reference.mean, se),
        welch_df(&reference, &test),
        level,
    )?;

    let pooled = (((reference.n - 1) as f64 * reference.variance
        + (test.n - 1) as f64 * test.variance)
        / (reference.n + test.n - 2) as f64)
        .sqrt();

    // Pearson residuals, standardized by the group SD
    let residuals: Vec<f64> = rows
        .iter()
        .map(|o| {
            let g = group(o.treatment());
            (o.log_pk() - g.mean) / g.variance.sqrt()
        })
        .collect();

    let mut subjects: Vec<u32> = rows.iter().map(|o| o.subject()).collect();
    subjects.sort_unstable();
    subjects.dedup();

    Ok(ModelResult {
        parameter,
        form,
        confidence_level: level,
        n_observations: rows.len(),
        n_subjects: subjects.len(),
        means,
        contrast,
        residual_sd: pooled,
        variance: VarianceComponents::Group {
            reference: reference.variance.sqrt(),
            test: test.variance.sqrt(),
        },
        normality: if options.normality {
            shapiro_wilk(&residuals)
        } else {
            None
        },
        residuals,
    })
}
