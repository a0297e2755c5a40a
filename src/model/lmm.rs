//! Linear mixed model with a random subject intercept
//!
//! The model `y = Xb + Zu + e` with `u ~ N(0, σ_b² I)` and `e ~ N(0, σ² I)`
//! is fitted by restricted maximum likelihood. The REML deviance is profiled
//! over `θ = σ_b / σ` and minimized with Nelder–Mead; `b` and `σ²` then
//! follow in closed form.
//!
//! Degrees of freedom of every marginal mean and of the contrast use the
//! Satterthwaite approximation, with the covariance of the variance
//! parameters taken from a finite-difference Hessian of the REML deviance.

use argmin::{
    core::{CostFunction, Error, Executor, TerminationReason, TerminationStatus},
    solver::neldermead::NelderMead,
};
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

use super::diagnostics::shapiro_wilk;
use super::frame::ModelFrame;
use super::{emmeans, FitError, FitOptions, ModelForm, ModelResult, VarianceComponents};
use crate::data::Parameter;

/// θ below which the between-subject variance is considered zero
const BOUNDARY_THETA: f64 = 1e-4;
/// Relative step of the finite differences
const FD_STEP: f64 = 1e-4;
const MAX_ITERS: u64 = 1000;

/// Generalized least-squares quantities for one marginal covariance `V`
struct Gls {
    coefficients: DVector<f64>,
    /// `(X'V⁻¹X)⁻¹`
    xtvx_inv: DMatrix<f64>,
    log_det_v: f64,
    log_det_xtvx: f64,
    /// `r'V⁻¹r`
    quadratic: f64,
    /// `V⁻¹r`
    v_inv_r: DVector<f64>,
}

fn log_det_from_cholesky(l: &DMatrix<f64>) -> f64 {
    2.0 * l.diagonal().iter().map(|d| d.ln()).sum::<f64>()
}

fn gls(x: &DMatrix<f64>, y: &DVector<f64>, v: DMatrix<f64>) -> Option<Gls> {
    let chol_v = v.cholesky()?;
    let v_inv_x = chol_v.solve(x);
    let chol_x = x.tr_mul(&v_inv_x).cholesky()?;
    let v_inv_y = chol_v.solve(y);
    let coefficients = chol_x.solve(&x.tr_mul(&v_inv_y));
    let r = y - x * &coefficients;
    let v_inv_r = chol_v.solve(&r);
    Some(Gls {
        quadratic: r.dot(&v_inv_r),
        log_det_v: log_det_from_cholesky(chol_v.l_dirty()),
        log_det_xtvx: log_det_from_cholesky(chol_x.l_dirty()),
        xtvx_inv: chol_x.inverse(),
        coefficients,
        v_inv_r,
    })
}

#[derive(Clone, Copy)]
struct Reml<'a> {
    x: &'a DMatrix<f64>,
    y: &'a DVector<f64>,
    /// `ZZ'` of the subject incidence matrix
    zzt: &'a DMatrix<f64>,
}

impl Reml<'_> {
    fn residual_df(&self) -> f64 {
        (self.x.nrows() - self.x.ncols()) as f64
    }

    /// `V = σ² I + σ_b² ZZ'`
    fn marginal(&self, sigma2: f64, tau2: f64) -> DMatrix<f64> {
        let mut v = self.zzt * tau2;
        for i in 0..v.nrows() {
            v[(i, i)] += sigma2;
        }
        v
    }

    /// REML deviance profiled over `σ²`, with the GLS fit at `θ`
    fn profiled(&self, theta: f64) -> Option<(f64, Gls)> {
        let fit = gls(self.x, self.y, self.marginal(1.0, theta * theta))?;
        let df = self.residual_df();
        let sigma2 = fit.quadratic / df;
        if !(sigma2 > 0.0) {
            return None;
        }
        let deviance = fit.log_det_v
            + fit.log_det_xtvx
            + df * (1.0 + (2.0 * std::f64::consts::PI * sigma2).ln());
        Some((deviance, fit))
    }

    /// REML deviance at `(σ², σ_b²)`, up to an additive constant
    fn deviance(&self, sigma2: f64, tau2: f64) -> Option<f64> {
        let fit = gls(self.x, self.y, self.marginal(sigma2, tau2))?;
        Some(fit.log_det_v + fit.log_det_xtvx + fit.quadratic)
    }

    /// `(X'V⁻¹X)⁻¹` at `(σ², σ_b²)`
    fn coefficient_covariance(&self, sigma2: f64, tau2: f64) -> Option<DMatrix<f64>> {
        gls(self.x, self.y, self.marginal(sigma2, tau2)).map(|fit| fit.xtvx_inv)
    }
}

impl CostFunction for Reml<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self
            .profiled(theta[0].abs())
            .map(|(deviance, _)| deviance)
            .unwrap_or(f64::INFINITY))
    }
}

fn optimize_theta(problem: Reml<'_>, form: ModelForm) -> Result<f64, FitError> {
    let non_convergence = |e: Error| FitError::NonConvergence {
        form,
        reason: e.to_string(),
    };
    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(vec![vec![0.5], vec![1.5]])
        .with_sd_tolerance(1e-12)
        .map_err(non_convergence)?;
    let res = Executor::new(problem, solver)
        .configure(|state| state.max_iters(MAX_ITERS))
        .run()
        .map_err(non_convergence)?;

    if matches!(
        res.state.termination_status,
        TerminationStatus::Terminated(TerminationReason::MaxItersReached)
    ) {
        return Err(FitError::NonConvergence {
            form,
            reason: format!("no convergence after {MAX_ITERS} iterations"),
        });
    }
    let theta = res
        .state
        .best_param
        .as_ref()
        .and_then(|p| p.first().copied())
        .ok_or_else(|| FitError::NonConvergence {
            form,
            reason: "optimizer returned no parameter".to_string(),
        })?
        .abs();
    if !res.state.best_cost.is_finite() {
        return Err(FitError::NonConvergence {
            form,
            reason: "REML deviance is not finite".to_string(),
        });
    }
    tracing::trace!(theta, iterations = res.state.iter, "REML optimum");
    Ok(theta)
}

/// Satterthwaite degrees of freedom for linear functions of `b`
struct Satterthwaite {
    /// Asymptotic covariance of `(σ², σ_b²)`
    vcov_varpar: Matrix2<f64>,
    /// Derivatives of `(X'V⁻¹X)⁻¹` with respect to `σ²` and `σ_b²`
    jacobian: [DMatrix<f64>; 2],
}

impl Satterthwaite {
    fn new(problem: &Reml<'_>, sigma2: f64, tau2: f64) -> Option<Satterthwaite> {
        let (h0, h1) = (FD_STEP * sigma2, FD_STEP * tau2);
        let f = |s: f64, t: f64| problem.deviance(s, t);

        let f0 = f(sigma2, tau2)?;
        let d00 = (f(sigma2 + h0, tau2)? - 2.0 * f0 + f(sigma2 - h0, tau2)?) / (h0 * h0);
        let d11 = (f(sigma2, tau2 + h1)? - 2.0 * f0 + f(sigma2, tau2 - h1)?) / (h1 * h1);
        let d01 = (f(sigma2 + h0, tau2 + h1)? - f(sigma2 + h0, tau2 - h1)?
            - f(sigma2 - h0, tau2 + h1)?
            + f(sigma2 - h0, tau2 - h1)?)
            / (4.0 * h0 * h1);
        let hessian = Matrix2::new(d00, d01, d01, d11);
        let vcov_varpar = hessian.try_inverse()? * 2.0;

        let c = |s: f64, t: f64| problem.coefficient_covariance(s, t);
        let d_sigma = (c(sigma2 + h0, tau2)? - c(sigma2 - h0, tau2)?) / (2.0 * h0);
        let d_tau = (c(sigma2, tau2 + h1)? - c(sigma2, tau2 - h1)?) / (2.0 * h1);

        Some(Satterthwaite {
            vcov_varpar,
            jacobian: [d_sigma, d_tau],
        })
    }

    fn df(&self, l: &DVector<f64>, covariance: &DMatrix<f64>) -> Option<f64> {
        let variance = (l.transpose() * covariance * l)[(0, 0)];
        let gradient = Vector2::new(
            (l.transpose() * &self.jacobian[0] * l)[(0, 0)],
            (l.transpose() * &self.jacobian[1] * l)[(0, 0)],
        );
        let denominator = (gradient.transpose() * self.vcov_varpar * gradient)[(0, 0)];
        let df = 2.0 * variance * variance / denominator;
        (denominator > 0.0 && df.is_finite()).then_some(df)
    }
}

pub(crate) fn fit(
    frame: &ModelFrame,
    parameter: Parameter,
    options: &FitOptions,
) -> Result<ModelResult, FitError> {
    let form = frame.form;
    let design = frame.fixed_design()?;
    let (n, p) = design.x.shape();
    if n <= p {
        return Err(FitError::InsufficientDf { form, n, p });
    }
    if frame.n_subjects() >= n {
        return Err(FitError::Singular {
            form,
            reason: format!(
                "{} subjects for {n} observations, the random intercept is not identifiable",
                frame.n_subjects()
            ),
        });
    }

    let z = frame.subject_incidence();
    let zzt = &z * z.transpose();
    let problem = Reml {
        x: &design.x,
        y: &frame.y,
        zzt: &zzt,
    };

    let theta = optimize_theta(problem, form)?;
    if theta < BOUNDARY_THETA {
        return Err(FitError::BoundaryFit { form });
    }
    let (_, gls_fit) = problem.profiled(theta).ok_or_else(|| FitError::Singular {
        form,
        reason: "marginal covariance is not positive definite".to_string(),
    })?;

    let sigma2 = gls_fit.quadratic / problem.residual_df();
    let tau2 = theta * theta * sigma2;
    let covariance = &gls_fit.xtvx_inv * sigma2;

    let satterthwaite = Satterthwaite::new(&problem, sigma2, tau2);
    let fallback_df = problem.residual_df();
    let df = |l: &DVector<f64>| {
        satterthwaite
            .as_ref()
            .and_then(|s| s.df(l, &covariance))
            .unwrap_or_else(|| {
                tracing::warn!(
                    parameter = %parameter,
                    fallback_df,
                    "Satterthwaite degrees of freedom unavailable, using residual df"
                );
                fallback_df
            })
    };

    let (means, contrast) = emmeans::summarize(
        frame,
        &design,
        &gls_fit.coefficients,
        &covariance,
        options.confidence_level,
        df,
    )?;

    // Conditional residuals: y - Xb - Zu, with u = θ² Z'H⁻¹r
    let random_effects = z.tr_mul(&gls_fit.v_inv_r) * (theta * theta);
    let marginal_residuals = &frame.y - &design.x * &gls_fit.coefficients;
    let conditional = marginal_residuals - &z * random_effects;
    let residuals: Vec<f64> = conditional.iter().copied().collect();

    Ok(ModelResult {
        parameter,
        form,
        confidence_level: options.confidence_level,
        n_observations: n,
        n_subjects: frame.n_subjects(),
        means,
        contrast,
        residual_sd: sigma2.sqrt(),
        variance: VarianceComponents::Subject {
            between: tau2.sqrt(),
            within: sigma2.sqrt(),
        },
        normality: if options.normality {
            shapiro_wilk(&residuals)
        } else {
            None
        },
        residuals,
    })
}
