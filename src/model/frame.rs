//! Model frames: factor coding, fixed-effects design matrices and the
//! reference grid used for marginal means

use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

use super::{FitError, ModelForm};
use crate::data::{DataError, Observation, Treatment};
use crate::PkbeError;

/// Relative tolerance below which a column is treated as aliased
const ALIAS_TOLERANCE: f64 = 1e-7;

/// A categorical term coded with treatment contrasts (first level dropped)
#[derive(Debug, Clone)]
pub(crate) struct Factor {
    pub name: &'static str,
    /// Level index of every row
    pub codes: Vec<usize>,
    pub n_levels: usize,
    /// Weight of every level in the reference grid, summing to one
    pub weights: Vec<f64>,
}

impl Factor {
    /// Levels are the sorted distinct keys; grid weights are equal
    fn new<K: Ord + Copy>(name: &'static str, keys: &[K]) -> Factor {
        let mut levels: BTreeMap<K, usize> = BTreeMap::new();
        for &key in keys {
            levels.entry(key).or_insert(0);
        }
        for (index, slot) in levels.values_mut().enumerate() {
            *slot = index;
        }
        let n_levels = levels.len();
        Factor {
            name,
            codes: keys.iter().map(|k| levels[k]).collect(),
            n_levels,
            weights: vec![1.0 / n_levels as f64; n_levels],
        }
    }

    /// Weight each level by its share of distinct subjects, as when
    /// subjects are nested in this factor
    fn weighted_by_subjects(mut self, subjects: &Factor) -> Factor {
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); self.n_levels];
        for (&level, &subject) in self.codes.iter().zip(&subjects.codes) {
            if !members[level].contains(&subject) {
                members[level].push(subject);
            }
        }
        let total: usize = members.iter().map(Vec::len).sum();
        self.weights = members
            .iter()
            .map(|m| m.len() as f64 / total as f64)
            .collect();
        self
    }
}

/// Fixed-effects design matrix restricted to non-aliased columns
#[derive(Debug, Clone)]
pub(crate) struct FixedDesign {
    pub x: DMatrix<f64>,
    /// Indices of the retained columns in the full coding
    pub kept: Vec<usize>,
    pub full_width: usize,
}

/// Response and terms of one model fit
#[derive(Debug, Clone)]
pub(crate) struct ModelFrame {
    pub form: ModelForm,
    pub y: DVector<f64>,
    /// Fixed factors other than treatment, in formula order
    pub factors: Vec<Factor>,
    pub treatment: Factor,
    /// Grouping of the random intercept
    pub subject: Factor,
}

fn require<T>(value: Option<T>, row: usize, field: &str, form: ModelForm) -> Result<T, DataError> {
    value.ok_or_else(|| DataError::MissingField {
        row,
        field: field.to_string(),
        design: form.design().to_string(),
    })
}

impl ModelFrame {
    pub fn new(form: ModelForm, rows: &[&Observation]) -> Result<ModelFrame, PkbeError> {
        let subject_keys: Vec<u32> = rows.iter().map(|o| o.subject()).collect();
        let subject = Factor::new("Subject", &subject_keys);

        let periods = || -> Result<Factor, DataError> {
            let keys = rows
                .iter()
                .enumerate()
                .map(|(i, o)| require(o.period(), i, "Period", form))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Factor::new("Period", &keys))
        };
        let sequences = || -> Result<Factor, DataError> {
            let keys = rows
                .iter()
                .enumerate()
                .map(|(i, o)| require(o.sequence(), i, "Sequence", form))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Factor::new("Sequence", &keys))
        };

        let factors = match form {
            ModelForm::CrossoverFixed => vec![
                sequences()?.weighted_by_subjects(&subject),
                subject.clone(),
                periods()?,
            ],
            ModelForm::CrossoverMixed => vec![sequences()?, periods()?],
            ModelForm::FixedSequenceFixed => vec![subject.clone()],
            ModelForm::FixedSequenceMixed | ModelForm::ParallelGls => Vec::new(),
        };

        let treatment = Factor {
            name: "Treatment",
            codes: rows.iter().map(|o| o.treatment().index()).collect(),
            n_levels: Treatment::LEVELS.len(),
            weights: vec![0.5, 0.5],
        };

        Ok(ModelFrame {
            form,
            y: DVector::from_iterator(rows.len(), rows.iter().map(|o| o.log_pk())),
            factors,
            treatment,
            subject,
        })
    }

    pub fn n(&self) -> usize {
        self.y.len()
    }

    pub fn n_subjects(&self) -> usize {
        self.subject.n_levels
    }

    /// Width of the full coding: intercept, factor contrasts, treatment
    fn full_width(&self) -> usize {
        1 + self
            .factors
            .iter()
            .map(|f| f.n_levels - 1)
            .sum::<usize>()
            + (self.treatment.n_levels - 1)
    }

    fn full_matrix(&self) -> DMatrix<f64> {
        let n = self.n();
        let mut x = DMatrix::zeros(n, self.full_width());
        for i in 0..n {
            x[(i, 0)] = 1.0;
            let mut offset = 1;
            for factor in self.factors.iter().chain(std::iter::once(&self.treatment)) {
                let code = factor.codes[i];
                if code > 0 {
                    x[(i, offset + code - 1)] = 1.0;
                }
                offset += factor.n_levels - 1;
            }
        }
        x
    }

    /// Design matrix with aliased columns removed
    ///
    /// Columns are scanned left to right and a column is dropped when it is
    /// (numerically) a linear combination of the columns kept before it. The
    /// treatment column comes last, so it is only dropped when the treatment
    /// effect is confounded with the other terms.
    pub fn fixed_design(&self) -> Result<FixedDesign, FitError> {
        let full = self.full_matrix();
        let kept = independent_columns(&full);
        let full_width = full.ncols();
        if !kept.contains(&(full_width - 1)) {
            return Err(FitError::NotEstimable { form: self.form });
        }
        let x = full.select_columns(kept.iter());
        Ok(FixedDesign {
            x,
            kept,
            full_width,
        })
    }

    /// Averaged design row of the reference grid for `treatment`
    ///
    /// Every other factor is averaged over its levels with the factor's grid
    /// weights, which gives the estimated marginal mean of `treatment`.
    pub fn grid_row(&self, treatment: Treatment, design: &FixedDesign) -> DVector<f64> {
        let mut full = vec![0.0; design.full_width];
        full[0] = 1.0;
        let mut offset = 1;
        for factor in &self.factors {
            for level in 1..factor.n_levels {
                full[offset + level - 1] = factor.weights[level];
            }
            offset += factor.n_levels - 1;
        }
        if treatment.index() > 0 {
            full[offset + treatment.index() - 1] = 1.0;
        }
        DVector::from_iterator(design.kept.len(), design.kept.iter().map(|&j| full[j]))
    }

    /// Subject incidence matrix of the random intercept (n × subjects)
    pub fn subject_incidence(&self) -> DMatrix<f64> {
        let mut z = DMatrix::zeros(self.n(), self.subject.n_levels);
        for (i, &code) in self.subject.codes.iter().enumerate() {
            z[(i, code)] = 1.0;
        }
        z
    }

    /// Names of the terms in coding order, for logging
    pub fn term_names(&self) -> Vec<&'static str> {
        self.factors
            .iter()
            .map(|f| f.name)
            .chain(std::iter::once(self.treatment.name))
            .collect()
    }
}

/// Indices of a maximal set of linearly independent columns, scanning left
/// to right (Gram–Schmidt with re-orthogonalization)
pub(crate) fn independent_columns(x: &DMatrix<f64>) -> Vec<usize> {
    let mut basis: Vec<DVector<f64>> = Vec::new();
    let mut kept = Vec::new();
    for j in 0..x.ncols() {
        let column = x.column(j).into_owned();
        let norm = column.norm();
        if norm == 0.0 {
            continue;
        }
        let mut v = column;
        for _ in 0..2 {
            for q in &basis {
                let c = q.dot(&v);
                v.axpy(-c, q, 1.0);
            }
        }
        let residual = v.norm();
        if residual > ALIAS_TOLERANCE * norm {
            basis.push(v / residual);
            kept.push(j);
        }
    }
    kept
}
