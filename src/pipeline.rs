//! End-to-end analysis
//!
//! [`Analysis`] chains the stages for one dataset: the optional imbalance,
//! one model fit per parameter, back-transformation, the summary table and
//! the forest plot.
//!
//! ```rust
//! use pkbe::prelude::*;
//!
//! let data = simulate_crossover(16, 646997).unwrap();
//! let report = Analysis::new(AnalysisOptions::default()).run(&data).unwrap();
//! assert_eq!(report.results.len(), 3);
//! assert_eq!(report.table.len(), 9);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::{DataError, Dataset, Parameter};
use crate::model::{fit_all, FitOptions, ModelKind, ModelResult};
use crate::report::{
    assemble, back_transform_all, BackTransformed, EndpointGroups, ForestPlot, SummaryTable,
};
use crate::simulation::{Balance, ImbalanceSpec};
use crate::PkbeError;

/// Configuration of an [`Analysis`]
///
/// Every field has a default, so a JSON configuration only needs the fields
/// it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub kind: ModelKind,
    pub fit: FitOptions,
    /// Parameters to analyse, in table order; empty means every parameter in
    /// the dataset, in order of first appearance
    pub parameters: Vec<Parameter>,
    pub groups: EndpointGroups,
    pub balance: Balance,
    /// Rows removed when `balance` is [`Balance::Unbalanced`]
    pub imbalance: ImbalanceSpec,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            kind: ModelKind::Fixed,
            fit: FitOptions::default(),
            parameters: Vec::new(),
            groups: EndpointGroups::default(),
            balance: Balance::Balanced,
            imbalance: ImbalanceSpec::default(),
        }
    }
}

impl AnalysisOptions {
    pub fn with_kind(mut self, kind: ModelKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_fit_options(mut self, fit: FitOptions) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_groups(mut self, groups: EndpointGroups) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_balance(mut self, balance: Balance) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_imbalance(mut self, imbalance: ImbalanceSpec) -> Self {
        self.imbalance = imbalance;
        self
    }

    /// Load options from JSON; unknown enum values are rejected
    pub fn from_json(json: &str) -> Result<Self, PkbeError> {
        serde_json::from_str(json)
            .map_err(|e| PkbeError::InvalidArgument(format!("invalid analysis options: {e}")))
    }
}

/// Everything produced by one [`Analysis::run`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub kind: ModelKind,
    pub balance: Balance,
    /// Rows actually analysed, after any imbalance
    pub n_observations: usize,
    pub results: Vec<ModelResult>,
    pub back_transformed: Vec<BackTransformed>,
    pub table: SummaryTable,
    pub forest: ForestPlot,
}

impl AnalysisReport {
    pub fn to_json_string(&self) -> Result<String, PkbeError> {
        serde_json::to_string_pretty(self).map_err(|e| PkbeError::from(DataError::from(e)))
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(first) = self.results.first() {
            writeln!(f, "{} ({}, {} rows)", first.form, self.balance, self.n_observations)?;
        }
        writeln!(f)?;
        write!(f, "{}", self.table)?;
        writeln!(f)?;
        write!(f, "{}", self.forest)?;
        for result in &self.results {
            if let Some(test) = &result.normality {
                writeln!(
                    f,
                    "{}: Shapiro-Wilk W = {:.4}, p = {:.4}",
                    result.parameter, test.statistic, test.p_value
                )?;
            }
        }
        Ok(())
    }
}

/// Runs the fitting and reporting stages with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    options: AnalysisOptions,
}

impl Analysis {
    pub fn new(options: AnalysisOptions) -> Self {
        Analysis { options }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Analyse `dataset`
    ///
    /// # Errors
    ///
    /// Fails on the first parameter that cannot be fitted; no partial report
    /// is returned.
    pub fn run(&self, dataset: &Dataset) -> Result<AnalysisReport, PkbeError> {
        let options = &self.options;
        let data = options.balance.apply(dataset, &options.imbalance)?;
        let parameters = if options.parameters.is_empty() {
            data.parameters()
        } else {
            options.parameters.clone()
        };
        tracing::debug!(
            rows = data.len(),
            parameters = parameters.len(),
            kind = %options.kind,
            balance = %options.balance,
            "starting analysis"
        );

        let results = fit_all(&data, &parameters, options.kind, &options.fit)?;
        let back_transformed = back_transform_all(&results);
        let table = assemble(&back_transformed, &data, &options.groups);
        let forest = ForestPlot::from_results(&back_transformed, &options.groups);

        Ok(AnalysisReport {
            kind: options.kind,
            balance: options.balance,
            n_observations: data.len(),
            results,
            back_transformed,
            table,
            forest,
        })
    }
}
