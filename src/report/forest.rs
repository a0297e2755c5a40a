//! Forest plot data
//!
//! A [ForestPlot] holds one point per parameter with its ratio and
//! confidence limits in percent, plus the acceptance limits. It renders as a
//! small text plot on a logarithmic axis.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{BackTransformed, EndpointGroups, BE_LOWER, BE_UPPER};
use crate::data::Parameter;

const PLOT_WIDTH: usize = 48;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestPoint {
    pub parameter: Parameter,
    pub group: String,
    pub ratio: f64,
    pub lower: f64,
    pub upper: f64,
    pub bioequivalent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestPlot {
    pub points: Vec<ForestPoint>,
    /// Acceptance limits, in percent
    pub limits: (f64, f64),
    pub confidence_level: f64,
}

impl ForestPlot {
    pub fn from_results(results: &[BackTransformed], groups: &EndpointGroups) -> ForestPlot {
        ForestPlot {
            points: results
                .iter()
                .map(|r| ForestPoint {
                    parameter: r.parameter,
                    group: groups.group(r.parameter).to_string(),
                    ratio: r.ratio,
                    lower: r.lower,
                    upper: r.upper,
                    bioequivalent: r.is_bioequivalent(),
                })
                .collect(),
            limits: (BE_LOWER, BE_UPPER),
            confidence_level: results.first().map_or(0.90, |r| r.confidence_level),
        }
    }

    /// Axis range in percent covering every interval and both limits
    pub fn axis(&self) -> (f64, f64) {
        let finite = |v: &f64| v.is_finite() && *v > 0.0;
        let lo = self
            .points
            .iter()
            .map(|p| p.lower)
            .filter(finite)
            .fold(self.limits.0, f64::min);
        let hi = self
            .points
            .iter()
            .map(|p| p.upper)
            .filter(finite)
            .fold(self.limits.1, f64::max);
        (lo * 0.95, hi * 1.05)
    }
}

impl fmt::Display for ForestPlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lo, hi) = self.axis();
        let span = (hi / lo).ln();
        let column = |v: f64| -> usize {
            let x = (v.max(lo).min(hi) / lo).ln() / span;
            (x * (PLOT_WIDTH - 1) as f64).round() as usize
        };
        let label_width = self
            .points
            .iter()
            .map(|p| p.parameter.label().len())
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "Ratio T/R (%) with {:.0}% CI, limits {:.2}–{:.2}",
            self.confidence_level * 100.0,
            self.limits.0,
            self.limits.1
        )?;
        for p in &self.points {
            let mut line = vec![' '; PLOT_WIDTH];
            line[column(self.limits.0)] = '¦';
            line[column(100.0)] = ':';
            line[column(self.limits.1)] = '¦';
            let (a, b) = (column(p.lower), column(p.upper));
            for cell in line.iter_mut().take(b + 1).skip(a) {
                *cell = '─';
            }
            line[a] = '[';
            line[b] = ']';
            line[column(p.ratio)] = '●';
            writeln!(
                f,
                "{:<label_width$}  {}  {:.2} ({:.2}, {:.2}){}",
                p.parameter.label(),
                line.into_iter().collect::<String>(),
                p.ratio,
                p.lower,
                p.upper,
                if p.bioequivalent { "" } else { " *" }
            )?;
        }
        Ok(())
    }
}
