//! Summary table of back-transformed results
//!
//! [`assemble`] joins back-transformed estimates with subject counts and
//! formats them into display rows. Each parameter contributes one block:
//!
//! ```text
//! Group              Parameter  Treatment  n   adj_gmean  adj_gse  ratio  gse   lower  upper   gCV
//! Primary endpoints  Cmax
//! Primary endpoints             R          16  200.34     1.05     98.76  1.04  92.10  105.90  12.3
//! Primary endpoints             T          16  197.86     1.05
//! ```
//!
//! Ratio, its standard error, the confidence limits and the gCV appear only
//! on the first treatment row of a block.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, fs::File, io, path::Path};

use super::BackTransformed;
use crate::data::{DataError, Dataset, Parameter};

// ============================================================================
// Endpoint groups
// ============================================================================

/// Display group of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointGroup {
    Primary,
    Secondary,
    Other,
}

impl EndpointGroup {
    pub fn label(&self) -> &'static str {
        match self {
            EndpointGroup::Primary => "Primary endpoints",
            EndpointGroup::Secondary => "Secondary endpoint",
            EndpointGroup::Other => "Other",
        }
    }
}

impl fmt::Display for EndpointGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caller-supplied mapping from parameter to display group
///
/// Parameters without an entry are shown under [`EndpointGroup::Other`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointGroups {
    groups: BTreeMap<Parameter, EndpointGroup>,
}

impl Default for EndpointGroups {
    /// AUC0_tz and Cmax are primary, AUCINF_pred is secondary
    fn default() -> Self {
        EndpointGroups::empty()
            .with_group(Parameter::AUC0_tz, EndpointGroup::Primary)
            .with_group(Parameter::Cmax, EndpointGroup::Primary)
            .with_group(Parameter::AUCINF_pred, EndpointGroup::Secondary)
    }
}

impl EndpointGroups {
    /// A mapping that sends every parameter to [`EndpointGroup::Other`]
    pub fn empty() -> Self {
        EndpointGroups {
            groups: BTreeMap::new(),
        }
    }

    pub fn with_group(mut self, parameter: Parameter, group: EndpointGroup) -> Self {
        self.groups.insert(parameter, group);
        self
    }

    pub fn group(&self, parameter: Parameter) -> EndpointGroup {
        self.groups
            .get(&parameter)
            .copied()
            .unwrap_or(EndpointGroup::Other)
    }
}

// ============================================================================
// Rows
// ============================================================================

/// One display row; every value is an already formatted string
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(rename = "Parameter")]
    pub parameter: String,
    #[serde(rename = "Treatment")]
    pub treatment: String,
    #[serde(rename = "Group")]
    pub group: String,
    pub n: String,
    pub adj_gmean: String,
    pub adj_gse: String,
    pub ratio: String,
    pub gse: String,
    pub lower: String,
    pub upper: String,
    #[serde(rename = "gCV")]
    pub gcv: String,
}

impl TableRow {
    /// Whether this row opens a parameter block
    pub fn is_header(&self) -> bool {
        self.treatment.is_empty()
    }

    /// Whether this row carries the ratio, interval and gCV
    pub fn has_ratio(&self) -> bool {
        !self.ratio.is_empty()
    }

    fn cells(&self) -> [&str; 11] {
        [
            &self.group,
            &self.parameter,
            &self.treatment,
            &self.n,
            &self.adj_gmean,
            &self.adj_gse,
            &self.ratio,
            &self.gse,
            &self.lower,
            &self.upper,
            &self.gcv,
        ]
    }
}

const HEADERS: [&str; 11] = [
    "Group",
    "Parameter",
    "Treatment",
    "n",
    "adj_gmean",
    "adj_gse",
    "ratio",
    "gse",
    "lower",
    "upper",
    "gCV",
];

fn fixed(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

/// Build the summary table, one block per result in the given order
pub fn assemble(
    results: &[BackTransformed],
    dataset: &Dataset,
    groups: &EndpointGroups,
) -> SummaryTable {
    let mut rows = Vec::with_capacity(results.len() * 3);
    for result in results {
        let group = groups.group(result.parameter).label().to_string();
        rows.push(TableRow {
            parameter: result.parameter.to_string(),
            group: group.clone(),
            ..TableRow::default()
        });

        for (i, mean) in result.means.iter().enumerate() {
            let mut row = TableRow {
                treatment: mean.treatment.to_string(),
                group: group.clone(),
                n: dataset
                    .subject_count(result.parameter, mean.treatment)
                    .to_string(),
                adj_gmean: fixed(mean.adj_gmean, 2),
                adj_gse: fixed(mean.adj_gse, 2),
                ..TableRow::default()
            };
            if i == 0 {
                row.ratio = fixed(result.ratio, 2);
                row.gse = fixed(result.gse, 2);
                row.lower = fixed(result.lower, 2);
                row.upper = fixed(result.upper, 2);
                row.gcv = fixed(result.gcv, 1);
            }
            rows.push(row);
        }
    }
    SummaryTable { rows }
}

// ============================================================================
// Table
// ============================================================================

/// The flat, endpoint-grouped summary table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryTable {
    rows: Vec<TableRow>,
}

impl SummaryTable {
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of the block labelled `parameter`, header included
    pub fn block(&self, parameter: Parameter) -> &[TableRow] {
        let label = parameter.label();
        let Some(start) = self
            .rows
            .iter()
            .position(|r| r.is_header() && r.parameter == label)
        else {
            return &[];
        };
        let end = self.rows[start + 1..]
            .iter()
            .position(TableRow::is_header)
            .map_or(self.rows.len(), |offset| start + 1 + offset);
        &self.rows[start..end]
    }

    pub fn to_csv_writer<W: io::Write>(&self, writer: W) -> Result<(), DataError> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, DataError> {
        let mut buffer = Vec::new();
        self.to_csv_writer(&mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| DataError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        self.to_csv_writer(File::create(path)?)
    }

    pub fn from_csv_reader<R: io::Read>(reader: R) -> Result<SummaryTable, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        for column in ["Parameter", "Treatment", "Group"] {
            if !headers.iter().any(|h| h == column) {
                return Err(DataError::MissingColumn {
                    column: column.to_string(),
                });
            }
        }
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<TableRow>, _>>()?;
        Ok(SummaryTable { rows })
    }

    pub fn to_json_string(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<SummaryTable, DataError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths = HEADERS.map(str::len);
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row.cells()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let write_line = |f: &mut fmt::Formatter<'_>, cells: [&str; 11]| -> fmt::Result {
            let line = cells
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(f, "{}", line.trim_end())
        };

        write_line(f, HEADERS)?;
        let total = widths.iter().sum::<usize>() + 2 * (widths.len() - 1);
        writeln!(f, "{}", "─".repeat(total))?;
        for row in &self.rows {
            write_line(f, row.cells())?;
        }
        Ok(())
    }
}
