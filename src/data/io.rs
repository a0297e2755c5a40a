//! Dataset interchange
//!
//! A [Dataset] can be stored in two forms produced from the same in-memory
//! table:
//!
//! - **JSON**: structured, keeps the design tag and factor typing and stores
//!   floating-point values at full precision. Reading it back yields an
//!   identical dataset.
//! - **CSV**: human-readable with the columns
//!   `Subject,Sequence,Period,Treatment,Parameter,logPK,PK`. Values are
//!   rounded to [CSV_DECIMALS] places and design-irrelevant columns are left
//!   empty.

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::{fs::File, io, path::Path};

use super::{DataError, Dataset, Design, Observation};

/// Decimal places kept for `logPK` and `PK` in CSV output
pub const CSV_DECIMALS: i32 = 6;

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Subject")]
    subject: u32,
    #[serde(rename = "Sequence", default)]
    sequence: Option<String>,
    #[serde(rename = "Period", default)]
    period: Option<u8>,
    #[serde(rename = "Treatment")]
    treatment: String,
    #[serde(rename = "Parameter")]
    parameter: String,
    #[serde(rename = "logPK")]
    log_pk: f64,
    #[serde(rename = "PK", default)]
    pk: Option<f64>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Columns a CSV file must provide for `design`
fn required_columns(design: Design) -> &'static [&'static str] {
    match design {
        Design::Crossover => &[
            "Subject",
            "Sequence",
            "Period",
            "Treatment",
            "Parameter",
            "logPK",
        ],
        Design::FixedSequence => &["Subject", "Period", "Treatment", "Parameter", "logPK"],
        Design::Parallel => &["Subject", "Treatment", "Parameter", "logPK"],
    }
}

impl Dataset {
    /// Write the dataset as CSV to any writer
    pub fn to_csv_writer<W: io::Write>(&self, writer: W) -> Result<(), DataError> {
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
        for obs in self.observations() {
            writer.serialize(CsvRow {
                subject: obs.subject(),
                sequence: obs.sequence().map(|s| s.to_string()),
                period: obs.period(),
                treatment: obs.treatment().to_string(),
                parameter: obs.parameter().to_string(),
                log_pk: round_to(obs.log_pk(), CSV_DECIMALS),
                pk: Some(round_to(obs.pk(), CSV_DECIMALS)),
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the dataset to a CSV file
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let file = File::create(path)?;
        self.to_csv_writer(file)
    }

    /// Render the dataset as a CSV string
    pub fn to_csv_string(&self) -> Result<String, DataError> {
        let mut buffer = Vec::new();
        self.to_csv_writer(&mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| DataError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Read a CSV dataset produced for `design`
    ///
    /// Header names are matched exactly. Missing required columns are reported
    /// before any row is parsed. A missing `PK` column is recomputed from
    /// `logPK`.
    pub fn from_csv_reader<R: io::Read>(reader: R, design: Design) -> Result<Dataset, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        for column in required_columns(design) {
            if !headers.iter().any(|h| h == *column) {
                return Err(DataError::MissingColumn {
                    column: column.to_string(),
                });
            }
        }

        let mut observations = Vec::new();
        for row in reader.deserialize() {
            let row: CsvRow = row?;
            let sequence = match row.sequence.as_deref() {
                Some(s) if !s.is_empty() => Some(s.parse()?),
                _ => None,
            };
            let obs = Observation::new(
                row.subject,
                sequence,
                row.period,
                row.treatment.parse()?,
                row.parameter.parse()?,
                row.log_pk,
            );
            observations.push(match row.pk {
                Some(pk) => obs.with_pk(pk),
                None => obs,
            });
        }

        let dataset = Dataset::new(design, observations);
        dataset.validate()?;
        Ok(dataset)
    }

    /// Read a CSV file produced for `design`
    pub fn read_csv(path: impl AsRef<Path>, design: Design) -> Result<Dataset, DataError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file, design)
    }

    /// Write the dataset as pretty-printed JSON to any writer
    pub fn to_json_writer<W: io::Write>(&self, writer: W) -> Result<(), DataError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Write the dataset to a JSON file
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let file = File::create(path)?;
        self.to_json_writer(io::BufWriter::new(file))
    }

    pub fn to_json_string(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Dataset, DataError> {
        let dataset: Dataset = serde_json::from_str(json)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Read a JSON dataset file
    pub fn read_json(path: impl AsRef<Path>) -> Result<Dataset, DataError> {
        let file = File::open(path)?;
        let dataset: Dataset = serde_json::from_reader(io::BufReader::new(file))?;
        dataset.validate()?;
        Ok(dataset)
    }
}
