use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{DataError, Design, Parameter, Sequence, Treatment};

/// A single pharmacokinetic measurement
///
/// One [Observation] is recorded per subject, period and [Parameter]. The
/// natural-scale value is always `exp(log_pk)`, so only the log-scale value
/// is accepted on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    subject: u32,
    sequence: Option<Sequence>,
    period: Option<u8>,
    treatment: Treatment,
    parameter: Parameter,
    log_pk: f64,
    pk: f64,
}

impl Observation {
    /// Create a new observation from its log-scale value
    ///
    /// # Arguments
    ///
    /// * `subject` - Subject identifier
    /// * `sequence` - Sequence the subject was assigned to, if the design has one
    /// * `period` - Period (1-based), if the design has periods
    /// * `treatment` - Treatment received
    /// * `parameter` - PK parameter measured
    /// * `log_pk` - Natural logarithm of the PK value
    pub fn new(
        subject: u32,
        sequence: Option<Sequence>,
        period: Option<u8>,
        treatment: Treatment,
        parameter: Parameter,
        log_pk: f64,
    ) -> Self {
        Observation {
            subject,
            sequence,
            period,
            treatment,
            parameter,
            log_pk,
            pk: log_pk.exp(),
        }
    }

    /// Build an observation whose natural-scale value was stored separately,
    /// e.g. with reduced precision in a text file
    pub(crate) fn with_pk(mut self, pk: f64) -> Self {
        self.pk = pk;
        self
    }

    pub fn subject(&self) -> u32 {
        self.subject
    }

    pub fn sequence(&self) -> Option<Sequence> {
        self.sequence
    }

    pub fn period(&self) -> Option<u8> {
        self.period
    }

    pub fn treatment(&self) -> Treatment {
        self.treatment
    }

    pub fn parameter(&self) -> Parameter {
        self.parameter
    }

    /// Log-scale PK value
    pub fn log_pk(&self) -> f64 {
        self.log_pk
    }

    /// Natural-scale PK value
    pub fn pk(&self) -> f64 {
        self.pk
    }
}

/// A simulated or loaded bioavailability dataset
///
/// A [Dataset] is tagged with the [Design] that produced it and holds its
/// observations in a stable order. It is never mutated after construction;
/// operations such as [Dataset::filter] return a new dataset.
///
/// # Examples
///
/// ```
/// use pkbe::prelude::*;
///
/// let obs = vec![
///     Observation::new(1, Some(Sequence::TR), Some(1), Treatment::Test, Parameter::Cmax, 4.6),
///     Observation::new(1, Some(Sequence::TR), Some(2), Treatment::Reference, Parameter::Cmax, 4.5),
/// ];
/// let data = Dataset::new(Design::Crossover, obs);
/// assert_eq!(data.len(), 2);
/// assert_eq!(data.subjects(), vec![1]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    design: Design,
    observations: Vec<Observation>,
}

impl Dataset {
    /// Constructs a new [Dataset] from its design and observations
    pub fn new(design: Design, observations: Vec<Observation>) -> Self {
        Dataset {
            design,
            observations,
        }
    }

    pub fn design(&self) -> Design {
        self.design
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Distinct subject identifiers, sorted
    pub fn subjects(&self) -> Vec<u32> {
        self.observations
            .iter()
            .map(|o| o.subject)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct parameters in order of first appearance
    pub fn parameters(&self) -> Vec<Parameter> {
        let mut seen = Vec::new();
        for obs in &self.observations {
            if !seen.contains(&obs.parameter) {
                seen.push(obs.parameter);
            }
        }
        seen
    }

    /// Observations for a single parameter, in dataset order
    pub fn for_parameter(&self, parameter: Parameter) -> Vec<&Observation> {
        self.observations
            .iter()
            .filter(|o| o.parameter == parameter)
            .collect()
    }

    /// Number of distinct subjects observed under `treatment` for `parameter`
    pub fn subject_count(&self, parameter: Parameter, treatment: Treatment) -> usize {
        self.observations
            .iter()
            .filter(|o| o.parameter == parameter && o.treatment == treatment)
            .map(|o| o.subject)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// A new dataset holding only the observations for which `keep` is true
    pub fn filter<F>(&self, keep: F) -> Dataset
    where
        F: Fn(&Observation) -> bool,
    {
        Dataset {
            design: self.design,
            observations: self
                .observations
                .iter()
                .filter(|o| keep(o))
                .cloned()
                .collect(),
        }
    }

    /// Check that every row carries the fields the design needs
    ///
    /// Crossover rows need a sequence and a period, fixed-sequence rows need
    /// a period. Parallel rows need neither.
    pub fn validate(&self) -> Result<(), DataError> {
        for (row, obs) in self.observations.iter().enumerate() {
            if self.design.has_periods() && obs.period.is_none() {
                return Err(DataError::MissingField {
                    row,
                    field: "Period".to_string(),
                    design: self.design.to_string(),
                });
            }
            if self.design == Design::Crossover && obs.sequence.is_none() {
                return Err(DataError::MissingField {
                    row,
                    field: "Sequence".to_string(),
                    design: self.design.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Dataset {
        let mut obs = Vec::new();
        for subject in 1..=3u32 {
            let seq = if subject % 2 == 0 { Sequence::RT } else { Sequence::TR };
            for period in 1..=2u8 {
                let trt = seq.treatment_in(period).unwrap();
                for parameter in Parameter::ALL {
                    obs.push(Observation::new(
                        subject,
                        Some(seq),
                        Some(period),
                        trt,
                        parameter,
                        subject as f64 + period as f64 / 10.0,
                    ));
                }
            }
        }
        Dataset::new(Design::Crossover, obs)
    }

    #[test]
    fn pk_is_exp_of_log_pk() {
        let obs = Observation::new(1, None, None, Treatment::Test, Parameter::Cmax, 2.0);
        assert_eq!(obs.pk(), 2.0f64.exp());
    }

    #[test]
    fn counts_and_parameters() {
        let data = small();
        assert_eq!(data.len(), 18);
        assert_eq!(data.subjects(), vec![1, 2, 3]);
        assert_eq!(data.parameters(), Parameter::ALL.to_vec());
        assert_eq!(data.for_parameter(Parameter::Cmax).len(), 6);
        assert_eq!(data.subject_count(Parameter::Cmax, Treatment::Test), 3);
    }

    #[test]
    fn filter_returns_subset() {
        let data = small();
        let only_first = data.filter(|o| o.period() == Some(1));
        assert_eq!(only_first.len(), 9);
        assert_eq!(data.len(), 18);
    }

    #[test]
    fn validate_rejects_missing_period() {
        let obs = vec![Observation::new(
            1,
            Some(Sequence::TR),
            None,
            Treatment::Test,
            Parameter::Cmax,
            1.0,
        )];
        let data = Dataset::new(Design::Crossover, obs);
        assert!(matches!(
            data.validate(),
            Err(DataError::MissingField { ref field, .. }) if field == "Period"
        ));
    }
}
