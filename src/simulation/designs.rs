use rand::{seq::SliceRandom, Rng};
use rand_distr::{Distribution, Normal};

use super::{SimulationOptions, Variability};
use crate::data::{Dataset, Design, Observation, Parameter, Sequence, Treatment};
use crate::PkbeError;

/// Simulate a dataset for `options.design` using `rng`
///
/// The generator is consumed in a fixed order (assignment first, then the
/// subject effects, then the residuals), so identical generator states
/// always give identical datasets.
///
/// Rows are ordered by subject, then period, then parameter (in the order
/// of `options.parameters`).
pub fn simulate<R: Rng + ?Sized>(
    options: &SimulationOptions,
    rng: &mut R,
) -> Result<Dataset, PkbeError> {
    options.validate()?;

    let dataset = match options.design {
        Design::Crossover => {
            let mut sequences: Vec<Sequence> = (0..options.n_subjects)
                .map(|i| Sequence::LEVELS[i % Sequence::LEVELS.len()])
                .collect();
            sequences.shuffle(rng);
            repeated_measures(options, &sequences, rng)?
        }
        Design::FixedSequence => {
            let sequences = vec![options.sequence; options.n_subjects];
            repeated_measures(options, &sequences, rng)?
        }
        Design::Parallel => parallel(options, rng)?,
    };

    tracing::debug!(
        design = %options.design,
        subjects = options.n_subjects,
        rows = dataset.len(),
        "simulated dataset"
    );
    Ok(dataset)
}

fn normal(sd: f64) -> Result<Normal<f64>, PkbeError> {
    Normal::new(0.0, sd)
        .map_err(|e| PkbeError::InvalidArgument(format!("invalid standard deviation {sd}: {e}")))
}

fn log_mean(
    options: &SimulationOptions,
    treatment: Treatment,
    parameter: Parameter,
) -> Result<f64, PkbeError> {
    options.reference.mean(treatment, parameter).ok_or_else(|| {
        PkbeError::InvalidArgument(format!("no mean for {treatment} / {parameter}"))
    })
}

/// Crossover and fixed-sequence designs: both periods for every subject
fn repeated_measures<R: Rng + ?Sized>(
    options: &SimulationOptions,
    sequences: &[Sequence],
    rng: &mut R,
) -> Result<Dataset, PkbeError> {
    let parameters = &options.parameters;
    let mut between = Vec::with_capacity(parameters.len());
    let mut within = Vec::with_capacity(parameters.len());
    for &parameter in parameters {
        match options.reference.variability(parameter) {
            Some(Variability::BetweenWithin {
                between: b,
                within: w,
            }) => {
                between.push(normal(b)?);
                within.push(normal(w)?);
            }
            other => {
                return Err(PkbeError::InvalidArgument(format!(
                    "{} design needs between/within variability for {parameter}, got {other:?}",
                    options.design
                )))
            }
        }
    }

    // One effect per (subject, parameter), shared by both periods
    let mut effects = Vec::with_capacity(sequences.len() * parameters.len());
    for _ in sequences {
        for dist in &between {
            effects.push(dist.sample(rng));
        }
    }

    let n_periods = options.design.n_periods();
    let mut observations = Vec::with_capacity(sequences.len() * n_periods * parameters.len());
    for (i, &sequence) in sequences.iter().enumerate() {
        let subject = (i + 1) as u32;
        for period in 1..=n_periods as u8 {
            let treatment = sequence.treatment_in(period).ok_or_else(|| {
                PkbeError::InvalidArgument(format!("sequence {sequence} has no period {period}"))
            })?;
            for (j, &parameter) in parameters.iter().enumerate() {
                let residual = within[j].sample(rng);
                let log_pk = log_mean(options, treatment, parameter)?
                    + effects[i * parameters.len() + j]
                    + residual;
                observations.push(Observation::new(
                    subject,
                    Some(sequence),
                    Some(period),
                    treatment,
                    parameter,
                    log_pk,
                ));
            }
        }
    }

    Ok(Dataset::new(options.design, observations))
}

/// Parallel-group design: one treatment and one residual per subject
fn parallel<R: Rng + ?Sized>(
    options: &SimulationOptions,
    rng: &mut R,
) -> Result<Dataset, PkbeError> {
    let (n_reference, n_test) = options.allocation.group_sizes(options.n_subjects)?;
    let mut groups: Vec<Treatment> = std::iter::repeat(Treatment::Reference)
        .take(n_reference)
        .chain(std::iter::repeat(Treatment::Test).take(n_test))
        .collect();
    groups.shuffle(rng);

    let mut residuals = Vec::with_capacity(options.parameters.len());
    for &parameter in &options.parameters {
        match options.reference.variability(parameter) {
            Some(Variability::Total { sd }) => residuals.push(normal(sd)?),
            other => {
                return Err(PkbeError::InvalidArgument(format!(
                    "parallel design needs a single standard deviation for {parameter}, got {other:?}"
                )))
            }
        }
    }

    let mut observations = Vec::with_capacity(groups.len() * options.parameters.len());
    for (i, &treatment) in groups.iter().enumerate() {
        for (j, &parameter) in options.parameters.iter().enumerate() {
            let log_pk = log_mean(options, treatment, parameter)? + residuals[j].sample(rng);
            observations.push(Observation::new(
                (i + 1) as u32,
                None,
                None,
                treatment,
                parameter,
                log_pk,
            ));
        }
    }

    Ok(Dataset::new(Design::Parallel, observations))
}
