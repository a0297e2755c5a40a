//! Simulation of bioavailability trial datasets
//!
//! Three designs are supported:
//!
//! | Design | Assignment | Random effects |
//! |--------|------------|----------------|
//! | Crossover | block-randomized TR / RT sequences | subject effect + residual per period |
//! | Fixed-sequence | every subject gets the same order | subject effect + residual per period |
//! | Parallel | treatments allocated by ratio | one residual per subject |
//!
//! The random generator is always passed in explicitly. [`simulate_seeded`]
//! and the `simulate_*` shortcuts build a [`StdRng`] from a seed, so the
//! same seed always produces the same dataset.
//!
//! ```rust
//! use pkbe::simulation::{simulate_crossover, drop_period, ImbalanceSpec};
//!
//! let balanced = simulate_crossover(16, 646997).unwrap();
//! assert_eq!(balanced.len(), 96);
//!
//! let unbalanced = drop_period(&balanced, &ImbalanceSpec::new(vec![5, 6], 2)).unwrap();
//! assert_eq!(unbalanced.len(), 90);
//! ```

mod designs;
pub mod imbalance;
pub mod reference;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, Design, Parameter, Sequence};
use crate::PkbeError;

pub use designs::simulate;
pub use imbalance::{drop_period, Balance, ImbalanceSpec};
pub use reference::{ParameterVariability, PopulationMean, ReferenceTable, Variability};

/// Seed used by the reference simulations
pub const DEFAULT_SEED: u64 = 646997;

/// Allocation ratio of a parallel-group design (reference : test)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub reference: u32,
    pub test: u32,
}

impl Default for Allocation {
    fn default() -> Self {
        Allocation {
            reference: 1,
            test: 1,
        }
    }
}

impl Allocation {
    pub fn new(reference: u32, test: u32) -> Self {
        Allocation { reference, test }
    }

    /// Group sizes `(reference, test)` for `n` subjects
    ///
    /// The reference share is rounded to the nearest subject and the test
    /// group takes the remainder. Both groups must end up non-empty.
    pub fn group_sizes(&self, n: usize) -> Result<(usize, usize), PkbeError> {
        let empty = || {
            PkbeError::InvalidArgument(format!(
                "allocation {}:{} leaves a treatment group of {n} subjects empty",
                self.reference, self.test
            ))
        };
        if self.reference == 0 || self.test == 0 {
            return Err(empty());
        }
        let total = u64::from(self.reference) + u64::from(self.test);
        let share = f64::from(self.reference) / total as f64;
        let n_reference = ((n as f64) * share).round() as usize;
        if n_reference == 0 || n_reference >= n {
            return Err(empty());
        }
        Ok((n_reference, n - n_reference))
    }
}

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOptions {
    pub design: Design,
    pub n_subjects: usize,
    pub seed: u64,
    /// Treatment order of the fixed-sequence design
    pub sequence: Sequence,
    /// Allocation ratio of the parallel design
    pub allocation: Allocation,
    pub parameters: Vec<Parameter>,
    pub reference: ReferenceTable,
}

impl SimulationOptions {
    /// Defaults for `design`: 16 subjects for the two-period designs, 80 for
    /// the parallel design, all three parameters, the default reference table
    pub fn new(design: Design) -> Self {
        SimulationOptions {
            design,
            n_subjects: match design {
                Design::Parallel => 80,
                _ => 16,
            },
            seed: DEFAULT_SEED,
            sequence: Sequence::RT,
            allocation: Allocation::default(),
            parameters: Parameter::ALL.to_vec(),
            reference: ReferenceTable::for_design(design),
        }
    }

    pub fn with_subjects(mut self, n_subjects: usize) -> Self {
        self.n_subjects = n_subjects;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_allocation(mut self, allocation: Allocation) -> Self {
        self.allocation = allocation;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_reference(mut self, reference: ReferenceTable) -> Self {
        self.reference = reference;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, PkbeError> {
        serde_json::from_str(json)
            .map_err(|e| PkbeError::InvalidArgument(format!("invalid simulation options: {e}")))
    }

    pub(crate) fn validate(&self) -> Result<(), PkbeError> {
        if self.n_subjects < 2 {
            return Err(PkbeError::InvalidArgument(format!(
                "at least 2 subjects are needed, got {}",
                self.n_subjects
            )));
        }
        if self.parameters.is_empty() {
            return Err(PkbeError::InvalidArgument(
                "no parameters to simulate".to_string(),
            ));
        }
        for (i, p) in self.parameters.iter().enumerate() {
            if self.parameters[..i].contains(p) {
                return Err(PkbeError::InvalidArgument(format!(
                    "parameter {p} is listed twice"
                )));
            }
        }
        self.reference.check(self.design, &self.parameters)
    }
}

/// Simulate with a generator seeded from `options.seed`
pub fn simulate_seeded(options: &SimulationOptions) -> Result<Dataset, PkbeError> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    simulate(options, &mut rng)
}

/// Balanced two-sequence crossover with the default reference table
pub fn simulate_crossover(n_subjects: usize, seed: u64) -> Result<Dataset, PkbeError> {
    simulate_seeded(
        &SimulationOptions::new(Design::Crossover)
            .with_subjects(n_subjects)
            .with_seed(seed),
    )
}

/// Fixed-sequence design (R then T) with the default reference table
pub fn simulate_fixed_sequence(n_subjects: usize, seed: u64) -> Result<Dataset, PkbeError> {
    simulate_seeded(
        &SimulationOptions::new(Design::FixedSequence)
            .with_subjects(n_subjects)
            .with_seed(seed),
    )
}

/// Parallel-group design with the default reference table
pub fn simulate_parallel(
    n_subjects: usize,
    seed: u64,
    allocation: Allocation,
) -> Result<Dataset, PkbeError> {
    simulate_seeded(
        &SimulationOptions::new(Design::Parallel)
            .with_subjects(n_subjects)
            .with_seed(seed)
            .with_allocation(allocation),
    )
}
