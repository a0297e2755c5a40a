pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod simulation;

pub use crate::data::{Dataset, Design, Observation, Parameter, Sequence, Treatment};
pub use crate::pipeline::{Analysis, AnalysisOptions, AnalysisReport};
pub use error::PkbeError;

pub mod prelude {
    pub mod data {
        pub use crate::data::{DataError, Dataset, Design, Observation, Parameter, Sequence, Treatment};
    }
    pub mod simulation {
        pub use crate::simulation::{
            drop_period, simulate, simulate_crossover, simulate_fixed_sequence, simulate_parallel,
            simulate_seeded, Allocation, Balance, ImbalanceSpec, ReferenceTable,
            SimulationOptions, Variability,
        };
    }
    pub mod model {
        pub use crate::model::{
            fit, fit_all, FitError, FitOptions, ModelForm, ModelKind, ModelResult,
            VarianceComponents,
        };
    }
    pub mod report {
        pub use crate::report::{
            assemble, back_transform, compare_tables, BackTransformed, EndpointGroup,
            EndpointGroups, ForestPlot, SummaryTable,
        };
    }

    pub use self::data::*;
    pub use self::model::*;
    pub use self::report::*;
    pub use self::simulation::*;
    pub use crate::pipeline::{Analysis, AnalysisOptions, AnalysisReport};
    pub use crate::PkbeError;
}
