//! Reporting: back-transformation, the summary table, the forest plot and
//! comparisons between analyses

pub mod back_transform;
pub mod compare;
pub mod forest;
pub mod table;

pub use back_transform::{
    back_transform, back_transform_all, gcv_percent, ratio_percent, BackTransformed,
    GeometricMean, BE_LOWER, BE_UPPER,
};
pub use compare::{compare_tables, Comparison};
pub use forest::{ForestPlot, ForestPoint};
pub use table::{assemble, EndpointGroup, EndpointGroups, SummaryTable, TableRow};
