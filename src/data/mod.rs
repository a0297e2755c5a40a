pub mod error;
pub mod factors;
pub mod io;
pub mod structs;
pub use error::DataError;
pub use factors::*;
pub use structs::{Dataset, Observation};
