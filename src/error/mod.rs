use thiserror::Error;

use crate::data::DataError;
use crate::model::FitError;

#[derive(Error, Debug)]
pub enum PkbeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Data error: {0}")]
    DataError(#[from] DataError),
    #[error("Model fitting failed: {0}")]
    FitError(#[from] FitError),
}
