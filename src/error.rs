//! Crate-level error type.

use thiserror::Error;

use crate::domain::aggregates::RunError;

#[derive(Error, Debug)]
pub enum DemoDataError {
    #[error("Invalid table order: {0}")]
    InvalidTableOrder(String),

    #[error("Run error: {0}")]
    Run(#[from] RunError),
}

pub type Result<T> = std::result::Result<T, DemoDataError>;
