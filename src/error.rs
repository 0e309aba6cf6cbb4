use thiserror::Error;

/// Errors raised by the simulation core.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("invalid parameter `{name}`: {value} (must be {requirement})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        requirement: &'static str,
    },
    #[error("event trace did not cover the movie duration after {attempts} attempts")]
    DegenerateTrace { attempts: usize },
    #[error("structure table contains no binding sites")]
    EmptyStructure,
    #[error("binding site {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
    #[error("structure columns differ in length: expected {expected}, found {found}")]
    MismatchedLengths { expected: usize, found: usize },
    #[error("photon table has {table} rows but the structure has {sites} sites")]
    TableMismatch { table: usize, sites: usize },
    #[error("frame index {runner} is out of range for a movie of {frames} frames")]
    FrameOutOfRange { runner: usize, frames: usize },
    #[error("distribution parameters rejected: {0}")]
    Distribution(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, SimulationError>;

impl SimulationError {
    pub(crate) fn distribution(err: impl std::fmt::Display) -> Self {
        SimulationError::Distribution(err.to_string())
    }
}

/// Fails with `InvalidParameter` unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimulationError::InvalidParameter {
            name,
            value,
            requirement: "finite and > 0",
        })
    }
}

/// Fails with `InvalidParameter` unless `value` is finite and not negative.
pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimulationError::InvalidParameter {
            name,
            value,
            requirement: "finite and >= 0",
        })
    }
}
