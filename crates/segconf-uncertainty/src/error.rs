use thiserror::Error;

#[derive(Error, Debug)]
pub enum UncertaintyError {
    /// The estimator needs at least one stochastic pass.
    #[error("MC-dropout sample count must be at least 1, got {samples}")]
    InvalidSampleCount { samples: usize },
}

pub type UncertaintyResult<T> = Result<T, UncertaintyError>;
