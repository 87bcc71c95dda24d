use std::io;
use thiserror::Error;

/// Error type for improperly specified models and convergence problems.
#[derive(Error, Debug)]
pub enum FlashError {
    // errors related to algorithms
    #[error("`{0}` did not converge within the maximum number of iterations.")]
    NotConverged(String),
    #[error("`{0}` encountered illegal values during the iteration.")]
    IterationFailed(String),
    #[error("Singular Jacobian in `{0}`.")]
    SingularMatrix(String),
    #[error("Invalid state in {0}: {1} = {2}.")]
    InvalidState(String, String, f64),
    #[error("Undetermined state: {0}.")]
    UndeterminedState(String),
    #[error("No phase split according to Rachford-Rice.")]
    NoPhaseSplit,

    // errors related to the model specification
    #[error("The model has {found} degree(s) of freedom, expected {expected}.")]
    DegreesOfFreedom { expected: usize, found: usize },
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error(
        "Property package is initialized for {0} components while the input specifies {1} components."
    )]
    IncompatibleComponents(usize, usize),

    // errors related to file handling
    #[error(transparent)]
    FileIO(#[from] io::Error),

    // json errors
    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    // errors related to parameter handling
    #[error("The following component(s) were not found: {0}")]
    ComponentsNotFound(String),
    #[error("Incompatible parameters: {0}")]
    IncompatibleParameters(String),
}

/// Convenience type for `Result<T, FlashError>`.
pub type FlashResult<T> = Result<T, FlashError>;
