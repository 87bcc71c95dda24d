//! Adiabatic flash of a benzene/toluene mixture with NRTL activity
//! coefficients, and least-squares estimation of the binary interaction
//! parameters from measured vapor/liquid compositions.
//!
//! The flowsheet consists of a single [FlashUnit] whose specification
//! variables ([Var]) are fixed or freed individually. A model with zero
//! [degrees of freedom](FlashUnit::degrees_of_freedom) is simulated with
//! [FlashUnit::solve]; freeing parameters turns the same model into an
//! estimation problem solved by [ParameterEstimation::solve].
#![warn(clippy::all)]
#![allow(clippy::needless_range_loop)]

/// Print messages with level `Verbosity::Iter` or higher.
#[macro_export]
macro_rules! log_iter {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::Verbosity::Iter {
            println!($($arg)*);
        }
    }
}

/// Print messages with level `Verbosity::Result` or higher.
#[macro_export]
macro_rules! log_result {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::Verbosity::Result {
            println!($($arg)*);
        }
    }
}

mod errors;
pub mod estimator;
pub mod flash;
pub mod parameter;
pub mod properties;
mod variable;

pub use errors::{FlashError, FlashResult};
pub use estimator::{
    EstimationStatus, Loss, Measurement, ParameterEstimation, Phase, VleData,
};
pub use flash::{FlashUnit, Outlet, PhaseRegime, SolverStatus, TerminationCondition};
pub use parameter::{BtxRecord, IdentifierOption, NrtlParameters, NrtlRecord};
pub use properties::PropertyPackage;
pub use variable::{Var, VarKey};

/// Level of detail in the iteration output.
#[derive(Copy, Clone, PartialOrd, PartialEq, Eq, Debug, Default)]
pub enum Verbosity {
    /// Do not print output.
    #[default]
    None,
    /// Print information about the success of failure of the iteration.
    Result,
    /// Print a detailed output for every iteration.
    Iter,
}

/// Options for the flash and estimation solvers.
///
/// If the values are [None], solver specific default
/// values are used.
#[derive(Copy, Clone, Default, Debug)]
pub struct SolverOptions {
    /// Maximum number of iterations.
    pub max_iter: Option<usize>,
    /// Tolerance.
    pub tol: Option<f64>,
    /// Iteration output indicated by the [Verbosity] enum.
    pub verbosity: Verbosity,
}

impl From<(Option<usize>, Option<f64>, Option<Verbosity>)> for SolverOptions {
    fn from(options: (Option<usize>, Option<f64>, Option<Verbosity>)) -> Self {
        Self {
            max_iter: options.0,
            tol: options.1,
            verbosity: options.2.unwrap_or(Verbosity::None),
        }
    }
}

impl SolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn unwrap_or(self, max_iter: usize, tol: f64) -> (usize, f64, Verbosity) {
        (
            self.max_iter.unwrap_or(max_iter),
            self.tol.unwrap_or(tol),
            self.verbosity,
        )
    }
}
