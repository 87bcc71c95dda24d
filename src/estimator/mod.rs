//! Estimation of model parameters from measured phase compositions.
mod dataset;
pub use dataset::{Measurement, Phase, VleData};
mod estimation;
pub use estimation::{EstimationStatus, ParameterEstimation};
mod loss;
pub use loss::Loss;
