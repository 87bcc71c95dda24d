//! Measured phase compositions used as targets of the estimation.
use crate::errors::FlashResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Outlet phase of a measurement.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Vapor,
    Liquid,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vapor => write!(f, "vap"),
            Self::Liquid => write!(f, "liq"),
        }
    }
}

/// A measured mole fraction of one component in one outlet phase.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Measurement {
    pub phase: Phase,
    pub component: String,
    pub value: f64,
}

impl Measurement {
    pub fn new(phase: Phase, component: &str, value: f64) -> Self {
        Self {
            phase,
            component: component.into(),
            value,
        }
    }

    /// Read a list of measurements from a json file.
    pub fn from_json<P: AsRef<Path>>(file: P) -> FlashResult<Vec<Self>> {
        Ok(serde_json::from_reader(BufReader::new(File::open(file)?))?)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{} = {}", self.phase, self.component, self.value)
    }
}

/// Vapor and liquid mole fraction of one component at equilibrium.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VleData {
    pub component: String,
    pub vapor: f64,
    pub liquid: f64,
}

impl VleData {
    pub fn new(component: &str, vapor: f64, liquid: f64) -> Self {
        Self {
            component: component.into(),
            vapor,
            liquid,
        }
    }

    pub fn measurements(&self) -> Vec<Measurement> {
        vec![
            Measurement::new(Phase::Vapor, &self.component, self.vapor),
            Measurement::new(Phase::Liquid, &self.component, self.liquid),
        ]
    }
}

impl From<VleData> for Vec<Measurement> {
    fn from(data: VleData) -> Self {
        data.measurements()
    }
}
