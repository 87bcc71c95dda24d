use super::{Identifier, IdentifierOption};
use crate::errors::{FlashError, FlashResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::ops::Deref;
use std::path::Path;

/// Parameters of a pure substance.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PureRecord<M> {
    pub identifier: Identifier,
    #[serde(default)]
    pub molarweight: f64,
    #[serde(flatten)]
    pub model_record: M,
}

impl<M> PureRecord<M> {
    pub fn new(identifier: Identifier, molarweight: f64, model_record: M) -> Self {
        Self {
            identifier,
            molarweight,
            model_record,
        }
    }

    /// Read the records of the given substances from a json file.
    ///
    /// The records are returned in the order of `substances`.
    pub fn from_json<P, S>(
        substances: &[S],
        file: P,
        identifier_option: IdentifierOption,
    ) -> FlashResult<Vec<Self>>
    where
        P: AsRef<Path>,
        S: Deref<Target = str>,
        M: DeserializeOwned,
    {
        let mut queried: HashSet<&str> = substances.iter().map(|s| s.deref()).collect();
        if queried.len() != substances.len() {
            return Err(FlashError::IncompatibleParameters(
                "A substance was defined more than once.".to_string(),
            ));
        }

        let file_records: Vec<Self> = serde_json::from_reader(BufReader::new(File::open(file)?))?;
        let mut records: HashMap<&str, Self> = HashMap::with_capacity(substances.len());
        for record in file_records {
            if let Some(id) = record.identifier.as_str(identifier_option) {
                if let Some(id) = queried.take(id) {
                    records.insert(id, record);
                }
            }
            if queried.is_empty() {
                break;
            }
        }

        if !queried.is_empty() {
            let mut missing: Vec<_> = queried.into_iter().collect();
            missing.sort_unstable();
            return Err(FlashError::ComponentsNotFound(format!("{missing:?}")));
        };

        substances
            .iter()
            .map(|s| {
                records
                    .remove(s.deref())
                    .ok_or_else(|| FlashError::ComponentsNotFound(s.to_string()))
            })
            .collect()
    }
}

impl<M: Serialize> fmt::Display for PureRecord<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(&self.model_record)
            .map_err(|_| fmt::Error)?
            .replace('"', "");
        let s = s.replace(',', ", ").replace(':', ": ");
        write!(
            f,
            "PureRecord(identifier={}, molarweight={}, {})",
            self.identifier,
            self.molarweight,
            s.trim_start_matches('{').trim_end_matches('}')
        )
    }
}

/// Parameters describing the interaction of two substances.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BinaryRecord<B> {
    pub id1: Identifier,
    pub id2: Identifier,
    #[serde(flatten)]
    pub model_record: B,
}

impl<B> BinaryRecord<B> {
    pub fn new(id1: Identifier, id2: Identifier, model_record: B) -> Self {
        Self {
            id1,
            id2,
            model_record,
        }
    }

    /// Read all binary records from a json file.
    pub fn from_json<P: AsRef<Path>>(file: P) -> FlashResult<Vec<Self>>
    where
        B: DeserializeOwned,
    {
        Ok(serde_json::from_reader(BufReader::new(File::open(file)?))?)
    }
}

/// Pure component data of the benzene-toluene-xylene property package.
///
/// Temperatures in K, pressures in Pa, heat capacities in J/mol/K
/// and the heat of vaporization in J/mol.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BtxRecord {
    pub temperature_crit: f64,
    pub pressure_crit: f64,
    /// Coefficients A-D of the reduced vapor pressure correlation.
    pub pressure_sat_coeff: [f64; 4],
    /// Ideal gas heat capacity polynomial coefficients in increasing order.
    pub cp_ig: Vec<f64>,
    /// Liquid heat capacity polynomial coefficients in increasing order.
    pub cp_liq: Vec<f64>,
    /// Heat of vaporization at the reference temperature.
    pub dh_vap: f64,
}

impl BtxRecord {
    pub fn benzene() -> PureRecord<Self> {
        PureRecord::new(
            Identifier::new(Some("71-43-2"), Some("benzene"), Some("C6H6")),
            78.1136,
            Self {
                temperature_crit: 562.2,
                pressure_crit: 48.9e5,
                pressure_sat_coeff: [-6.98273, 1.33213, -2.62863, -3.33399],
                cp_ig: vec![-3.392e1, 4.739e-1, -3.017e-4, 7.130e-8],
                cp_liq: vec![1.2944e2, -1.695e-1, 6.4781e-4],
                dh_vap: 3.387e4,
            },
        )
    }

    pub fn toluene() -> PureRecord<Self> {
        PureRecord::new(
            Identifier::new(Some("108-88-3"), Some("toluene"), Some("C7H8")),
            92.1405,
            Self {
                temperature_crit: 591.8,
                pressure_crit: 41.0e5,
                pressure_sat_coeff: [-7.28607, 1.38091, -2.83433, -2.79168],
                cp_ig: vec![-2.435e1, 5.125e-1, -2.765e-4, 4.911e-8],
                cp_liq: vec![1.4014e2, -1.523e-1, 6.95e-4],
                dh_vap: 3.8262e4,
            },
        )
    }
}

/// NRTL parameters of a binary pair.
///
/// `tau12` belongs to `tau[id1, id2]` and `tau21` to `tau[id2, id1]`;
/// `alpha` is used for both directions.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct NrtlRecord {
    pub alpha: f64,
    pub tau12: f64,
    pub tau21: f64,
}

impl NrtlRecord {
    pub fn new(alpha: f64, tau12: f64, tau21: f64) -> Self {
        Self {
            alpha,
            tau12,
            tau21,
        }
    }

    pub fn benzene_toluene() -> BinaryRecord<Self> {
        BinaryRecord::new(
            BtxRecord::benzene().identifier,
            BtxRecord::toluene().identifier,
            Self::new(0.3, 0.1690, -0.1559),
        )
    }
}
