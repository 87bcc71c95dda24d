//! Benzene-toluene VLE property package with an ideal vapor phase and
//! NRTL activity coefficients in the liquid phase.
use crate::errors::{FlashError, FlashResult};
use crate::parameter::{
    BinaryRecord, BtxRecord, Identifier, IdentifierOption, NrtlParameters, NrtlRecord,
    PureRecord,
};
use crate::variable::Var;
use indexmap::IndexSet;
use num_dual::DualNum;
use std::path::Path;

mod nrtl;
mod pure;

pub use nrtl::ln_activity_coefficients;
pub use pure::TEMPERATURE_REF;

/// Component data and NRTL parameters of a mixture.
#[derive(Clone, Debug)]
pub struct PropertyPackage {
    components: IndexSet<String>,
    pub pure_records: Vec<PureRecord<BtxRecord>>,
    pub nrtl: NrtlParameters,
}

impl PropertyPackage {
    /// Create the property package from pure and binary records.
    pub fn new(
        pure_records: Vec<PureRecord<BtxRecord>>,
        binary_records: &[BinaryRecord<NrtlRecord>],
        identifier_option: IdentifierOption,
    ) -> FlashResult<Self> {
        let identifiers: Vec<Identifier> =
            pure_records.iter().map(|r| r.identifier.clone()).collect();
        let components: IndexSet<String> = identifiers
            .iter()
            .enumerate()
            .map(|(i, id)| {
                id.as_readable_str()
                    .map_or_else(|| format!("component {i}"), String::from)
            })
            .collect();
        if components.len() != pure_records.len() {
            return Err(FlashError::IncompatibleParameters(
                "A substance was defined more than once.".to_string(),
            ));
        }
        let nrtl = NrtlParameters::from_records(&identifiers, binary_records, identifier_option)?;
        Ok(Self {
            components,
            pure_records,
            nrtl,
        })
    }

    /// Benzene and toluene with the built-in component data.
    pub fn btx() -> Self {
        let pure_records = vec![BtxRecord::benzene(), BtxRecord::toluene()];
        let identifiers: Vec<_> = pure_records.iter().map(|r| r.identifier.clone()).collect();
        let mut nrtl = NrtlParameters::new(2);
        let r = NrtlRecord::benzene_toluene().model_record;
        nrtl.alpha[(0, 1)].set_value(r.alpha);
        nrtl.alpha[(1, 0)].set_value(r.alpha);
        nrtl.tau[(0, 1)].set_value(r.tau12);
        nrtl.tau[(1, 0)].set_value(r.tau21);
        Self {
            components: identifiers
                .iter()
                .filter_map(|id| id.name.clone())
                .collect(),
            pure_records,
            nrtl,
        }
    }

    /// Read the property package from json files.
    pub fn from_json<P, S>(
        substances: &[S],
        pure_path: P,
        binary_path: Option<P>,
        identifier_option: IdentifierOption,
    ) -> FlashResult<Self>
    where
        P: AsRef<Path>,
        S: std::ops::Deref<Target = str>,
    {
        let pure_records = PureRecord::from_json(substances, pure_path, identifier_option)?;
        let binary_records = binary_path
            .map(BinaryRecord::from_json)
            .transpose()?
            .unwrap_or_default();
        Self::new(pure_records, &binary_records, identifier_option)
    }

    pub fn components(&self) -> usize {
        self.pure_records.len()
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(String::as_str).collect()
    }

    /// Index of a component given its readable name.
    pub fn component_index(&self, component: &str) -> FlashResult<usize> {
        self.components
            .get_index_of(component)
            .ok_or_else(|| FlashError::ComponentsNotFound(component.to_string()))
    }

    pub fn alpha_mut(&mut self, i: &str, j: &str) -> FlashResult<&mut Var> {
        let (i, j) = (self.component_index(i)?, self.component_index(j)?);
        Ok(&mut self.nrtl.alpha[(i, j)])
    }

    pub fn tau_mut(&mut self, i: &str, j: &str) -> FlashResult<&mut Var> {
        let (i, j) = (self.component_index(i)?, self.component_index(j)?);
        Ok(&mut self.nrtl.tau[(i, j)])
    }

    pub fn tau(&self, i: &str, j: &str) -> FlashResult<&Var> {
        let (i, j) = (self.component_index(i)?, self.component_index(j)?);
        Ok(&self.nrtl.tau[(i, j)])
    }

    /// Equilibrium ratios `K_i = gamma_i p_sat,i / p` of the modified Raoult's law.
    pub fn k_values<D: DualNum<f64> + Copy>(
        &self,
        temperature: D,
        pressure: D,
        x: &[D],
        alpha: &[D],
        tau: &[D],
    ) -> Vec<D> {
        let ln_gamma = ln_activity_coefficients(alpha, tau, x);
        self.pure_records
            .iter()
            .zip(ln_gamma)
            .map(|(r, lg)| lg.exp() * r.model_record.pressure_sat(temperature) / pressure)
            .collect()
    }

    /// Molar enthalpy of a liquid mixture in J/mol (ideal mixing).
    pub fn enth_mol_liq<D: DualNum<f64> + Copy>(&self, temperature: D, x: &[D]) -> D {
        self.pure_records
            .iter()
            .zip(x)
            .fold(D::from(0.0), |acc, (r, &xi)| {
                acc + xi * r.model_record.enth_mol_liq(temperature)
            })
    }

    /// Molar enthalpy of an ideal gas mixture in J/mol.
    pub fn enth_mol_vap<D: DualNum<f64> + Copy>(&self, temperature: D, y: &[D]) -> D {
        self.pure_records
            .iter()
            .zip(y)
            .fold(D::from(0.0), |acc, (r, &yi)| {
                acc + yi * r.model_record.enth_mol_vap(temperature)
            })
    }
}
