//! Pure component and binary interaction parameters.
use crate::errors::{FlashError, FlashResult};
use crate::variable::Var;
use nalgebra::DMatrix;
use std::fmt;

mod identifier;
mod model_record;

pub use identifier::{Identifier, IdentifierOption};
pub use model_record::{BinaryRecord, BtxRecord, NrtlRecord, PureRecord};

/// NRTL non-randomness (`alpha`) and interaction (`tau`) parameters.
///
/// Both matrices are indexed `[i, j]` with the component indices of the
/// property package. Diagonal entries are zero unless set otherwise.
#[derive(Clone, Debug)]
pub struct NrtlParameters {
    pub alpha: DMatrix<Var>,
    pub tau: DMatrix<Var>,
}

impl NrtlParameters {
    /// Parameters of `n` components without any interactions.
    pub fn new(n: usize) -> Self {
        Self {
            alpha: DMatrix::from_element(n, n, Var::new(0.0)),
            tau: DMatrix::from_element(n, n, Var::new(0.0)),
        }
    }

    /// Build the parameter matrices from binary records.
    ///
    /// `identifiers` are the identifiers of the components in the order of
    /// the property package. Records of pairs that are not part of the
    /// system are ignored.
    pub fn from_records(
        identifiers: &[Identifier],
        binary_records: &[BinaryRecord<NrtlRecord>],
        identifier_option: IdentifierOption,
    ) -> FlashResult<Self> {
        let n = identifiers.len();
        let mut parameters = Self::new(n);
        let index = |id: &Identifier| {
            id.as_str(identifier_option).and_then(|id| {
                identifiers
                    .iter()
                    .position(|c| c.as_str(identifier_option) == Some(id))
            })
        };
        for record in binary_records {
            let (Some(i), Some(j)) = (index(&record.id1), index(&record.id2)) else {
                continue;
            };
            if i == j {
                return Err(FlashError::IncompatibleParameters(format!(
                    "binary record for {} with itself",
                    record.id1
                )));
            }
            let r = record.model_record;
            parameters.alpha[(i, j)].set_value(r.alpha);
            parameters.alpha[(j, i)].set_value(r.alpha);
            parameters.tau[(i, j)].set_value(r.tau12);
            parameters.tau[(j, i)].set_value(r.tau21);
        }
        Ok(parameters)
    }

    pub fn components(&self) -> usize {
        self.tau.nrows()
    }

    /// Fix all parameters at their current values.
    pub fn fix_all(&mut self) {
        for v in self.alpha.iter_mut().chain(self.tau.iter_mut()) {
            v.fix(v.value());
        }
    }

    /// Current values of the `alpha` and `tau` matrices.
    pub fn values(&self) -> (DMatrix<f64>, DMatrix<f64>) {
        (self.alpha.map(|v| v.value()), self.tau.map(|v| v.value()))
    }
}

impl fmt::Display for NrtlParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.components();
        for (name, matrix) in [("alpha", &self.alpha), ("tau", &self.tau)] {
            writeln!(f, "{name} : Size={}", n * n)?;
            writeln!(
                f,
                "    {:<8} : {:>8} : {:>14} : {:>8} : {:>5}",
                "Key", "Lower", "Value", "Upper", "Fixed"
            )?;
            for i in 0..n {
                for j in 0..n {
                    writeln!(f, "    ({i}, {j})   : {}", matrix[(i, j)])?;
                }
            }
        }
        Ok(())
    }
}
