use crate::parameter::BtxRecord;
use num_dual::DualNum;

/// Reference temperature of the enthalpy correlations in K.
pub const TEMPERATURE_REF: f64 = 298.15;

impl BtxRecord {
    /// Vapor pressure in Pa.
    ///
    /// `ln(p_sat / p_c) = (A x + B x^1.5 + C x^3 + D x^6) / (1 - x)`
    /// with `x = 1 - T / T_c`.
    pub fn pressure_sat<D: DualNum<f64> + Copy>(&self, temperature: D) -> D {
        let [a, b, c, d] = self.pressure_sat_coeff;
        let x = -temperature / self.temperature_crit + 1.0;
        let num = x * a + x.powf(1.5) * b + x.powi(3) * c + x.powi(6) * d;
        (num / (-x + 1.0)).exp() * self.pressure_crit
    }

    /// Molar enthalpy of the pure liquid relative to the liquid at
    /// the reference temperature in J/mol.
    pub fn enth_mol_liq<D: DualNum<f64> + Copy>(&self, temperature: D) -> D {
        integrate_polynomial(&self.cp_liq, temperature)
    }

    /// Molar enthalpy of the pure ideal gas relative to the liquid at
    /// the reference temperature in J/mol.
    pub fn enth_mol_vap<D: DualNum<f64> + Copy>(&self, temperature: D) -> D {
        integrate_polynomial(&self.cp_ig, temperature) + self.dh_vap
    }
}

// int_{T_ref}^{T} sum_k c_k t^k dt
fn integrate_polynomial<D: DualNum<f64> + Copy>(coefs: &[f64], temperature: D) -> D {
    let mut h = D::from(0.0);
    for (k, &c) in coefs.iter().enumerate() {
        let e = k as i32 + 1;
        let c = c / e as f64;
        h += (temperature.powi(e) - TEMPERATURE_REF.powi(e)) * c;
    }
    h
}
