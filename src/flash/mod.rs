//! Steady-state flash unit with a single inlet and a vapor and a liquid outlet.
use crate::errors::{FlashError, FlashResult};
use crate::properties::PropertyPackage;
use crate::variable::{Var, VarKey};
use crate::SolverOptions;
use nalgebra::{DMatrix, DVector};
use num_dual::Dual64;
use quantity::{Energy, Moles, Pressure, Temperature, JOULE, KELVIN, MOL, PASCAL};

mod equations;
mod report;
mod tp_flash;

use equations::{EquationSystem, Layout, Specification};
pub(crate) use tp_flash::rachford_rice;

const MAX_ITER_FLASH: usize = 100;
const TOL_FLASH: f64 = 1e-10;
const MAX_ITER_TP: usize = 400;
const TOL_TP: f64 = 1e-12;
const MAX_REGIME_SWITCHES: usize = 4;
const TOL_MOLEFRACS: f64 = 1e-6;

/// Phases present in a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseRegime {
    TwoPhase,
    /// Subcooled liquid; the vapor composition is the incipient bubble.
    Liquid,
    /// Superheated vapor; the liquid composition is the incipient dew.
    Vapor,
}

/// Reason for the termination of a solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationCondition {
    /// Converged to the requested tolerance.
    Optimal,
    /// Stopped at the iteration limit without meeting the tolerance.
    MaxIterations,
}

/// Outcome of a successful solver run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverStatus {
    pub termination: TerminationCondition,
    pub iterations: usize,
}

impl SolverStatus {
    pub fn is_converged(&self) -> bool {
        self.termination == TerminationCondition::Optimal
    }
}

/// Inlet port of the flash unit.
///
/// Flow in mol, temperature in K, pressure in Pa.
#[derive(Clone, Debug)]
pub struct Inlet {
    pub flow_mol: Var,
    pub temperature: Var,
    pub pressure: Var,
    pub mole_frac_comp: Vec<Var>,
}

/// State of an outlet stream.
#[derive(Clone, Debug)]
pub struct Outlet {
    pub flow: Moles,
    pub temperature: Temperature,
    pub pressure: Pressure,
    pub molefracs: DVector<f64>,
}

/// Derivatives of the outlet state with respect to specification variables.
///
/// Every matrix has one column per requested variable.
#[derive(Clone, Debug)]
pub struct Sensitivity {
    /// `d x_i / d p_k` of the liquid outlet.
    pub liquid: DMatrix<f64>,
    /// `d y_i / d p_k` of the vapor outlet.
    pub vapor: DMatrix<f64>,
    /// `d beta / d p_k` of the outlet.
    pub vapor_fraction: DVector<f64>,
    /// `d T / d p_k` of the outlet in K per unit of `p_k`.
    pub temperature: DVector<f64>,
}

#[derive(Clone, Debug)]
struct FlashState {
    unknowns: DVector<f64>,
    regimes: [PhaseRegime; 2],
}

/// A flash unit with fixed heat duty and pressure change.
///
/// The inlet state is equilibrated with the property package, the outlet
/// leaves at `p_in + deltap` with an enthalpy given by the energy balance
/// `F h_in + Q = F h_out`.
#[derive(Clone, Debug)]
pub struct FlashUnit {
    pub properties: PropertyPackage,
    pub inlet: Inlet,
    /// Heat added to the unit in J.
    pub heat_duty: Var,
    /// Pressure change across the unit in Pa.
    pub deltap: Var,
    state: Option<FlashState>,
}

impl FlashUnit {
    /// Create a flash unit with all specification variables unfixed.
    pub fn new(properties: PropertyPackage) -> Self {
        let n = properties.components();
        let inlet = Inlet {
            flow_mol: Var::new(1.0),
            temperature: Var::new(298.15),
            pressure: Var::new(101325.0),
            mole_frac_comp: vec![Var::new(1.0 / n as f64); n],
        };
        Self {
            properties,
            inlet,
            heat_duty: Var::new(0.0),
            deltap: Var::new(0.0),
            state: None,
        }
    }

    /// Fix the complete inlet state.
    pub fn fix_inlet(
        &mut self,
        flow: Moles,
        temperature: Temperature,
        pressure: Pressure,
        molefracs: &[f64],
    ) -> FlashResult<()> {
        let n = self.properties.components();
        if molefracs.len() != n {
            return Err(FlashError::IncompatibleComponents(n, molefracs.len()));
        }
        self.inlet.flow_mol.fix(flow.convert_into(MOL));
        self.inlet.temperature.fix(temperature.convert_into(KELVIN));
        self.inlet.pressure.fix(pressure.convert_into(PASCAL));
        for (v, &z) in self.inlet.mole_frac_comp.iter_mut().zip(molefracs) {
            v.fix(z);
        }
        Ok(())
    }

    pub fn fix_heat_duty(&mut self, heat_duty: Energy) {
        self.heat_duty.fix(heat_duty.convert_into(JOULE));
    }

    pub fn fix_deltap(&mut self, deltap: Pressure) {
        self.deltap.fix(deltap.convert_into(PASCAL));
    }

    /// Inlet mole fraction of a component.
    pub fn mole_frac_comp_mut(&mut self, component: &str) -> FlashResult<&mut Var> {
        let i = self.properties.component_index(component)?;
        Ok(&mut self.inlet.mole_frac_comp[i])
    }

    /// All specification variables of the flowsheet.
    pub fn variable_keys(&self) -> Vec<VarKey> {
        let n = self.properties.components();
        let mut keys = vec![VarKey::FlowMol, VarKey::Temperature, VarKey::Pressure];
        keys.extend((0..n).map(VarKey::MoleFrac));
        keys.extend([VarKey::HeatDuty, VarKey::DeltaP]);
        for i in 0..n {
            keys.extend((0..n).map(|j| VarKey::Alpha(i, j)));
        }
        for i in 0..n {
            keys.extend((0..n).map(|j| VarKey::Tau(i, j)));
        }
        keys
    }

    pub fn var(&self, key: VarKey) -> FlashResult<&Var> {
        let n = self.properties.components();
        let missing = || FlashError::UnknownVariable(format!("{key:?}"));
        match key {
            VarKey::FlowMol => Ok(&self.inlet.flow_mol),
            VarKey::Temperature => Ok(&self.inlet.temperature),
            VarKey::Pressure => Ok(&self.inlet.pressure),
            VarKey::MoleFrac(i) => self.inlet.mole_frac_comp.get(i).ok_or_else(missing),
            VarKey::HeatDuty => Ok(&self.heat_duty),
            VarKey::DeltaP => Ok(&self.deltap),
            VarKey::Alpha(i, j) if i < n && j < n => Ok(&self.properties.nrtl.alpha[(i, j)]),
            VarKey::Tau(i, j) if i < n && j < n => Ok(&self.properties.nrtl.tau[(i, j)]),
            _ => Err(missing()),
        }
    }

    pub fn var_mut(&mut self, key: VarKey) -> FlashResult<&mut Var> {
        let n = self.properties.components();
        let missing = || FlashError::UnknownVariable(format!("{key:?}"));
        match key {
            VarKey::FlowMol => Ok(&mut self.inlet.flow_mol),
            VarKey::Temperature => Ok(&mut self.inlet.temperature),
            VarKey::Pressure => Ok(&mut self.inlet.pressure),
            VarKey::MoleFrac(i) => self.inlet.mole_frac_comp.get_mut(i).ok_or_else(missing),
            VarKey::HeatDuty => Ok(&mut self.heat_duty),
            VarKey::DeltaP => Ok(&mut self.deltap),
            VarKey::Alpha(i, j) if i < n && j < n => {
                Ok(&mut self.properties.nrtl.alpha[(i, j)])
            }
            VarKey::Tau(i, j) if i < n && j < n => Ok(&mut self.properties.nrtl.tau[(i, j)]),
            _ => Err(missing()),
        }
    }

    /// Readable name of a specification variable.
    pub fn variable_name(&self, key: VarKey) -> String {
        key.name(&self.properties.component_names())
    }

    /// Specification variables that are not fixed.
    pub fn unfixed_variables(&self) -> Vec<VarKey> {
        self.variable_keys()
            .into_iter()
            .filter(|&k| self.var(k).is_ok_and(|v| !v.is_fixed()))
            .collect()
    }

    /// Degrees of freedom of the model.
    ///
    /// The state equations form a square system, so every unfixed
    /// specification variable adds one degree of freedom.
    pub fn degrees_of_freedom(&self) -> usize {
        self.unfixed_variables().len()
    }

    fn check_degrees_of_freedom(&self, expected: usize) -> FlashResult<()> {
        let found = self.degrees_of_freedom();
        if found != expected {
            return Err(FlashError::DegreesOfFreedom { expected, found });
        }
        Ok(())
    }

    fn specification<D, F: Fn(VarKey, f64) -> D>(&self, seed: F) -> Specification<D> {
        let n = self.properties.components();
        let matrix = |m: &DMatrix<Var>, key: fn(usize, usize) -> VarKey| -> Vec<D> {
            (0..n)
                .flat_map(|i| (0..n).map(move |j| (i, j)))
                .map(|(i, j)| seed(key(i, j), m[(i, j)].value()))
                .collect()
        };
        Specification {
            flow: seed(VarKey::FlowMol, self.inlet.flow_mol.value()),
            temperature: seed(VarKey::Temperature, self.inlet.temperature.value()),
            pressure: seed(VarKey::Pressure, self.inlet.pressure.value()),
            molefracs: self
                .inlet
                .mole_frac_comp
                .iter()
                .enumerate()
                .map(|(i, v)| seed(VarKey::MoleFrac(i), v.value()))
                .collect(),
            heat_duty: seed(VarKey::HeatDuty, self.heat_duty.value()),
            deltap: seed(VarKey::DeltaP, self.deltap.value()),
            alpha: matrix(&self.properties.nrtl.alpha, VarKey::Alpha),
            tau: matrix(&self.properties.nrtl.tau, VarKey::Tau),
        }
    }

    fn validate_inlet(&self) -> FlashResult<()> {
        let invalid = |name: &str, value: f64| {
            Err(FlashError::InvalidState(
                "flash inlet".into(),
                name.into(),
                value,
            ))
        };
        let i = &self.inlet;
        if !(i.flow_mol.value() > 0.0) {
            return invalid("flow_mol", i.flow_mol.value());
        }
        if !(i.temperature.value() > 0.0) {
            return invalid("temperature", i.temperature.value());
        }
        if !(i.pressure.value() + self.deltap.value() > 0.0) {
            return invalid("outlet pressure", i.pressure.value() + self.deltap.value());
        }
        if let Some(z) = i.mole_frac_comp.iter().find(|z| !(z.value() >= 0.0)) {
            return invalid("mole_frac_comp", z.value());
        }
        let sum: f64 = i.mole_frac_comp.iter().map(Var::value).sum();
        if (sum - 1.0).abs() > TOL_MOLEFRACS {
            return invalid("sum(mole_frac_comp)", sum);
        }
        Ok(())
    }

    /// Initialize both states with a Tp-flash at inlet conditions.
    pub fn initialize(&mut self, options: SolverOptions) -> FlashResult<()> {
        self.check_degrees_of_freedom(0)?;
        self.initialize_state(options)
    }

    fn initialize_state(&mut self, options: SolverOptions) -> FlashResult<()> {
        self.validate_inlet()?;
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_TP, TOL_TP);
        let spec = self.specification(|_, v| v);
        let layout = Layout::new(self.properties.components());

        let mut unknowns = DVector::zeros(layout.size());
        let mut regimes = [PhaseRegime::TwoPhase; 2];
        let pressures = [spec.pressure, spec.pressure + spec.deltap];
        for (block, &pressure) in pressures.iter().enumerate() {
            let split = tp_flash::tp_flash(
                &self.properties,
                spec.temperature,
                pressure,
                &spec.molefracs,
                &spec.alpha,
                &spec.tau,
                max_iter,
                tol,
                verbosity,
            )?;
            for (i, (x, y)) in layout.x(block).zip(layout.y(block)).enumerate() {
                unknowns[x] = split.x[i];
                unknowns[y] = split.y[i];
            }
            unknowns[layout.beta(block)] = split.beta;
            regimes[block] = split.regime;
        }
        unknowns[layout.temperature()] = spec.temperature;
        log_result!(
            verbosity,
            "flash: initialization complete, regimes {:?}",
            regimes
        );
        self.state = Some(FlashState { unknowns, regimes });
        Ok(())
    }

    /// Solve the flash unit.
    ///
    /// The model must have zero degrees of freedom. If the unit has not
    /// been solved or initialized before, it is initialized first;
    /// otherwise the previous solution is used as initial guess.
    pub fn solve(&mut self, options: SolverOptions) -> FlashResult<SolverStatus> {
        self.check_degrees_of_freedom(0)?;
        self.converge(options)
    }

    /// Solve the state equations for the current values of all variables,
    /// regardless of which of them are fixed.
    pub(crate) fn converge(&mut self, options: SolverOptions) -> FlashResult<SolverStatus> {
        self.validate_inlet()?;
        if self.state.is_none() {
            self.initialize_state(options)?;
        }
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_FLASH, TOL_FLASH);
        let spec = self.specification(|_, v| v);
        let mut state = self
            .state
            .clone()
            .ok_or_else(|| FlashError::UndeterminedState("flash is not initialized".into()))?;

        let mut iterations = 0;
        for _ in 0..MAX_REGIME_SWITCHES {
            let system = EquationSystem::new(&self.properties, state.regimes);
            iterations += system.newton(&spec, &mut state.unknowns, max_iter, tol, verbosity)?;

            let mut switched = false;
            for block in 0..2 {
                let regime = self.check_regime(&system, block, &spec, &mut state);
                if regime != state.regimes[block] {
                    log_result!(
                        verbosity,
                        "flash: state {} switches from {:?} to {:?}",
                        block,
                        state.regimes[block],
                        regime
                    );
                    state.regimes[block] = regime;
                    switched = true;
                }
            }
            if !switched {
                log_result!(
                    verbosity,
                    "flash: calculation converged in {} step(s)\n",
                    iterations
                );
                self.state = Some(state);
                return Ok(SolverStatus {
                    termination: TerminationCondition::Optimal,
                    iterations,
                });
            }
        }
        Err(FlashError::NotConverged("flash phase regime".into()))
    }

    // Regime consistent with the converged state of a block.
    fn check_regime(
        &self,
        system: &EquationSystem,
        block: usize,
        spec: &Specification<f64>,
        state: &mut FlashState,
    ) -> PhaseRegime {
        let l = system.layout;
        let u = &mut state.unknowns;
        let beta = u[l.beta(block)];
        match state.regimes[block] {
            PhaseRegime::TwoPhase if beta < 0.0 => {
                u[l.beta(block)] = 0.0;
                PhaseRegime::Liquid
            }
            PhaseRegime::TwoPhase if beta > 1.0 => {
                u[l.beta(block)] = 1.0;
                PhaseRegime::Vapor
            }
            PhaseRegime::TwoPhase => PhaseRegime::TwoPhase,
            regime => {
                let (t, p) = system.conditions(block, spec, u.as_slice());
                let x: Vec<f64> = l.x(block).map(|i| u[i]).collect();
                let y: Vec<f64> = l.y(block).map(|i| u[i]).collect();
                let k = self.properties.k_values(t, p, &x, &spec.alpha, &spec.tau);
                let phase_split = match regime {
                    PhaseRegime::Liquid => x.iter().zip(&k).map(|(x, k)| x * k).sum::<f64>(),
                    _ => y.iter().zip(&k).map(|(y, k)| y / k).sum::<f64>(),
                } > 1.0 + TOL_FLASH;
                if !phase_split {
                    return regime;
                }
                // restart from the phase boundary
                let z = &spec.molefracs;
                if let Ok(beta) = rachford_rice(z, &k, None) {
                    for (i, (xi, yi)) in l.x(block).zip(l.y(block)).enumerate() {
                        u[xi] = z[i] / (1.0 - beta + beta * k[i]);
                        u[yi] = k[i] * u[xi];
                    }
                    u[l.beta(block)] = beta;
                }
                PhaseRegime::TwoPhase
            }
        }
    }

    fn solved_state(&self) -> FlashResult<&FlashState> {
        self.state
            .as_ref()
            .ok_or_else(|| FlashError::UndeterminedState("flash has not been solved".into()))
    }

    fn outlet(&self, vapor: bool) -> FlashResult<Outlet> {
        let state = self.solved_state()?;
        let l = Layout::new(self.properties.components());
        let u = &state.unknowns;
        let beta = u[l.beta(1)];
        let (fraction, range) = if vapor {
            (beta, l.y(1))
        } else {
            (1.0 - beta, l.x(1))
        };
        Ok(Outlet {
            flow: self.inlet.flow_mol.value() * fraction * MOL,
            temperature: u[l.temperature()] * KELVIN,
            pressure: (self.inlet.pressure.value() + self.deltap.value()) * PASCAL,
            molefracs: u.rows(range.start, range.len()).into_owned(),
        })
    }

    /// Vapor outlet of the solved unit.
    pub fn vap_outlet(&self) -> FlashResult<Outlet> {
        self.outlet(true)
    }

    /// Liquid outlet of the solved unit.
    pub fn liq_outlet(&self) -> FlashResult<Outlet> {
        self.outlet(false)
    }

    /// Molar vapor fraction of the outlet.
    pub fn vapor_fraction(&self) -> FlashResult<f64> {
        let l = Layout::new(self.properties.components());
        Ok(self.solved_state()?.unknowns[l.beta(1)])
    }

    /// Phase regimes of the inlet and the outlet state.
    pub fn phase_regimes(&self) -> FlashResult<[PhaseRegime; 2]> {
        Ok(self.solved_state()?.regimes)
    }

    /// Derivatives of the solved outlet state with respect to the given
    /// specification variables.
    ///
    /// With the state equations `F(u, p) = 0` the derivatives follow from
    /// `du/dp = -(dF/du)^-1 dF/dp`, where `dF/dp` is obtained from a single
    /// evaluation of the residuals in dual numbers.
    pub fn sensitivity(&self, keys: &[VarKey]) -> FlashResult<Sensitivity> {
        for &key in keys {
            self.var(key)?;
        }
        let state = self.solved_state()?;
        let system = EquationSystem::new(&self.properties, state.regimes);
        let l = system.layout;
        let spec = self.specification(|_, v| v);
        let (_, jac) = system.jacobian(&spec, &state.unknowns);
        let lu = jac.lu();
        let u: Vec<_> = state.unknowns.iter().map(|&u| Dual64::from(u)).collect();

        let mut du_dp = DMatrix::zeros(l.size(), keys.len());
        for (c, &key) in keys.iter().enumerate() {
            let spec = self.specification(|k, v| {
                let v = Dual64::from(v);
                if k == key {
                    v.derivative()
                } else {
                    v
                }
            });
            let df_dp = DVector::from_iterator(
                l.size(),
                system.residuals(&spec, &u).into_iter().map(|r| -r.eps),
            );
            let du = lu
                .solve(&df_dp)
                .ok_or_else(|| FlashError::SingularMatrix("flash sensitivity".into()))?;
            du_dp.set_column(c, &du);
        }

        let (x, y) = (l.x(1), l.y(1));
        Ok(Sensitivity {
            liquid: du_dp.rows(x.start, x.len()).into_owned(),
            vapor: du_dp.rows(y.start, y.len()).into_owned(),
            vapor_fraction: du_dp.row(l.beta(1)).transpose(),
            temperature: du_dp.row(l.temperature()).transpose(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn btx_flash() -> FlashResult<FlashUnit> {
        let mut flash = FlashUnit::new(PropertyPackage::btx());
        flash.fix_inlet(1.0 * MOL, 368.0 * KELVIN, 101325.0 * PASCAL, &[0.5, 0.5])?;
        flash.fix_heat_duty(0.0 * JOULE);
        flash.fix_deltap(0.0 * PASCAL);
        flash.properties.nrtl.fix_all();
        Ok(flash)
    }

    #[test]
    fn degrees_of_freedom() -> FlashResult<()> {
        let flash = FlashUnit::new(PropertyPackage::btx());
        assert_eq!(flash.degrees_of_freedom(), 15);
        assert_eq!(btx_flash()?.degrees_of_freedom(), 0);
        Ok(())
    }

    #[test]
    fn solve_requires_square_model() -> FlashResult<()> {
        let mut flash = btx_flash()?;
        flash.properties.tau_mut("benzene", "toluene")?.unfix();
        assert!(matches!(
            flash.solve(SolverOptions::default()),
            Err(FlashError::DegreesOfFreedom {
                expected: 0,
                found: 1
            })
        ));
        Ok(())
    }

    #[test]
    fn invalid_inlet() -> FlashResult<()> {
        let mut flash = btx_flash()?;
        flash.mole_frac_comp_mut("toluene")?.fix(0.6);
        assert!(matches!(
            flash.solve(SolverOptions::default()),
            Err(FlashError::InvalidState(..))
        ));
        Ok(())
    }

    #[test]
    fn outlet_requires_solution() -> FlashResult<()> {
        let flash = btx_flash()?;
        assert!(matches!(
            flash.vap_outlet(),
            Err(FlashError::UndeterminedState(_))
        ));
        Ok(())
    }

    // d(x_0, y_0)/d key by forward differences of a re-solved flash
    fn finite_differences(flash: &FlashUnit, key: VarKey) -> FlashResult<(f64, f64)> {
        let h = 1e-6;
        let mut perturbed = flash.clone();
        let value = perturbed.var(key)?.value();
        perturbed.var_mut(key)?.fix(value + h);
        perturbed.solve(SolverOptions::default())?;
        let dx = (perturbed.liq_outlet()?.molefracs[0] - flash.liq_outlet()?.molefracs[0]) / h;
        let dy = (perturbed.vap_outlet()?.molefracs[0] - flash.vap_outlet()?.molefracs[0]) / h;
        Ok((dx, dy))
    }

    #[test]
    fn sensitivity_matches_finite_differences() -> FlashResult<()> {
        let mut flash = btx_flash()?;
        flash.solve(SolverOptions::default())?;
        let keys = [VarKey::Tau(0, 1), VarKey::Tau(1, 0)];
        let sensitivity = flash.sensitivity(&keys)?;
        for (c, &key) in keys.iter().enumerate() {
            let (dx, dy) = finite_differences(&flash, key)?;
            assert_relative_eq!(sensitivity.liquid[(0, c)], dx, max_relative = 1e-3);
            assert_relative_eq!(sensitivity.vapor[(0, c)], dy, max_relative = 1e-3);
        }
        Ok(())
    }

    #[test]
    fn sensitivity_of_subcooled_liquid() -> FlashResult<()> {
        let mut flash = btx_flash()?;
        flash.inlet.temperature.fix(330.0);
        flash.solve(SolverOptions::default())?;
        assert_eq!(
            flash.phase_regimes()?,
            [PhaseRegime::Liquid, PhaseRegime::Liquid]
        );
        let keys = [VarKey::Tau(0, 1), VarKey::Tau(1, 0)];
        let sensitivity = flash.sensitivity(&keys)?;
        for (c, &key) in keys.iter().enumerate() {
            let (_, dy) = finite_differences(&flash, key)?;
            // the liquid keeps the feed composition
            assert_relative_eq!(sensitivity.liquid[(0, c)], 0.0, epsilon = 1e-10);
            assert_relative_eq!(sensitivity.vapor[(0, c)], dy, max_relative = 1e-3);
            assert_relative_eq!(sensitivity.vapor_fraction[c], 0.0, epsilon = 1e-10);
        }
        Ok(())
    }
}
