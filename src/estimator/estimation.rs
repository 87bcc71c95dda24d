//! The [`ParameterEstimation`] struct fits the unfixed variables of a
//! [`FlashUnit`] to measured outlet compositions.
use super::{Loss, Measurement, Phase};
use crate::errors::{FlashError, FlashResult};
use crate::flash::{FlashUnit, TerminationCondition};
use crate::variable::VarKey;
use crate::SolverOptions;
use nalgebra::{DMatrix, DVector};
use num_dual::Dual64;
use std::fmt;

const MAX_ITER_LM: usize = 100;
const TOL_LM: f64 = 1e-8;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// Outcome of a parameter estimation.
#[derive(Clone, Debug)]
pub struct EstimationStatus {
    pub termination: TerminationCondition,
    pub iterations: usize,
    /// Objective at the (projected) initial guess.
    pub initial_objective: f64,
    /// Objective at the returned parameters.
    pub objective: f64,
    /// Estimated values of all unfixed variables.
    pub parameters: Vec<(VarKey, f64)>,
    /// Readable names of the estimated variables.
    pub names: Vec<String>,
}

impl EstimationStatus {
    pub fn is_converged(&self) -> bool {
        self.termination == TerminationCondition::Optimal
    }
}

impl fmt::Display for EstimationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "termination: {:?} after {} iteration(s)",
            self.termination, self.iterations
        )?;
        writeln!(
            f,
            "objective:   {:.6e} -> {:.6e}",
            self.initial_objective, self.objective
        )?;
        for (name, (_, value)) in self.names.iter().zip(&self.parameters) {
            writeln!(f, "  {name} = {value:.6}")?;
        }
        Ok(())
    }
}

/// Least-squares fit of the unfixed variables of a flash unit.
///
/// The objective is the sum of squared (loss-transformed) residuals
/// `target - prediction` over all measurements.
#[derive(Clone, Debug)]
pub struct ParameterEstimation {
    data: Vec<Measurement>,
    loss: Loss,
}

impl ParameterEstimation {
    pub fn new<M: Into<Vec<Measurement>>>(data: M, loss: Loss) -> Self {
        Self {
            data: data.into(),
            loss,
        }
    }

    pub fn data(&self) -> &[Measurement] {
        &self.data
    }

    /// Model predictions for all measurements from the solved flash.
    pub fn predict(&self, flash: &FlashUnit) -> FlashResult<DVector<f64>> {
        let (vapor, liquid) = (flash.vap_outlet()?, flash.liq_outlet()?);
        let values = self
            .data
            .iter()
            .map(|m| {
                let i = flash.properties.component_index(&m.component)?;
                Ok(match m.phase {
                    Phase::Vapor => vapor.molefracs[i],
                    Phase::Liquid => liquid.molefracs[i],
                })
            })
            .collect::<FlashResult<Vec<_>>>()?;
        Ok(DVector::from_vec(values))
    }

    /// Loss-transformed residuals of the solved flash.
    pub fn residuals(&self, flash: &FlashUnit) -> FlashResult<DVector<f64>> {
        let prediction = self.predict(flash)?;
        Ok(DVector::from_iterator(
            self.data.len(),
            self.data
                .iter()
                .zip(prediction.iter())
                .map(|(m, p)| self.loss.apply(Dual64::from(m.value - p)).re),
        ))
    }

    /// Sum of squared residuals of the solved flash.
    pub fn objective(&self, flash: &FlashUnit) -> FlashResult<f64> {
        Ok(self.residuals(flash)?.norm_squared())
    }

    // residuals and their derivatives with respect to the variables in `keys`
    fn jacobian(
        &self,
        flash: &FlashUnit,
        keys: &[VarKey],
    ) -> FlashResult<(DVector<f64>, DMatrix<f64>)> {
        let prediction = self.predict(flash)?;
        let sensitivity = flash.sensitivity(keys)?;
        let mut f = DVector::zeros(self.data.len());
        let mut jac = DMatrix::zeros(self.data.len(), keys.len());
        for (row, (m, p)) in self.data.iter().zip(prediction.iter()).enumerate() {
            let i = flash.properties.component_index(&m.component)?;
            let dp = match m.phase {
                Phase::Vapor => sensitivity.vapor.row(i),
                Phase::Liquid => sensitivity.liquid.row(i),
            };
            f[row] = self.loss.apply(Dual64::from(m.value - p)).re;
            for col in 0..keys.len() {
                let r = Dual64::new(m.value - p, -dp[col]);
                jac[(row, col)] = self.loss.apply(r).eps;
            }
        }
        Ok((f, jac))
    }

    fn set_parameters(flash: &mut FlashUnit, keys: &[VarKey], p: &DVector<f64>) -> FlashResult<()> {
        for (&key, &value) in keys.iter().zip(p.iter()) {
            flash.var_mut(key)?.set_value(value);
        }
        Ok(())
    }

    /// Fit all unfixed variables of the flash unit to the data.
    ///
    /// The flash is solved at the initial guess (projected onto the bounds)
    /// and then updated by a projected Levenberg-Marquardt iteration. A step
    /// is only accepted if the re-solved flash lowers the objective, so the
    /// returned objective never exceeds its initial value. On return the
    /// flash is solved at the estimated parameters.
    ///
    /// The iteration stops as converged if the objective, the norm of the
    /// projected gradient or the step length falls below `tol`.
    pub fn solve(
        &self,
        flash: &mut FlashUnit,
        options: SolverOptions,
    ) -> FlashResult<EstimationStatus> {
        let keys = flash.unfixed_variables();
        if keys.is_empty() {
            return Err(FlashError::UndeterminedState(
                "no unfixed variables to estimate".into(),
            ));
        }
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_LM, TOL_LM);
        let flash_options = SolverOptions::default();

        // bounds of the decision variables
        let vars = keys
            .iter()
            .map(|&k| flash.var(k).copied())
            .collect::<FlashResult<Vec<_>>>()?;
        let project = |p: DVector<f64>| {
            DVector::from_iterator(p.len(), p.iter().zip(&vars).map(|(&p, v)| v.project(p)))
        };

        let mut p = project(DVector::from_iterator(
            keys.len(),
            vars.iter().map(|v| v.value()),
        ));
        Self::set_parameters(flash, &keys, &p)?;
        flash.converge(flash_options)?;
        let (mut r, mut jac) = self.jacobian(flash, &keys)?;
        let initial_objective = r.norm_squared();
        let mut objective = initial_objective;
        let mut lambda = LAMBDA_INIT;

        let names: Vec<_> = keys.iter().map(|&k| flash.variable_name(k)).collect();
        let status = |termination, iterations, objective, p: &DVector<f64>| EstimationStatus {
            termination,
            iterations,
            initial_objective,
            objective,
            parameters: keys.iter().copied().zip(p.iter().copied()).collect(),
            names: names.clone(),
        };

        log_iter!(
            verbosity,
            " iter |   objective    |   |proj. grad|  |   lambda   | parameters"
        );
        log_iter!(verbosity, "{:-<80}", "");
        log_iter!(
            verbosity,
            " {:4} | {:14.8e} |                 |            | {:.8?}",
            0,
            objective,
            p.as_slice()
        );

        for iter in 1..=max_iter {
            // predictions reproduce the data
            if objective < tol {
                log_result!(
                    verbosity,
                    "parameter estimation: objective below tolerance after {} step(s)\n",
                    iter - 1
                );
                return Ok(status(TerminationCondition::Optimal, iter - 1, objective, &p));
            }

            // first-order optimality of the bound-constrained problem
            let g = jac.transpose() * &r;
            let projected_gradient = (&p - project(&p - &g)).norm();
            if projected_gradient < tol {
                log_result!(
                    verbosity,
                    "parameter estimation: converged in {} step(s)\n",
                    iter - 1
                );
                return Ok(status(TerminationCondition::Optimal, iter - 1, objective, &p));
            }

            let jtj = jac.transpose() * &jac;
            loop {
                let mut a = jtj.clone();
                for k in 0..keys.len() {
                    a[(k, k)] += lambda * jtj[(k, k)].max(LAMBDA_MIN);
                }
                let delta = a
                    .lu()
                    .solve(&(-&g))
                    .ok_or_else(|| FlashError::SingularMatrix("parameter estimation".into()))?;
                let p_trial = project(&p + delta);
                if (&p_trial - &p).norm() < tol * (1.0 + p.norm()) {
                    log_result!(
                        verbosity,
                        "parameter estimation: step length below tolerance after {} step(s)\n",
                        iter - 1
                    );
                    return Ok(status(TerminationCondition::Optimal, iter - 1, objective, &p));
                }

                let backup = flash.clone();
                Self::set_parameters(flash, &keys, &p_trial)?;
                let trial_objective = flash
                    .converge(flash_options)
                    .and_then(|_| self.objective(flash));
                match trial_objective {
                    Ok(obj) if obj < objective => {
                        p = p_trial;
                        objective = obj;
                        lambda = (lambda * 0.1).max(LAMBDA_MIN);
                        (r, jac) = self.jacobian(flash, &keys)?;
                        break;
                    }
                    _ => {
                        *flash = backup;
                        lambda *= 10.0;
                        if lambda > LAMBDA_MAX {
                            // no descent direction left within the bounds
                            log_result!(
                                verbosity,
                                "parameter estimation: no further decrease after {} step(s)\n",
                                iter - 1
                            );
                            return Ok(status(
                                TerminationCondition::Optimal,
                                iter - 1,
                                objective,
                                &p,
                            ));
                        }
                    }
                }
            }
            log_iter!(
                verbosity,
                " {:4} | {:14.8e} | {:15.8e} | {:10.4e} | {:.8?}",
                iter,
                objective,
                projected_gradient,
                lambda,
                p.as_slice()
            );
        }
        if objective < tol {
            log_result!(
                verbosity,
                "parameter estimation: objective below tolerance after {} step(s)\n",
                max_iter
            );
            return Ok(status(TerminationCondition::Optimal, max_iter, objective, &p));
        }
        log_result!(
            verbosity,
            "parameter estimation: maximum number of iterations reached\n"
        );
        Ok(status(TerminationCondition::MaxIterations, max_iter, objective, &p))
    }
}

impl fmt::Display for ParameterEstimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "| target | value |\n|:-|:-|")?;
        for m in &self.data {
            write!(f, "\n|{}_{}|{}|", m.phase, m.component, m.value)?;
        }
        Ok(())
    }
}
