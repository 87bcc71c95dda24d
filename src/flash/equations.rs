use super::PhaseRegime;
use crate::errors::{FlashError, FlashResult};
use crate::properties::{PropertyPackage, TEMPERATURE_REF};
use crate::Verbosity;
use nalgebra::{DMatrix, DVector};
use num_dual::{Dual64, DualNum};

const RGAS: f64 = 8.314462618;
const MAX_TEMPERATURE_STEP: f64 = 20.0;
const FRACTION_TO_BOUNDARY: f64 = 0.9;
const MAX_LINE_SEARCH: usize = 12;

/// Values of all specification variables.
#[derive(Clone, Debug)]
pub(crate) struct Specification<D> {
    pub flow: D,
    pub temperature: D,
    pub pressure: D,
    pub molefracs: Vec<D>,
    pub heat_duty: D,
    pub deltap: D,
    /// row-major
    pub alpha: Vec<D>,
    /// row-major
    pub tau: Vec<D>,
}

impl Specification<f64> {
    pub fn map<D, F: Fn(f64) -> D>(&self, f: F) -> Specification<D> {
        Specification {
            flow: f(self.flow),
            temperature: f(self.temperature),
            pressure: f(self.pressure),
            molefracs: self.molefracs.iter().map(|&z| f(z)).collect(),
            heat_duty: f(self.heat_duty),
            deltap: f(self.deltap),
            alpha: self.alpha.iter().map(|&a| f(a)).collect(),
            tau: self.tau.iter().map(|&t| f(t)).collect(),
        }
    }
}

/// Layout of the unknowns: one `(x, y, beta)` block for the inlet
/// state, one for the outlet state, followed by the outlet temperature.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Layout {
    n: usize,
}

impl Layout {
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    pub fn block_size(&self) -> usize {
        2 * self.n + 1
    }

    pub fn size(&self) -> usize {
        2 * self.block_size() + 1
    }

    pub fn x(&self, block: usize) -> std::ops::Range<usize> {
        let offset = block * self.block_size();
        offset..offset + self.n
    }

    pub fn y(&self, block: usize) -> std::ops::Range<usize> {
        let offset = block * self.block_size() + self.n;
        offset..offset + self.n
    }

    pub fn beta(&self, block: usize) -> usize {
        block * self.block_size() + 2 * self.n
    }

    pub fn temperature(&self) -> usize {
        2 * self.block_size()
    }
}

/// The square system of the flash unit for fixed phase regimes.
pub(crate) struct EquationSystem<'a> {
    properties: &'a PropertyPackage,
    regimes: [PhaseRegime; 2],
    pub layout: Layout,
}

impl<'a> EquationSystem<'a> {
    pub fn new(properties: &'a PropertyPackage, regimes: [PhaseRegime; 2]) -> Self {
        Self {
            properties,
            regimes,
            layout: Layout::new(properties.components()),
        }
    }

    /// Temperature and pressure of the inlet (0) or outlet (1) state.
    pub fn conditions<D: DualNum<f64> + Copy>(
        &self,
        block: usize,
        spec: &Specification<D>,
        u: &[D],
    ) -> (D, D) {
        if block == 0 {
            (spec.temperature, spec.pressure)
        } else {
            (u[self.layout.temperature()], spec.pressure + spec.deltap)
        }
    }

    pub fn residuals<D: DualNum<f64> + Copy>(&self, spec: &Specification<D>, u: &[D]) -> Vec<D> {
        let l = self.layout;
        let mut res = Vec::with_capacity(l.size());
        let mut enthalpy = [D::from(0.0); 2];
        for (block, &regime) in self.regimes.iter().enumerate() {
            let (t, p) = self.conditions(block, spec, u);
            let (x, y, beta) = (&u[l.x(block)], &u[l.y(block)], u[l.beta(block)]);
            self.block_residuals(regime, t, p, &spec.molefracs, x, y, beta, spec, &mut res);
            enthalpy[block] = -(beta - 1.0) * self.properties.enth_mol_liq(t, x)
                + beta * self.properties.enth_mol_vap(t, y);
        }

        // energy balance F h_in + Q = F h_out
        let energy = (enthalpy[1] - enthalpy[0]) * spec.flow - spec.heat_duty;
        res.push(energy / (spec.flow * RGAS * TEMPERATURE_REF));
        res
    }

    #[allow(clippy::too_many_arguments)]
    fn block_residuals<D: DualNum<f64> + Copy>(
        &self,
        regime: PhaseRegime,
        temperature: D,
        pressure: D,
        z: &[D],
        x: &[D],
        y: &[D],
        beta: D,
        spec: &Specification<D>,
        res: &mut Vec<D>,
    ) {
        let k = self
            .properties
            .k_values(temperature, pressure, x, &spec.alpha, &spec.tau);

        // phase equilibrium, or the composition of the incipient phase
        match regime {
            PhaseRegime::TwoPhase => {
                res.extend((0..x.len()).map(|i| y[i] - k[i] * x[i]));
            }
            PhaseRegime::Liquid => {
                let s = sum((0..x.len()).map(|i| k[i] * x[i]));
                res.extend((0..x.len()).map(|i| y[i] - k[i] * x[i] / s));
            }
            PhaseRegime::Vapor => {
                let s = sum((0..x.len()).map(|i| y[i] / k[i]));
                res.extend((0..x.len()).map(|i| x[i] - y[i] / k[i] / s));
            }
        }

        // component balances
        res.extend((0..x.len()).map(|i| x[i] * (-beta + 1.0) + y[i] * beta - z[i]));

        match regime {
            PhaseRegime::TwoPhase => res.push(sum(x.iter().copied()) - sum(y.iter().copied())),
            PhaseRegime::Liquid => res.push(beta),
            PhaseRegime::Vapor => res.push(beta - 1.0),
        }
    }

    /// Residuals and Jacobian with respect to the unknowns.
    pub fn jacobian(
        &self,
        spec: &Specification<f64>,
        u: &DVector<f64>,
    ) -> (DVector<f64>, DMatrix<f64>) {
        let spec = spec.map(Dual64::from);
        let size = u.len();
        let mut f = DVector::zeros(size);
        let mut jac = DMatrix::zeros(size, size);
        for j in 0..size {
            let u_dual: Vec<Dual64> = u
                .iter()
                .enumerate()
                .map(|(k, &uk)| {
                    let uk = Dual64::from(uk);
                    if k == j {
                        uk.derivative()
                    } else {
                        uk
                    }
                })
                .collect();
            for (i, r) in self.residuals(&spec, &u_dual).into_iter().enumerate() {
                f[i] = r.re;
                jac[(i, j)] = r.eps;
            }
        }
        (f, jac)
    }

    fn residual_norm(&self, spec: &Specification<f64>, u: &DVector<f64>) -> f64 {
        let r = self.residuals(spec, u.as_slice());
        r.iter().map(|ri| ri * ri).sum::<f64>().sqrt()
    }

    /// Damped Newton iteration. Returns the number of iterations.
    pub fn newton(
        &self,
        spec: &Specification<f64>,
        u: &mut DVector<f64>,
        max_iter: usize,
        tol: f64,
        verbosity: Verbosity,
    ) -> FlashResult<usize> {
        let l = self.layout;
        log_iter!(verbosity, " iter |    residual    |  step  | temperature");
        log_iter!(verbosity, "{:-<48}", "");
        for iter in 0..max_iter {
            let (f, jac) = self.jacobian(spec, u);
            let res = f.norm();
            if !res.is_finite() {
                return Err(FlashError::IterationFailed("flash".into()));
            }
            if res < tol {
                log_iter!(
                    verbosity,
                    " {:4} | {:14.8e} |        | {:.8}",
                    iter,
                    res,
                    u[l.temperature()]
                );
                return Ok(iter);
            }

            let du = jac
                .lu()
                .solve(&(-f))
                .ok_or_else(|| FlashError::SingularMatrix("flash".into()))?;

            // keep mole fractions inside [0, 1] and limit the temperature step
            let mut lambda: f64 = 1.0;
            for block in 0..2 {
                for i in l.x(block).chain(l.y(block)) {
                    if u[i] + du[i] < 0.0 {
                        lambda = lambda.min(-FRACTION_TO_BOUNDARY * u[i] / du[i]);
                    }
                    if u[i] + du[i] > 1.0 {
                        lambda = lambda.min(FRACTION_TO_BOUNDARY * (1.0 - u[i]) / du[i]);
                    }
                }
            }
            let dt = du[l.temperature()].abs();
            if dt > MAX_TEMPERATURE_STEP {
                lambda = lambda.min(MAX_TEMPERATURE_STEP / dt);
            }

            // backtracking on the residual norm
            let mut trial = &*u + &du * lambda;
            for _ in 0..MAX_LINE_SEARCH {
                let res_trial = self.residual_norm(spec, &trial);
                if res_trial.is_finite() && res_trial < (1.0 - 1e-4 * lambda) * res {
                    break;
                }
                lambda *= 0.5;
                trial = &*u + &du * lambda;
            }
            log_iter!(
                verbosity,
                " {:4} | {:14.8e} | {:6.4} | {:.8}",
                iter,
                res,
                lambda,
                trial[l.temperature()]
            );
            *u = trial;
        }
        Err(FlashError::NotConverged("flash".into()))
    }
}

fn sum<D: DualNum<f64> + Copy, I: Iterator<Item = D>>(iter: I) -> D {
    iter.fold(D::from(0.0), |acc, v| acc + v)
}
