use super::PhaseRegime;
use crate::errors::{FlashError, FlashResult};
use crate::properties::PropertyPackage;
use crate::Verbosity;

/// Phase split of one state at fixed temperature and pressure.
#[derive(Clone, Debug)]
pub(crate) struct PhaseSplit {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub beta: f64,
    pub regime: PhaseRegime,
}

impl PhaseSplit {
    fn new(z: &[f64], k: &[f64], beta: Option<f64>) -> Self {
        match beta {
            Some(beta) => {
                let x: Vec<_> = z
                    .iter()
                    .zip(k)
                    .map(|(z, k)| z / (1.0 - beta + beta * k))
                    .collect();
                let y = x.iter().zip(k).map(|(x, k)| k * x).collect();
                Self {
                    x,
                    y,
                    beta,
                    regime: PhaseRegime::TwoPhase,
                }
            }
            None if z.iter().zip(k).map(|(z, k)| z * k).sum::<f64>() < 1.0 => {
                let s: f64 = z.iter().zip(k).map(|(z, k)| z * k).sum();
                Self {
                    x: z.to_vec(),
                    y: z.iter().zip(k).map(|(z, k)| z * k / s).collect(),
                    beta: 0.0,
                    regime: PhaseRegime::Liquid,
                }
            }
            None => {
                let s: f64 = z.iter().zip(k).map(|(z, k)| z / k).sum();
                Self {
                    x: z.iter().zip(k).map(|(z, k)| z / k / s).collect(),
                    y: z.to_vec(),
                    beta: 1.0,
                    regime: PhaseRegime::Vapor,
                }
            }
        }
    }
}

/// Tp-flash by successive substitution of the activity coefficients.
///
/// Each step solves the Rachford-Rice equation for the current
/// equilibrium ratios and updates the activity coefficients with the
/// new liquid composition. Without a phase split, the feed is returned
/// as subcooled liquid or superheated vapor together with the
/// composition of the incipient phase.
#[allow(clippy::too_many_arguments)]
pub(crate) fn tp_flash(
    properties: &PropertyPackage,
    temperature: f64,
    pressure: f64,
    feed: &[f64],
    alpha: &[f64],
    tau: &[f64],
    max_iter: usize,
    tol: f64,
    verbosity: Verbosity,
) -> FlashResult<PhaseSplit> {
    let mut k = properties.k_values(temperature, pressure, feed, alpha, tau);
    let mut beta = None;

    log_iter!(
        verbosity,
        " iter |    residual    |  beta  |  liquid mole fractions"
    );
    log_iter!(verbosity, "{:-<64}", "");
    for iter in 1..=max_iter {
        beta = match rachford_rice(feed, &k, beta) {
            Ok(beta) => Some(beta),
            Err(FlashError::NoPhaseSplit) => None,
            Err(e) => return Err(e),
        };
        let split = PhaseSplit::new(feed, &k, beta);

        // the liquid composition determines the activity coefficients
        let k_new = properties.k_values(temperature, pressure, &split.x, alpha, tau);
        let res = k
            .iter()
            .zip(&k_new)
            .map(|(k, kn)| (kn.ln() - k.ln()).powi(2))
            .sum::<f64>()
            .sqrt();
        if !res.is_finite() {
            return Err(FlashError::IterationFailed("Tp flash".into()));
        }
        log_iter!(
            verbosity,
            " {:4} | {:14.8e} | {:6.4} | {:.8?}",
            iter,
            res,
            split.beta,
            split.x
        );
        k = k_new;
        if res < tol {
            log_result!(
                verbosity,
                "Tp flash: calculation converged in {} step(s) ({:?})\n",
                iter,
                split.regime
            );
            return Ok(PhaseSplit::new(feed, &k, beta));
        }
    }
    Err(FlashError::NotConverged("Tp flash".into()))
}

/// Vapor fraction from the Rachford-Rice equation
/// `sum_i z_i (K_i - 1) / (1 - beta + beta K_i) = 0`.
///
/// Returns [FlashError::NoPhaseSplit] if no root in (0, 1) exists.
pub(crate) fn rachford_rice(feed: &[f64], k: &[f64], beta_in: Option<f64>) -> FlashResult<f64> {
    const MAX_ITER: usize = 50;
    const ABS_TOL: f64 = 1e-14;

    // check if solution exists
    let zk: f64 = feed.iter().zip(k).map(|(z, k)| z * k).sum();
    let z_k: f64 = feed
        .iter()
        .zip(k)
        .map(|(z, k)| z / k)
        .filter(|x| !x.is_nan())
        .sum();
    let (mut beta_min, mut beta_max) = if zk > 1.0 && z_k > 1.0 {
        (0.0, 1.0)
    } else {
        return Err(FlashError::NoPhaseSplit);
    };

    // look for tighter bounds
    for (&k, &f) in k.iter().zip(feed) {
        if k > 1.0 {
            let b = (k * f - 1.0) / (k - 1.0);
            if b > beta_min {
                beta_min = b;
            }
        }
        if k < 1.0 {
            let b = (1.0 - f) / (1.0 - k);
            if b < beta_max {
                beta_max = b;
            }
        }
    }

    // initialize
    let mut beta = 0.5 * (beta_min + beta_max);
    if let Some(b) = beta_in {
        if b > beta_min && b < beta_max {
            beta = b;
        }
    }

    // safeguarded Newton iteration
    for _ in 0..MAX_ITER {
        let (mut g, mut dg) = (0.0, 0.0);
        for (&z, &k) in feed.iter().zip(k) {
            let frac = (k - 1.0) / (1.0 - beta + beta * k);
            g += z * frac;
            dg -= z * frac * frac;
        }
        if g > 0.0 {
            beta_min = beta;
        } else {
            beta_max = beta;
        }

        let dbeta = g / dg;
        beta -= dbeta;

        if beta < beta_min || beta > beta_max {
            beta = 0.5 * (beta_min + beta_max);
        }
        if dbeta.abs() < ABS_TOL || beta_max - beta_min < ABS_TOL {
            return Ok(beta);
        }
    }
    Ok(beta)
}
