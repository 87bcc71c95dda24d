use num_dual::{Dual64, DualNum};

/// Transformation applied to each residual before it enters the cost.
///
/// The cost of a residual `r` is the square of the transformed residual,
/// so [Loss::Linear] gives ordinary least squares.
#[derive(Clone, Debug, Copy, PartialEq, Default)]
pub enum Loss {
    #[default]
    Linear,
    SoftL1(f64),
    Huber(f64),
    Cauchy(f64),
    Arctan(f64),
}

impl Loss {
    pub fn softl1(scaling_factor: f64) -> Self {
        Self::SoftL1(scaling_factor)
    }
    pub fn huber(scaling_factor: f64) -> Self {
        Self::Huber(scaling_factor)
    }
    pub fn cauchy(scaling_factor: f64) -> Self {
        Self::Cauchy(scaling_factor)
    }
    pub fn arctan(scaling_factor: f64) -> Self {
        Self::Arctan(scaling_factor)
    }

    /// Transform a residual that carries its derivative with respect to
    /// one parameter.
    pub fn apply(&self, ri: Dual64) -> Dual64 {
        match *self {
            Self::Linear => ri,
            // every loss has unit slope at zero
            _ if ri.re == 0.0 => ri,
            Self::SoftL1(s) => {
                let s2 = s * s;
                (((ri * ri / s2 + 1.0).sqrt() - 1.0) * 2.0 * s2).sqrt()
            }
            Self::Huber(s) => {
                if ri.re * ri.re / (s * s) <= 1.0 {
                    ri
                } else {
                    let abs = if ri.re < 0.0 { -ri / s } else { ri / s };
                    ((abs * 2.0 - 1.0) * s * s).sqrt()
                }
            }
            Self::Cauchy(s) => {
                let s2 = s * s;
                ((ri * ri / s2 + 1.0).ln() * s2).sqrt()
            }
            Self::Arctan(s) => {
                let s2 = s * s;
                ((ri * ri / s2).atan() * s2).sqrt()
            }
        }
    }

    /// Cost contribution of a single residual.
    pub fn cost(&self, ri: f64) -> f64 {
        self.apply(Dual64::from(ri)).re.powi(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn small_residuals_are_quadratic() {
        let r = 1e-4;
        for loss in [
            Loss::Linear,
            Loss::softl1(1.0),
            Loss::huber(1.0),
            Loss::cauchy(1.0),
            Loss::arctan(1.0),
        ] {
            assert_relative_eq!(loss.cost(r), r * r, max_relative = 1e-6);
        }
    }

    #[test]
    fn robust_losses_damp_outliers() {
        let r = 10.0;
        assert_relative_eq!(Loss::Linear.cost(r), 100.0);
        assert!(Loss::huber(1.0).cost(r) < 100.0);
        assert!(Loss::cauchy(1.0).cost(r) < Loss::huber(1.0).cost(r));
        assert!(Loss::arctan(1.0).cost(r) <= std::f64::consts::FRAC_PI_2 + 1e-12);
    }

    #[test]
    fn zero_residual() {
        for loss in [
            Loss::softl1(1.0),
            Loss::huber(1.0),
            Loss::cauchy(1.0),
            Loss::arctan(1.0),
        ] {
            let r = loss.apply(Dual64::new(0.0, 1.0));
            assert_eq!(r.re, 0.0);
            assert_relative_eq!(r.eps, 1.0);
        }
    }

    #[test]
    fn derivative_of_transformed_residual() {
        let loss = Loss::softl1(0.5);
        let (r, h) = (0.3, 1e-7);
        let d = loss.apply(Dual64::from(r).derivative()).eps;
        let fd = (loss.apply(Dual64::from(r + h)).re - loss.apply(Dual64::from(r)).re) / h;
        assert_relative_eq!(d, fd, max_relative = 1e-5);
    }
}
