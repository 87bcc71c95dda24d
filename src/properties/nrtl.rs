use num_dual::DualNum;

/// Logarithmic NRTL activity coefficients.
///
/// `alpha` and `tau` are row-major `n x n` matrices, `x` the liquid mole
/// fractions. With `G_ij = exp(-alpha_ij tau_ij)`:
///
/// ```text
/// ln gamma_i = sum_j x_j tau_ji G_ji / sum_k x_k G_ki
///            + sum_j x_j G_ij / sum_k x_k G_kj (tau_ij - sum_m x_m tau_mj G_mj / sum_k x_k G_kj)
/// ```
pub fn ln_activity_coefficients<D: DualNum<f64> + Copy>(
    alpha: &[D],
    tau: &[D],
    x: &[D],
) -> Vec<D> {
    let n = x.len();
    let g: Vec<D> = alpha
        .iter()
        .zip(tau)
        .map(|(&a, &t)| (-a * t).exp())
        .collect();

    // column sums: den_j = sum_k x_k G_kj, num_j = sum_k x_k tau_kj G_kj
    let mut den = vec![D::from(0.0); n];
    let mut num = vec![D::from(0.0); n];
    for j in 0..n {
        for k in 0..n {
            den[j] += x[k] * g[k * n + j];
            num[j] += x[k] * tau[k * n + j] * g[k * n + j];
        }
    }

    (0..n)
        .map(|i| {
            let mut ln_gamma = num[i] / den[i];
            for j in 0..n {
                ln_gamma += x[j] * g[i * n + j] / den[j] * (tau[i * n + j] - num[j] / den[j]);
            }
            ln_gamma
        })
        .collect()
}
