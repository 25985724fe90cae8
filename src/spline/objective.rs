//! Reformulated spline-fit loss: value, gradient, and Hessian.
//!
//! Purpose
//! -------
//! Pure numerical kernels for one group's inner problem. The optimization
//! variable is the increment vector `s`: `s[0]` is the spline height at
//! the first breakpoint and `s[i]` for `i > 0` the increment to the
//! cumulative height, so monotonicity of the reconstructed spline is a
//! plain non-negativity constraint handled by the bounded minimizer.
//!
//! Model per observation `k` with interval `i = n[k] - 1` (0-based):
//! - `i == 0`: predicted value is `s[0]`;
//! - interior: linear interpolation
//!   `(y_k - c[i-1]) * s[i] / delta_c + s[0] + ... + s[i-1]`;
//! - `i == N` (defensive; assignments are clamped to `N`): the full
//!   cumulative sum.
//!
//! The loss is half the sum of squared residuals weighted by
//! `1 / sigma_k^2`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are validated upstream by the inner solver: `s` has length
//!   `N`, the per-observation vectors share the basis length `K`, and
//!   every `sigma_k` is finite and strictly positive.
//! - `delta_c` is bounded below by the basis construction, so the
//!   divisions here are safe.
//! - Indexing panics on malformed inputs are programmer errors, not
//!   runtime error paths.
use crate::spline::basis::SplineBasis;
use ndarray::{Array1, Array2, ArrayView1};

/// Objective value of the reformulated inner spline problem.
pub fn objective_value(
    s: &ArrayView1<f64>, sim: &ArrayView1<f64>, measurements: &ArrayView1<f64>,
    sigma: &ArrayView1<f64>, basis: &SplineBasis,
) -> f64 {
    let n = basis.n_spline_pars();
    let mut obj = 0.0;
    for (k, &y_k) in sim.iter().enumerate() {
        let i = basis.intervals[k] - 1;
        let weight = 1.0 / (sigma[k] * sigma[k]);
        let sum_s: f64 = s.iter().take(i).sum();
        let residual = if i == 0 {
            measurements[k] - s[0]
        } else if i == n {
            measurements[k] - sum_s
        } else {
            measurements[k] - (y_k - basis.bases[i - 1]) * s[i] / basis.delta_c - sum_s
        };
        obj += weight * residual * residual;
    }
    obj / 2.0
}

/// Gradient of [`objective_value`] with respect to `s`, length `N`.
///
/// Interior observations contribute to `s[i]` through the local slope
/// factor `(y_k - c[i-1]) / delta_c` and to every `s[j]`, `j < i`, through
/// the cumulative sum; boundary intervals contribute directly.
pub fn objective_gradient(
    s: &ArrayView1<f64>, sim: &ArrayView1<f64>, measurements: &ArrayView1<f64>,
    sigma: &ArrayView1<f64>, basis: &SplineBasis,
) -> Array1<f64> {
    let n = basis.n_spline_pars();
    let mut gradient = Array1::zeros(n);
    for (k, &y_k) in sim.iter().enumerate() {
        let i = basis.intervals[k] - 1;
        let weight = 1.0 / (sigma[k] * sigma[k]);
        let sum_s: f64 = s.iter().take(i).sum();
        if i == 0 {
            gradient[0] += weight * (s[0] - measurements[k]);
        } else if i == n {
            for j in 0..i {
                gradient[j] += weight * (sum_s - measurements[k]);
            }
        } else {
            let slope = (y_k - basis.bases[i - 1]) / basis.delta_c;
            let residual = slope * s[i] + sum_s - measurements[k];
            gradient[i] += weight * residual * slope;
            for j in 0..i {
                gradient[j] += weight * residual;
            }
        }
    }
    gradient
}

/// Hessian of [`objective_value`] with respect to `s`, shape `N x N`.
///
/// The loss is quadratic in `s`, so the Hessian depends on the basis and
/// weights only. Kept for diagnostics and second-order solvers; the
/// default optimization path uses value and gradient alone.
pub fn objective_hessian(
    sim: &ArrayView1<f64>, sigma: &ArrayView1<f64>, basis: &SplineBasis,
) -> Array2<f64> {
    let n = basis.n_spline_pars();
    let mut hessian = Array2::zeros((n, n));
    for (k, &y_k) in sim.iter().enumerate() {
        let i = basis.intervals[k] - 1;
        let weight = 1.0 / (sigma[k] * sigma[k]);
        if i == 0 {
            hessian[[0, 0]] += weight;
        } else if i == n {
            for j in 0..n {
                for h in 0..n {
                    hessian[[j, h]] += weight;
                }
            }
        } else {
            let slope = (y_k - basis.bases[i - 1]) / basis.delta_c;
            hessian[[i, i]] += weight * slope * slope;
            for j in 0..i {
                hessian[[i, j]] += weight * slope;
                hessian[[j, i]] += weight * slope;
                for h in 0..i {
                    hessian[[j, h]] += weight;
                }
            }
        }
    }
    hessian
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spline::basis::{rescale_spline_bases, spline_mapped_simulations};
    use approx::assert_abs_diff_eq;
    use finitediff::FiniteDiff;
    use ndarray::{Array1, array};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_close_rel(analytic: f64, reference: f64, tol: f64) {
        let scale = reference.abs().max(1.0);
        assert!(
            (analytic - reference).abs() <= tol * scale,
            "analytic {analytic} vs reference {reference}"
        );
    }

    fn random_fixture(
        rng: &mut StdRng, n_datapoints: usize, n_spline_pars: usize,
    ) -> (Array1<f64>, Array1<f64>, Array1<f64>, Array1<f64>, SplineBasis) {
        let sim = Array1::from_iter((0..n_datapoints).map(|_| rng.gen_range(-1.0..4.0)));
        let measurements =
            Array1::from_iter((0..n_datapoints).map(|_| rng.gen_range(-2.0..6.0)));
        let sigma = Array1::from_iter((0..n_datapoints).map(|_| rng.gen_range(0.5..2.0)));
        let s = Array1::from_iter((0..n_spline_pars).map(|_| rng.gen_range(0.0..2.0)));
        let basis = rescale_spline_bases(&sim.view(), n_spline_pars).expect("basis");
        (s, sim, measurements, sigma, basis)
    }

    #[test]
    // Purpose
    // -------
    // Verify the zero-residual case: when the spline reproduces the data
    // exactly, the objective and its gradient vanish.
    //
    // Given
    // -----
    // - y = z = linspace(0, 10, 11), unit noise, N = 6, and the increment
    //   vector s = [0, 2, 2, 2, 2, 2] whose cumulative heights equal the
    //   breakpoints.
    //
    // Expect
    // ------
    // - Objective value 0 and an all-zero gradient.
    fn zero_residual_configuration_has_zero_value_and_gradient() {
        // Arrange
        let data = Array1::linspace(0.0, 10.0, 11);
        let sigma = Array1::ones(11);
        let basis = rescale_spline_bases(&data.view(), 6).expect("basis");
        let s = array![0.0, 2.0, 2.0, 2.0, 2.0, 2.0];

        // Act
        let value =
            objective_value(&s.view(), &data.view(), &data.view(), &sigma.view(), &basis);
        let gradient =
            objective_gradient(&s.view(), &data.view(), &data.view(), &sigma.view(), &basis);

        // Assert
        assert_abs_diff_eq!(value, 0.0, epsilon = 1e-12);
        for &entry in gradient.iter() {
            assert_abs_diff_eq!(entry, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the objective equals half the weighted squared distance
    // between measurements and the spline-mapped simulations.
    //
    // Given
    // -----
    // - A randomized fixture with K = 9, N = 4.
    //
    // Expect
    // ------
    // - objective_value agrees with the mapped-simulation formulation at
    //   1e-10.
    fn objective_matches_mapped_simulation_residuals() {
        // Arrange
        let mut rng = StdRng::seed_from_u64(7);
        let (s, sim, measurements, sigma, basis) = random_fixture(&mut rng, 9, 4);

        // Act
        let value =
            objective_value(&s.view(), &sim.view(), &measurements.view(), &sigma.view(), &basis);
        let mapped = spline_mapped_simulations(&s.view(), &sim.view(), &basis).expect("mapping");
        let reference: f64 = mapped
            .iter()
            .zip(measurements.iter())
            .zip(sigma.iter())
            .map(|((&m, &z), &sig)| (z - m) * (z - m) / (sig * sig))
            .sum::<f64>()
            / 2.0;

        // Assert
        assert_abs_diff_eq!(value, reference, epsilon = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Verify the analytic gradient against central finite differences on
    // randomized fixtures that include the pinned boundary intervals.
    //
    // Given
    // -----
    // - Five seeded fixtures with K = 9, N = 4 (the extrema observations
    //   always occupy intervals 1 and N).
    //
    // Expect
    // ------
    // - Every gradient entry matches the finite difference within 1e-5
    //   relative tolerance.
    fn gradient_matches_finite_differences() {
        for seed in 0..5 {
            // Arrange
            let mut rng = StdRng::seed_from_u64(seed);
            let (s, sim, measurements, sigma, basis) = random_fixture(&mut rng, 9, 4);

            // Act
            let analytic = objective_gradient(
                &s.view(),
                &sim.view(),
                &measurements.view(),
                &sigma.view(),
                &basis,
            );
            let value_fn = |v: &Vec<f64>| -> f64 {
                let point = Array1::from(v.clone());
                objective_value(
                    &point.view(),
                    &sim.view(),
                    &measurements.view(),
                    &sigma.view(),
                    &basis,
                )
            };
            let fd = s.to_vec().central_diff(&value_fn);

            // Assert
            for (&analytic_entry, &fd_entry) in analytic.iter().zip(fd.iter()) {
                assert_close_rel(analytic_entry, fd_entry, 1e-5);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the analytic Hessian against finite differences of the
    // analytic gradient.
    //
    // Given
    // -----
    // - A seeded fixture with K = 9, N = 4; the loss is quadratic, so the
    //   Hessian is constant in s.
    //
    // Expect
    // ------
    // - Every Hessian entry matches the central difference of the
    //   gradient within 1e-6 relative tolerance, and the Hessian is
    //   symmetric.
    fn hessian_matches_finite_differences_of_gradient() {
        // Arrange
        let mut rng = StdRng::seed_from_u64(11);
        let (s, sim, measurements, sigma, basis) = random_fixture(&mut rng, 9, 4);
        let n = basis.n_spline_pars();

        // Act
        let hessian = objective_hessian(&sim.view(), &sigma.view(), &basis);

        // Assert
        let h = 1e-6;
        for column in 0..n {
            let mut plus = s.clone();
            let mut minus = s.clone();
            plus[column] += h;
            minus[column] -= h;
            let grad_plus = objective_gradient(
                &plus.view(),
                &sim.view(),
                &measurements.view(),
                &sigma.view(),
                &basis,
            );
            let grad_minus = objective_gradient(
                &minus.view(),
                &sim.view(),
                &measurements.view(),
                &sigma.view(),
                &basis,
            );
            for row in 0..n {
                let fd = (grad_plus[row] - grad_minus[row]) / (2.0 * h);
                assert_close_rel(hessian[[row, column]], fd, 1e-6);
                assert_abs_diff_eq!(
                    hessian[[row, column]],
                    hessian[[column, row]],
                    epsilon = 1e-12
                );
            }
        }
    }
}
