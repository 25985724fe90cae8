//! Propagation of inner-optimum derivatives to the outer gradient.
//!
//! Purpose
//! -------
//! Given the optimal reformulated spline parameters `s*` of every group
//! and the engine's forward sensitivities `sy`, compute the derivative of
//! the total inner objective with respect to each outer parameter by the
//! implicit function theorem on the KKT system of the inner problem.
//!
//! Algorithm per outer parameter and group:
//! 1. `mu`, the objective gradient at `s*`, equals the vector of Lagrange
//!    multipliers of the active constraint set of the reformulated
//!    problem (stationarity); an all-zero `mu` makes the implicit term
//!    vanish and it is skipped.
//! 2. Otherwise the KKT-derivative block system
//!    `[[J', C], [-diag(mu), D - diag(s*)]]` is assembled observation by
//!    observation, mirroring the objective's interval structure with the
//!    basis derivatives `delta_c_dot` / `c_dot` substituted, where
//!    `C = -I` and `D = diag(min_diff)` with a zero first entry. The
//!    system is solved by SVD least squares (rank-deficient systems at
//!    inactive or boundary configurations are accepted; small singular
//!    values are truncated, selecting the minimum-norm solution).
//! 3. The group's contribution is `mu . ds*/dtheta` plus the direct term
//!    `df/dy` capturing the dependence of the residuals on the
//!    simulation at fixed `s*`.
//!
//! Contributions are accumulated across groups and conditions; each
//! distinct outer parameter is processed once, tracked by a memoization
//! set, so the outer gradient vector is written once per index.
//!
//! Invariants & assumptions
//! ------------------------
//! - `fits` is aligned with the problem's group order and the group
//!   snapshots hold the simulation and noise of the same calculator call
//!   (the inner solve ran first).
//! - Entries of outer parameters that map to no simulation parameter stay
//!   zero.
//! - A non-converged group still contributes; its entries are
//!   unreliable, which the calculator's warning policy documents.
use crate::simulator::{ConditionOutput, ParameterMapping, ParameterSource, index_of};
use crate::spline::{
    basis::{SplineBasis, rescale_spline_bases, spline_bases_gradient},
    errors::{SplineError, SplineResult},
    objective::objective_gradient,
    problem::extract_masked,
    solver::{GroupFit, SplineInnerSolver},
};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, s};
use std::collections::HashSet;

/// Relative singular-value truncation of the KKT least-squares solve.
const SVD_TRUNCATION: f64 = 1e-12;

impl SplineInnerSolver {
    /// Gradient of the total inner objective with respect to the outer
    /// parameters.
    ///
    /// `outputs` are this call's per-condition simulation results with
    /// first-order sensitivities; `mapping` resolves which outer
    /// parameter feeds which simulation parameter per condition. The
    /// returned vector is aligned with `par_opt_ids`.
    ///
    /// # Errors
    /// - [`SplineError::LengthMismatch`] if `fits` does not match the
    ///   group count or a sensitivity tensor disagrees with
    ///   `par_sim_ids`.
    /// - [`SplineError::MissingSensitivities`] if a condition carries no
    ///   `sy`.
    /// - [`SplineError::UnknownParameterId`] for unresolvable mapped ids.
    /// - [`SplineError::KktSolveFailed`] if the SVD solve reports
    ///   failure.
    pub fn calculate_gradients(
        &self, problem: &crate::spline::problem::SplineProblem, fits: &[GroupFit],
        outputs: &[ConditionOutput], mapping: &ParameterMapping, par_opt_ids: &[String],
        par_sim_ids: &[String],
    ) -> SplineResult<Array1<f64>> {
        let groups = problem.groups();
        if fits.len() != groups.len() {
            return Err(SplineError::LengthMismatch {
                what: "group fits",
                expected: groups.len(),
                found: fits.len(),
            });
        }

        let mut snllh = Array1::zeros(par_opt_ids.len());
        let mut already_calculated: HashSet<String> = HashSet::new();

        for condition in &mapping.conditions {
            for (par_sim, source) in &condition.map_sim_var {
                let ParameterSource::Estimated(par_opt) = source else { continue };
                if already_calculated.contains(par_opt) {
                    continue;
                }
                already_calculated.insert(par_opt.clone());
                let par_sim_idx = index_of(par_sim_ids, par_sim)?;
                let par_opt_idx = index_of(par_opt_ids, par_opt)?;

                let sy_tables = sensitivity_tables(outputs, par_sim_idx, par_sim_ids.len())?;

                let mut grad = 0.0;
                for (group_idx, &group) in groups.iter().enumerate() {
                    let Some(data) = problem.group_data(group) else { continue };
                    let fit = &fits[group_idx];
                    let n = data.n_spline_pars;

                    let sy_all = extract_masked(&sy_tables, &data.mask)?;
                    let basis = rescale_spline_bases(&data.current_simulation.view(), n)?;
                    let (delta_c_dot, c_dot) = spline_bases_gradient(
                        &data.current_simulation.view(),
                        &sy_all.view(),
                        n,
                    )?;

                    // For the reformulated problem the multipliers of the
                    // active set equal the inner gradient at the optimum.
                    let mu = objective_gradient(
                        &fit.x.view(),
                        &data.current_simulation.view(),
                        &data.measurements.view(),
                        &data.noise_parameters.view(),
                        &basis,
                    );
                    let min_diff =
                        self.minimal_difference(data.min_datapoint, data.max_datapoint, n);

                    if mu.iter().any(|&entry| entry != 0.0) {
                        let s_dot = solve_kkt_sensitivities(
                            &data.current_simulation.view(),
                            &sy_all.view(),
                            &data.measurements.view(),
                            &data.noise_parameters.view(),
                            &fit.x.view(),
                            &mu.view(),
                            min_diff,
                            &basis,
                            delta_c_dot,
                            &c_dot.view(),
                        )?;
                        grad += mu.dot(&s_dot);
                    }

                    grad += objective_simulation_derivative(
                        &data.current_simulation.view(),
                        &sy_all.view(),
                        &data.measurements.view(),
                        &data.noise_parameters.view(),
                        &fit.x.view(),
                        &basis,
                        delta_c_dot,
                        &c_dot.view(),
                    );
                }
                snllh[par_opt_idx] = grad;
            }
        }
        Ok(snllh)
    }
}

/// One simulation parameter's sensitivity tables, per condition.
fn sensitivity_tables(
    outputs: &[ConditionOutput], par_sim_idx: usize, n_sim_pars: usize,
) -> SplineResult<Vec<Array2<f64>>> {
    let mut tables = Vec::with_capacity(outputs.len());
    for (condition, output) in outputs.iter().enumerate() {
        let Some(sy) = output.sy.as_ref() else {
            return Err(SplineError::MissingSensitivities { condition });
        };
        if sy.shape()[1] != n_sim_pars {
            return Err(SplineError::LengthMismatch {
                what: "sensitivity parameter axis",
                expected: n_sim_pars,
                found: sy.shape()[1],
            });
        }
        tables.push(sy.slice(s![.., par_sim_idx, ..]).to_owned());
    }
    Ok(tables)
}

/// Solve the KKT-derivative system for `ds*/dtheta` of one group.
///
/// The first block row differentiates stationarity, the second the
/// complementarity conditions of the reformulated constraints. The system
/// may be rank deficient (inactive constraints, boundary intervals); the
/// SVD least-squares solve discards singular values below
/// `SVD_TRUNCATION` times the largest and returns the minimum-norm
/// solution.
#[allow(clippy::too_many_arguments)]
fn solve_kkt_sensitivities(
    sim: &ArrayView1<f64>, sy: &ArrayView1<f64>, measurements: &ArrayView1<f64>,
    sigma: &ArrayView1<f64>, s: &ArrayView1<f64>, mu: &ArrayView1<f64>, min_diff: f64,
    basis: &SplineBasis, delta_c_dot: f64, c_dot: &ArrayView1<f64>,
) -> SplineResult<Array1<f64>> {
    let n = basis.n_spline_pars();
    let delta = basis.delta_c;
    let mut jac_derivative = Array2::<f64>::zeros((n, n));
    let mut rhs = Array1::<f64>::zeros(2 * n);

    for (k, &y_k) in sim.iter().enumerate() {
        let i = basis.intervals[k] - 1;
        let weight = 1.0 / (sigma[k] * sigma[k]);
        let sum_s: f64 = s.iter().take(i).sum();

        if i == 0 {
            jac_derivative[[0, 0]] += weight;
        } else if i == n {
            for row in 0..n {
                for col in 0..n {
                    jac_derivative[[row, col]] += weight;
                }
            }
        } else {
            let offset = y_k - basis.bases[i - 1];
            let offset_dot = (sy[k] - c_dot[i - 1]) * delta - offset * delta_c_dot;

            jac_derivative[[i, i]] += weight * offset * offset / (delta * delta);
            rhs[i] += weight
                * (2.0 * offset / delta * s[i] + sum_s - measurements[k])
                * offset_dot
                / (delta * delta);
            for j in 0..i {
                jac_derivative[[i, j]] += weight * offset / delta;
                jac_derivative[[j, i]] += weight * offset / delta;
                rhs[j] += weight * offset_dot * s[i] / (delta * delta);
                for h in 0..i {
                    jac_derivative[[j, h]] += weight;
                }
            }
        }
    }

    let dim = 2 * n;
    let mut lhs = DMatrix::<f64>::zeros(dim, dim);
    for row in 0..n {
        for col in 0..n {
            lhs[(row, col)] = jac_derivative[[row, col]];
        }
        lhs[(row, n + row)] = -1.0;
        lhs[(n + row, row)] = -mu[row];
        let constraint = if row == 0 { 0.0 } else { min_diff };
        lhs[(n + row, n + row)] = constraint - s[row];
    }
    let mut b = DVector::<f64>::zeros(dim);
    for row in 0..dim {
        b[row] = rhs[row];
    }

    let svd = lhs.svd(true, true);
    let max_singular =
        svd.singular_values.iter().fold(0.0_f64, |acc, &value| acc.max(value));
    let solution = svd
        .solve(&b, SVD_TRUNCATION * max_singular)
        .map_err(|reason| SplineError::KktSolveFailed { reason })?;

    Ok(Array1::from_iter(solution.iter().take(n).copied()))
}

/// Direct derivative of one group's objective with respect to the
/// simulation at fixed `s*`.
///
/// Only interior intervals contribute; observations pinned to the first
/// interval are predicted by `s[0]` alone and the last-interval
/// observation sits on the moving endpoint of the basis.
#[allow(clippy::too_many_arguments)]
fn objective_simulation_derivative(
    sim: &ArrayView1<f64>, sy: &ArrayView1<f64>, measurements: &ArrayView1<f64>,
    sigma: &ArrayView1<f64>, s: &ArrayView1<f64>, basis: &SplineBasis, delta_c_dot: f64,
    c_dot: &ArrayView1<f64>,
) -> f64 {
    let n = basis.n_spline_pars();
    let delta = basis.delta_c;
    let mut total = 0.0;
    for (k, &y_k) in sim.iter().enumerate() {
        let i = basis.intervals[k] - 1;
        if i > 0 && i < n {
            let weight = 1.0 / (sigma[k] * sigma[k]);
            let sum_s: f64 = s.iter().take(i).sum();
            let offset = y_k - basis.bases[i - 1];
            let offset_dot = (sy[k] - c_dot[i - 1]) * delta - offset * delta_c_dot;
            total += weight
                * (offset * s[i] / delta + sum_s - measurements[k])
                * s[i]
                * offset_dot
                / (delta * delta);
        }
    }
    total
}
