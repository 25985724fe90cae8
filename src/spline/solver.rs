//! Per-group inner optimization of the reformulated spline problem.
//!
//! Purpose
//! -------
//! Solve, for every group, the bound-constrained fit of the increment
//! vector `s` against the current simulation: refresh the group's
//! simulation and noise snapshots, build the spline basis, assemble the
//! monotonicity bounds `s[0] >= 0`, `s[i > 0] >= min_diff`, run the
//! bounded minimizer with the analytic value and gradient, and write the
//! cumulative heights back into the parameters.
//!
//! Key behaviors
//! -------------
//! - Warm start: when any stored parameter value is positive, the previous
//!   optimum (reconstructed in increment space) seeds the next call;
//!   otherwise a heuristic start is computed from the measurement range.
//! - Non-convergence never raises: the group is marked `success == false`,
//!   the previous warm-start values stay untouched, and
//!   [`SplineInnerSolver::total_objective`] reports `+inf` with a warning.
//! - The write-back is transactional per group: the full cumulative vector
//!   is computed before any parameter value changes.
//!
//! Invariants & assumptions
//! ------------------------
//! - Groups are independent; they are solved sequentially in key order and
//!   the returned fits are aligned with
//!   [`SplineProblem::groups`](crate::spline::problem::SplineProblem::groups).
//! - Noise standard deviations are validated here (finite, strictly
//!   positive) before any objective evaluation divides by them.
use crate::optimization::bounded::{
    BoundedObjective, BoundedOptions, Bounds, Grad, Point, minimize,
};
use crate::optimization::errors::OptResult;
use crate::spline::{
    basis::{SplineBasis, cumulative_heights, rescale_spline_bases},
    errors::{SplineError, SplineResult},
    objective::{objective_gradient, objective_value},
    parameter::SplineParameter,
    problem::{GroupData, SplineProblem, extract_masked},
};
use log::warn;
use ndarray::{Array1, Array2};

/// Options of the inner spline solver.
///
/// `use_minimal_difference` switches the minimum-spacing constraint
/// `s[i > 0] >= (max z - min z) / (2N)` on (the default) or off;
/// `verbose` prints per-group solve summaries to stderr; `optimizer`
/// configures the bounded minimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineSolverOptions {
    pub use_minimal_difference: bool,
    pub verbose: bool,
    pub optimizer: BoundedOptions,
}

impl SplineSolverOptions {
    /// Construct validated solver options.
    ///
    /// The embedded optimizer options are re-validated so a hand-built
    /// [`BoundedOptions`] cannot smuggle malformed tolerances past
    /// construction.
    ///
    /// # Errors
    /// Returns [`SplineError::InvalidSolverOption`] wrapping the first
    /// optimizer-option violation.
    pub fn new(
        use_minimal_difference: bool, verbose: bool, optimizer: BoundedOptions,
    ) -> SplineResult<Self> {
        BoundedOptions::new(
            optimizer.grad_tol,
            optimizer.fun_tol,
            optimizer.step_tol,
            optimizer.max_iter,
            optimizer.armijo_c,
            optimizer.backtrack_factor,
            optimizer.max_backtracks,
            optimizer.verbose,
        )
        .map_err(|e| SplineError::InvalidSolverOption { detail: e.to_string() })?;
        Ok(Self { use_minimal_difference, verbose, optimizer })
    }
}

impl Default for SplineSolverOptions {
    fn default() -> Self {
        Self { use_minimal_difference: true, verbose: false, optimizer: BoundedOptions::default() }
    }
}

/// One group's inner optimization result.
///
/// `x` is the reformulated increment vector `s*`, `fun` the objective
/// value and `jac` the objective gradient at `s*`. `success` is `false`
/// when the bounded minimizer did not converge; the stored parameter
/// values are then left at their previous state and the group's outer
/// gradient entries are unreliable.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFit {
    pub group: usize,
    pub x: Array1<f64>,
    pub fun: f64,
    pub jac: Array1<f64>,
    pub success: bool,
}

/// Bounded-minimizer view of one group's objective.
struct GroupObjective<'a> {
    sim: &'a Array1<f64>,
    measurements: &'a Array1<f64>,
    sigma: &'a Array1<f64>,
    basis: &'a SplineBasis,
}

impl BoundedObjective for GroupObjective<'_> {
    fn value(&self, x: &Point) -> OptResult<f64> {
        Ok(objective_value(
            &x.view(),
            &self.sim.view(),
            &self.measurements.view(),
            &self.sigma.view(),
            self.basis,
        ))
    }

    fn grad(&self, x: &Point) -> OptResult<Grad> {
        Ok(objective_gradient(
            &x.view(),
            &self.sim.view(),
            &self.measurements.view(),
            &self.sigma.view(),
            self.basis,
        ))
    }
}

/// Solver of the inner subproblem of the spline approximation for
/// nonlinear-monotone data.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineInnerSolver {
    pub options: SplineSolverOptions,
}

impl SplineInnerSolver {
    /// Create a solver from validated options.
    pub fn new(options: SplineSolverOptions) -> Self {
        Self { options }
    }

    /// Solve every group's inner problem for the current simulation.
    ///
    /// `sim` and `sigma` are per-condition tables shaped like the
    /// experimental data; the group masks select this call's observation
    /// vectors, which are stored into the problem's snapshots before
    /// optimization.
    ///
    /// Returns one [`GroupFit`] per group, in group-key order. After a
    /// successful group solve the cumulative heights are written into the
    /// parameter values in rank order; failed groups keep their previous
    /// values.
    ///
    /// # Errors
    /// - Shape errors from mask extraction.
    /// - [`SplineError::NonPositiveNoise`] for invalid noise entries.
    /// - Basis construction errors for groups with fewer than two
    ///   parameters.
    pub fn solve(
        &self, problem: &mut SplineProblem, sim: &[Array2<f64>], sigma: &[Array2<f64>],
    ) -> SplineResult<Vec<GroupFit>> {
        let groups = problem.groups();
        let mut fits = Vec::with_capacity(groups.len());
        for group in groups {
            let Some(data) = problem.group_data(group) else { continue };
            let sim_vec = extract_masked(sim, &data.mask)?;
            let sigma_vec = extract_masked(sigma, &data.mask)?;
            for (index, &value) in sigma_vec.iter().enumerate() {
                if !value.is_finite() || value <= 0.0 {
                    return Err(SplineError::NonPositiveNoise { index, value });
                }
            }
            if let Some(data) = problem.group_data_mut(group) {
                data.current_simulation = sim_vec;
                data.noise_parameters = sigma_vec;
            }

            let fit = {
                let Some(data) = problem.group_data(group) else { continue };
                self.optimize_group(problem.parameters_for_group(group), data)?
            };

            if fit.success {
                let heights = cumulative_heights(&fit.x.view());
                for (parameter, &height) in
                    problem.parameters_for_group_mut(group).iter_mut().zip(heights.iter())
                {
                    parameter.value = height;
                }
            } else {
                warn!("Inner optimization failed for group {group}; keeping previous values.");
            }
            fits.push(fit);
        }
        Ok(fits)
    }

    /// Total inner objective across groups: the sum of the per-group
    /// values, or `+inf` (with a warning) if any group failed.
    pub fn total_objective(fits: &[GroupFit]) -> f64 {
        if fits.iter().any(|fit| !fit.success) {
            warn!("Inner optimization failed; reporting an infinite objective value.");
            f64::INFINITY
        } else {
            fits.iter().map(|fit| fit.fun).sum()
        }
    }

    /// Minimal spline parameter difference for one group.
    pub fn minimal_difference(&self, min_meas: f64, max_meas: f64, n_spline_pars: usize) -> f64 {
        if self.options.use_minimal_difference {
            (max_meas - min_meas) / (2.0 * n_spline_pars as f64)
        } else {
            0.0
        }
    }

    fn optimize_group(
        &self, members: &[SplineParameter], data: &GroupData,
    ) -> SplineResult<GroupFit> {
        let n = data.n_spline_pars;
        let basis = rescale_spline_bases(&data.current_simulation.view(), n)?;
        let min_diff = self.minimal_difference(data.min_datapoint, data.max_datapoint, n);

        let mut lower = Array1::from_elem(n, min_diff);
        lower[0] = 0.0;
        let bounds = Bounds::lower_only(lower)
            .map_err(|e| SplineError::InvalidSolverOption { detail: e.to_string() })?;

        let x0 = start_point(members, data);
        let objective = GroupObjective {
            sim: &data.current_simulation,
            measurements: &data.measurements,
            sigma: &data.noise_parameters,
            basis: &basis,
        };

        let fit = match minimize(&objective, &x0, &bounds, &self.options.optimizer) {
            Ok(outcome) => {
                if self.options.verbose {
                    eprintln!(
                        "group {}: f = {:.6e} after {} iterations ({})",
                        data.group, outcome.fun, outcome.iterations, outcome.status
                    );
                }
                GroupFit {
                    group: data.group,
                    x: outcome.x,
                    fun: outcome.fun,
                    jac: outcome.jac,
                    success: outcome.converged,
                }
            }
            Err(e) => {
                warn!("Inner minimizer error for group {}: {e}", data.group);
                GroupFit {
                    group: data.group,
                    x: x0,
                    fun: f64::INFINITY,
                    jac: Array1::from_elem(n, f64::NAN),
                    success: false,
                }
            }
        };
        Ok(fit)
    }
}

/// Start point of one group's inner optimization.
///
/// When any stored value is positive the previous optimum seeds the run,
/// reconstructed in increment space from the stored cumulative heights.
/// Otherwise the heuristic start spreads the measurement range (padded by
/// 30 percent on both sides, floored at zero) evenly over the increments.
fn start_point(members: &[SplineParameter], data: &GroupData) -> Array1<f64> {
    let previous: Vec<f64> = members.iter().map(|p| p.value).collect();
    if previous.iter().any(|&value| value > 0.0) {
        let mut x0 = Array1::zeros(previous.len());
        let mut last = 0.0;
        for (slot, &height) in previous.iter().enumerate() {
            x0[slot] = height - last;
            last = height;
        }
        x0
    } else {
        let n = data.n_spline_pars;
        let range_all = data.max_datapoint - data.min_datapoint;
        let floor = (data.min_datapoint - 0.3 * range_all).max(0.0);
        let fill = (data.max_datapoint + 0.3 * range_all - floor) / (n as f64 - 1.0);
        let mut x0 = Array1::from_elem(n, fill);
        x0[0] = floor;
        x0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spline::parameter::{ParameterScale, SplineParameter};
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn column(values: &Array1<f64>) -> Array2<f64> {
        Array2::from_shape_vec((values.len(), 1), values.to_vec()).expect("column shape")
    }

    fn seed_problem() -> (SplineProblem, Array2<f64>, Array2<f64>) {
        let timepoints = Array1::linspace(0.0, 10.0, 11);
        let mask = vec![Array2::from_elem((11, 1), true)];
        let parameters: Vec<SplineParameter> = (1..=6)
            .map(|index| {
                SplineParameter::new(
                    format!("spline_1_{index}"),
                    1,
                    index,
                    ParameterScale::Lin,
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                    mask.clone(),
                )
                .expect("valid parameter")
            })
            .collect();
        let problem = SplineProblem::new(parameters, &[column(&timepoints)], 0.5)
            .expect("problem should build");
        let sim = column(&timepoints);
        let sigma = Array2::from_elem((11, 1), 1.0);
        (problem, sim, sigma)
    }

    #[test]
    // Purpose
    // -------
    // Verify the zero-residual seed scenario: simulation equal to
    // measurement on linspace(0, 10, 11) with spline_ratio 1/2 (N = 6)
    // is fit exactly, with and without the minimal-difference constraint.
    //
    // Given
    // -----
    // - The seed problem and both settings of `use_minimal_difference`.
    //
    // Expect
    // ------
    // - fun close to 0, jac close to the zero vector, and
    //   x close to [0, 2, 2, 2, 2, 2] in both configurations.
    // - The written-back parameter values are the cumulative heights
    //   [0, 2, 4, 6, 8, 10].
    fn solve_reproduces_zero_residual_seed_scenario() {
        for use_minimal_difference in [true, false] {
            // Arrange
            let (mut problem, sim, sigma) = seed_problem();
            let options = SplineSolverOptions::new(
                use_minimal_difference,
                false,
                BoundedOptions::default(),
            )
            .expect("valid options");
            let solver = SplineInnerSolver::new(options);

            // Act
            let fits = solver
                .solve(&mut problem, &[sim.clone()], &[sigma.clone()])
                .expect("solve should run");

            // Assert
            assert_eq!(fits.len(), 1);
            let fit = &fits[0];
            assert!(fit.success, "minimal_difference={use_minimal_difference}");
            assert_abs_diff_eq!(fit.fun, 0.0, epsilon = 1e-8);
            let expected = [0.0, 2.0, 2.0, 2.0, 2.0, 2.0];
            for (slot, &target) in expected.iter().enumerate() {
                assert_abs_diff_eq!(fit.x[slot], target, epsilon = 1e-5);
                assert_abs_diff_eq!(fit.jac[slot], 0.0, epsilon = 1e-6);
            }
            let heights = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
            for (parameter, &target) in
                problem.parameters_for_group(1).iter().zip(heights.iter())
            {
                assert_abs_diff_eq!(parameter.value, target, epsilon = 1e-5);
            }
            assert_abs_diff_eq!(
                SplineInnerSolver::total_objective(&fits),
                0.0,
                epsilon = 1e-8
            );
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the warm start: a second solve on the same data seeds from
    // the stored optimum and reproduces it.
    //
    // Given
    // -----
    // - Two consecutive solves of the seed problem.
    //
    // Expect
    // ------
    // - Both fits succeed with near-zero objective; the second solve
    //   converges at least as fast as the first (its start is already
    //   optimal).
    fn solve_warm_starts_from_previous_optimum() {
        // Arrange
        let (mut problem, sim, sigma) = seed_problem();
        let solver = SplineInnerSolver::new(SplineSolverOptions::default());

        // Act
        let first = solver
            .solve(&mut problem, &[sim.clone()], &[sigma.clone()])
            .expect("first solve");
        let second = solver
            .solve(&mut problem, &[sim.clone()], &[sigma.clone()])
            .expect("second solve");

        // Assert
        assert!(first[0].success && second[0].success);
        assert_abs_diff_eq!(second[0].fun, 0.0, epsilon = 1e-10);
        for slot in 0..6 {
            assert_abs_diff_eq!(second[0].x[slot], first[0].x[slot], epsilon = 1e-6);
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the failure policy: a solve that cannot converge leaves the
    // warm-start state untouched and drives the total objective to +inf.
    //
    // Given
    // -----
    // - A first successful solve, then a second solve on shifted
    //   simulations with an iteration cap of 1.
    //
    // Expect
    // ------
    // - The second fit reports success == false; parameter values still
    //   hold the first solve's heights; total_objective is +inf.
    fn failed_solve_preserves_warm_start_state() {
        // Arrange
        let (mut problem, sim, sigma) = seed_problem();
        let solver = SplineInnerSolver::new(SplineSolverOptions::default());
        solver.solve(&mut problem, &[sim.clone()], &[sigma.clone()]).expect("first solve");
        let stored: Vec<f64> =
            problem.parameters_for_group(1).iter().map(|p| p.value).collect();

        let defaults = BoundedOptions::default();
        let capped = BoundedOptions::new(
            1e-16,
            defaults.fun_tol,
            defaults.step_tol,
            1,
            defaults.armijo_c,
            defaults.backtrack_factor,
            defaults.max_backtracks,
            false,
        )
        .expect("valid capped options");
        let strict = SplineInnerSolver::new(
            SplineSolverOptions::new(true, false, capped).expect("valid options"),
        );
        let shifted = sim.mapv(|v| (v - 5.0) * (v - 5.0));

        // Act
        let fits = strict.solve(&mut problem, &[shifted], &[sigma]).expect("second solve");

        // Assert
        assert!(!fits[0].success);
        assert!(SplineInnerSolver::total_objective(&fits).is_infinite());
        for (parameter, &previous) in problem.parameters_for_group(1).iter().zip(stored.iter()) {
            assert_abs_diff_eq!(parameter.value, previous, epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify noise validation: a zero standard deviation is rejected at
    // solve time as invalid input.
    //
    // Given
    // -----
    // - The seed problem with one sigma entry set to zero.
    //
    // Expect
    // ------
    // - `Err(SplineError::NonPositiveNoise { index: 3, .. })`.
    fn solve_rejects_non_positive_noise() {
        let (mut problem, sim, mut sigma) = seed_problem();
        sigma[[3, 0]] = 0.0;
        let solver = SplineInnerSolver::new(SplineSolverOptions::default());
        let result = solver.solve(&mut problem, &[sim], &[sigma]);
        assert!(matches!(result, Err(SplineError::NonPositiveNoise { index: 3, .. })));
    }

    #[test]
    // Purpose
    // -------
    // Verify the heuristic start point of an unseeded group.
    //
    // Given
    // -----
    // - The seed problem before any solve (all values zero); measurements
    //   span [0, 10], N = 6.
    //
    // Expect
    // ------
    // - x0[0] = max(0 - 3, 0) = 0 and the remaining slots hold
    //   (10 + 3 - 0) / 5 = 2.6.
    fn start_point_uses_range_heuristic_without_warm_start() {
        let (problem, _sim, _sigma) = seed_problem();
        let data = problem.group_data(1).expect("group");
        let x0 = start_point(problem.parameters_for_group(1), data);
        assert_abs_diff_eq!(x0[0], 0.0, epsilon = 1e-12);
        for slot in 1..6 {
            assert_abs_diff_eq!(x0[slot], 2.6, epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify option validation wraps optimizer violations as solver
    // configuration errors.
    //
    // Given
    // -----
    // - Bounded options hand-built with a zero gradient tolerance.
    //
    // Expect
    // ------
    // - `Err(SplineError::InvalidSolverOption { .. })`.
    fn options_reject_invalid_optimizer_settings() {
        let mut optimizer = BoundedOptions::default();
        optimizer.grad_tol = 0.0;
        let result = SplineSolverOptions::new(true, false, optimizer);
        assert!(matches!(result, Err(SplineError::InvalidSolverOption { .. })));
    }
}
