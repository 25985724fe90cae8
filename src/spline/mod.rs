//! spline — hierarchical spline approximation for nonlinear-monotone data.
//!
//! Purpose
//! -------
//! Implement the inner layer of hierarchical ODE-model calibration: when
//! an observable is related to the measurements by an unknown monotone
//! transformation, that transformation is estimated as a piecewise-linear
//! spline inside every outer objective evaluation, and the derivatives of
//! the optimal spline are propagated analytically into the outer
//! gradient.
//!
//! Key behaviors
//! -------------
//! - `parameter` / `problem`: validated inner-parameter value objects and
//!   the arena-backed problem with per-group measurement snapshots.
//! - `basis`: spline breakpoints rescaled to the current simulation,
//!   their directional derivatives, and mapping/monotonicity diagnostics.
//! - `objective`: closed-form value, gradient, and Hessian of the
//!   reformulated spline-fit loss.
//! - `solver`: per-group bound-constrained inner optimization with warm
//!   starts and transactional write-back.
//! - `sensitivity`: implicit-function-theorem propagation through the
//!   inner KKT system into the outer gradient.
//! - `calculator`: one outer objective/gradient call end to end, with
//!   sentinel handling for failed simulations and inner solves.
//!
//! Conventions
//! -----------
//! - The optimization variable of the inner problem is the increment
//!   vector `s`; monotonicity of the reconstructed spline is enforced by
//!   the bounds `s[0] >= 0`, `s[i > 0] >= min_diff`.
//! - Failures of external collaborators surface as sentinel values, not
//!   errors; see `errors` for the taxonomy of genuine errors.

pub mod basis;
pub mod calculator;
pub mod errors;
pub mod objective;
pub mod parameter;
pub mod problem;
pub mod sensitivity;
pub mod solver;

pub use basis::{
    MIN_SIM_RANGE, SplineBasis, monotonicity_measure, rescale_spline_bases,
    spline_bases_gradient, spline_mapped_simulations,
};
pub use calculator::{EvalMode, EvalRequest, EvalResult, SplineCalculator};
pub use errors::{SplineError, SplineResult};
pub use parameter::{ParameterScale, SplineParameter};
pub use problem::{GroupData, SplineProblem, extract_masked};
pub use solver::{GroupFit, SplineInnerSolver, SplineSolverOptions};
