//! Public API surface for bound-constrained minimization.
//!
//! - [`BoundedObjective`]: trait users implement for their problem.
//! - [`BoundedOptions`]: configuration for the solver.
//! - [`TerminationStatus`] and [`BoundedOutcome`]: normalized result
//!   returned by the high-level [`minimize`](crate::optimization::bounded::minimize) API.
//!
//! Convention: we minimize a user objective `f(x)` subject to elementwise
//! box constraints. If an analytic gradient is provided it must be the
//! gradient of `f`; when it is not implemented, robust finite differences
//! of the objective are used automatically.
use crate::optimization::{
    bounded::{
        types::{Grad, Point},
        validation::{verify_tol, verify_armijo},
    },
    errors::{OptError, OptResult},
};

/// User-implemented objective interface for box-constrained minimization.
///
/// Required:
/// - `value(&Point) -> OptResult<f64>`: evaluate `f(x)`. Non-finite values
///   at trial points are treated as step rejections by the solver, so a
///   diverging trial does not abort the run; a non-finite value at the
///   (projected) start point does.
///
/// Optional:
/// - `grad(&Point) -> OptResult<Grad>`: analytic gradient `∇f(x)`. The
///   default returns [`OptError::GradientNotImplemented`], which switches
///   the solver to central finite differences of `value`.
pub trait BoundedObjective {
    fn value(&self, x: &Point) -> OptResult<f64>;

    fn grad(&self, _x: &Point) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Solver-level configuration for the projected-gradient minimizer.
///
/// Fields:
/// - `grad_tol`: terminate when the infinity norm of the projected gradient
///   residual `P(x - g) - x` falls below this threshold.
/// - `fun_tol`: terminate when the relative objective decrease falls below
///   this threshold. Kept deliberately tight by default so the gradient
///   criterion is the primary stopping rule.
/// - `step_tol`: terminate when the accepted step is this small.
/// - `max_iter`: hard cap on iterations; hitting it marks the outcome as
///   not converged.
/// - `armijo_c`: sufficient-decrease constant in (0, 1).
/// - `backtrack_factor`: line-search shrink factor in (0, 1).
/// - `max_backtracks`: cap on shrink steps per iteration.
/// - `verbose`: if `true`, prints per-iteration progress to stderr.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedOptions {
    pub grad_tol: f64,
    pub fun_tol: f64,
    pub step_tol: f64,
    pub max_iter: usize,
    pub armijo_c: f64,
    pub backtrack_factor: f64,
    pub max_backtracks: usize,
    pub verbose: bool,
}

impl BoundedOptions {
    /// Construct validated solver options.
    ///
    /// # Rules
    /// - All tolerances must be finite and strictly positive.
    /// - `max_iter` and `max_backtracks` must be positive.
    /// - `armijo_c` and `backtrack_factor` must lie strictly inside (0, 1).
    ///
    /// # Errors
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolFun`] /
    ///   [`OptError::InvalidTolStep`] for bad tolerances.
    /// - [`OptError::InvalidMaxIter`] for zero iteration caps.
    /// - [`OptError::InvalidArmijoParam`] for out-of-range line-search
    ///   parameters.
    pub fn new(
        grad_tol: f64, fun_tol: f64, step_tol: f64, max_iter: usize, armijo_c: f64,
        backtrack_factor: f64, max_backtracks: usize, verbose: bool,
    ) -> OptResult<Self> {
        verify_tol(grad_tol, |tol, reason| OptError::InvalidTolGrad { tol, reason })?;
        verify_tol(fun_tol, |tol, reason| OptError::InvalidTolFun { tol, reason })?;
        verify_tol(step_tol, |tol, reason| OptError::InvalidTolStep { tol, reason })?;
        if max_iter == 0 {
            return Err(OptError::InvalidMaxIter {
                max_iter,
                reason: "Maximum iterations must be greater than zero.",
            });
        }
        if max_backtracks == 0 {
            return Err(OptError::InvalidMaxIter {
                max_iter: max_backtracks,
                reason: "Maximum backtracking steps must be greater than zero.",
            });
        }
        verify_armijo(armijo_c)?;
        verify_armijo(backtrack_factor)?;
        Ok(Self {
            grad_tol,
            fun_tol,
            step_tol,
            max_iter,
            armijo_c,
            backtrack_factor,
            max_backtracks,
            verbose,
        })
    }
}

impl Default for BoundedOptions {
    fn default() -> Self {
        Self {
            grad_tol: 1e-8,
            fun_tol: 1e-15,
            step_tol: 1e-14,
            max_iter: 2000,
            armijo_c: 1e-4,
            backtrack_factor: 0.5,
            max_backtracks: 60,
            verbose: false,
        }
    }
}

/// Reason the solver stopped.
///
/// The first three variants are treated as convergence; the last two mark
/// the run as unsuccessful so callers can apply their failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    /// Projected gradient residual fell below `grad_tol`.
    GradientConverged,
    /// Accepted step fell below `step_tol`.
    StepConverged,
    /// Relative objective decrease fell below `fun_tol`.
    FunctionConverged,
    /// Iteration cap reached without meeting a tolerance.
    MaxIterations,
    /// Backtracking could not produce sufficient decrease.
    LineSearchFailed,
}

impl TerminationStatus {
    /// Whether this status counts as successful convergence.
    pub fn converged(&self) -> bool {
        matches!(
            self,
            TerminationStatus::GradientConverged
                | TerminationStatus::StepConverged
                | TerminationStatus::FunctionConverged
        )
    }
}

impl std::fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationStatus::GradientConverged => write!(f, "Projected gradient tolerance reached"),
            TerminationStatus::StepConverged => write!(f, "Step size tolerance reached"),
            TerminationStatus::FunctionConverged => write!(f, "Objective change tolerance reached"),
            TerminationStatus::MaxIterations => write!(f, "Maximum iterations reached"),
            TerminationStatus::LineSearchFailed => write!(f, "Line search failed"),
        }
    }
}

/// Canonical result returned by `minimize`.
///
/// - `x`: best feasible point found.
/// - `fun`: objective value at `x`.
/// - `jac`: objective gradient at `x` (analytic or finite-difference,
///   matching the mode the run used).
/// - `converged`: `true` if the status is one of the convergence variants.
/// - `status`: the termination reason.
/// - `iterations`: number of accepted iterations.
/// - `func_evals`: number of objective evaluations, including line-search
///   trials.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedOutcome {
    pub x: Point,
    pub fun: f64,
    pub jac: Grad,
    pub converged: bool,
    pub status: TerminationStatus,
    pub iterations: usize,
    pub func_evals: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Verify that the options constructor rejects a non-positive gradient
    // tolerance while the default configuration validates cleanly.
    //
    // Given
    // -----
    // - A `grad_tol` of 0.0 with otherwise default-like values.
    //
    // Expect
    // ------
    // - `Err(OptError::InvalidTolGrad { .. })` for the zero tolerance.
    // - Reconstructing the default field set through `new` succeeds.
    fn options_reject_zero_gradient_tolerance() {
        // Arrange
        let defaults = BoundedOptions::default();

        // Act
        let bad = BoundedOptions::new(
            0.0,
            defaults.fun_tol,
            defaults.step_tol,
            defaults.max_iter,
            defaults.armijo_c,
            defaults.backtrack_factor,
            defaults.max_backtracks,
            false,
        );
        let good = BoundedOptions::new(
            defaults.grad_tol,
            defaults.fun_tol,
            defaults.step_tol,
            defaults.max_iter,
            defaults.armijo_c,
            defaults.backtrack_factor,
            defaults.max_backtracks,
            false,
        );

        // Assert
        assert!(matches!(bad, Err(OptError::InvalidTolGrad { .. })));
        assert!(good.is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Verify the Armijo constant must lie strictly inside (0, 1).
    //
    // Given
    // -----
    // - An `armijo_c` of 1.0.
    //
    // Expect
    // ------
    // - `Err(OptError::InvalidArmijoParam { .. })`.
    fn options_reject_armijo_constant_of_one() {
        let defaults = BoundedOptions::default();
        let bad = BoundedOptions::new(
            defaults.grad_tol,
            defaults.fun_tol,
            defaults.step_tol,
            defaults.max_iter,
            1.0,
            defaults.backtrack_factor,
            defaults.max_backtracks,
            false,
        );
        assert!(matches!(bad, Err(OptError::InvalidArmijoParam { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Confirm the convergence classification of each termination status.
    //
    // Given
    // -----
    // - All five status variants.
    //
    // Expect
    // ------
    // - Gradient/step/function variants converge; the rest do not.
    fn termination_status_classifies_convergence() {
        assert!(TerminationStatus::GradientConverged.converged());
        assert!(TerminationStatus::StepConverged.converged());
        assert!(TerminationStatus::FunctionConverged.converged());
        assert!(!TerminationStatus::MaxIterations.converged());
        assert!(!TerminationStatus::LineSearchFailed.converged());
    }
}
