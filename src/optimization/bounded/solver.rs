//! bounded::solver — spectral projected-gradient minimization over a box.
//!
//! Purpose
//! -------
//! Implement the narrow minimizer interface the inner spline solve relies
//! on: minimize `f(x)` subject to elementwise bounds, returning the optimum,
//! its value and gradient, and a success flag. The method is a spectral
//! projected gradient iteration: Barzilai-Borwein step seeding with a
//! nonmonotone (Grippo-Lampariello-Lucidi) backtracking line search along
//! the feasible direction.
//!
//! Key behaviors
//! -------------
//! - Project the start point onto the box and iterate on feasible points
//!   only; every trial point is a convex combination of feasible points.
//! - Seed each iteration's step length with the spectral (Barzilai-Borwein)
//!   scale, clamped into a safe range.
//! - Stop on the projected-gradient residual, the accepted step size, the
//!   relative objective decrease, or the iteration cap.
//! - Fall back to central finite differences of the objective when the
//!   analytic gradient is not implemented, capturing evaluation errors
//!   raised inside the difference stencil.
//!
//! Invariants & assumptions
//! ------------------------
//! - [`Bounds`] are validated at construction, so projection is total.
//! - Non-finite objective values at trial points reject the step; a
//!   non-finite value at the projected start point is an error.
//! - The gradient mode (analytic vs finite differences) is fixed once per
//!   run, probed at the start point.
//!
//! Conventions
//! -----------
//! - Iterates exactly on bound boundaries are reachable: projection writes
//!   the bound value itself, which is what makes the downstream active-set
//!   reasoning of the sensitivity layer well defined.
//! - `func_evals` counts objective evaluations including rejected
//!   line-search trials; gradient evaluations are not counted separately.
use crate::optimization::{
    bounded::{
        traits::{BoundedObjective, BoundedOptions, BoundedOutcome, TerminationStatus},
        types::{Bounds, Grad, Point},
        validation::{validate_grad, validate_start},
    },
    errors::{OptError, OptResult},
};
use finitediff::FiniteDiff;
use ndarray::Array1;
use std::cell::RefCell;

/// Lower clamp for the spectral step length.
const STEP_MIN: f64 = 1e-10;

/// Upper clamp for the spectral step length.
const STEP_MAX: f64 = 1e10;

/// Window length of the nonmonotone line-search reference.
const GLL_MEMORY: usize = 10;

/// Minimize `obj` over the box `bounds`, starting from `x0`.
///
/// The start point is projected onto the box before the first evaluation,
/// so `x0` itself does not need to be feasible.
///
/// Returns a [`BoundedOutcome`] in both the converged and non-converged
/// cases; only malformed inputs and failed evaluations produce `Err`.
///
/// # Errors
/// - [`OptError::InvalidStartPoint`] for non-finite `x0` entries.
/// - [`OptError::BoundsStartMismatch`] if `bounds.len() != x0.len()`.
/// - [`OptError::NonFiniteValue`] if the objective is non-finite at the
///   projected start point.
/// - Any error raised by the objective's `value`/`grad`, including
///   errors captured inside the finite-difference stencil.
pub fn minimize<O: BoundedObjective>(
    obj: &O, x0: &Point, bounds: &Bounds, opts: &BoundedOptions,
) -> OptResult<BoundedOutcome> {
    validate_start(x0)?;
    if bounds.len() != x0.len() {
        return Err(OptError::BoundsStartMismatch { bounds: bounds.len(), start: x0.len() });
    }

    let mut x = bounds.project(x0);
    let mut fun = obj.value(&x)?;
    let mut func_evals = 1usize;
    if !fun.is_finite() {
        return Err(OptError::NonFiniteValue { value: fun });
    }

    // Probe the gradient mode once; a missing analytic gradient switches the
    // whole run to central finite differences of the objective.
    let use_fd = match obj.grad(&x) {
        Err(OptError::GradientNotImplemented) => true,
        Err(e) => return Err(e),
        Ok(g) => {
            validate_grad(&g, x.len())?;
            false
        }
    };
    let mut grad = gradient_at(obj, &x, use_fd)?;

    let mut bb_step = initial_step(&grad);
    let mut iterations = 0usize;
    // Recent objective values for the nonmonotone sufficient-decrease
    // reference; bounded to the last GLL_MEMORY accepted iterates.
    let mut history: Vec<f64> = vec![fun];

    let status = loop {
        let residual = projected_residual(&x, &grad, bounds);
        if inf_norm(&residual) <= opts.grad_tol {
            break TerminationStatus::GradientConverged;
        }
        if iterations >= opts.max_iter {
            break TerminationStatus::MaxIterations;
        }

        // Spectral trial point and feasible search direction.
        let trial = bounds.project(&(&x - &(&grad * bb_step)));
        let mut direction = &trial - &x;
        let mut slope = direction.dot(&grad);
        if slope >= 0.0 {
            // The spectral scale produced an ascent direction; fall back to
            // the unit projected gradient direction.
            direction = residual;
            slope = direction.dot(&grad);
            if slope >= 0.0 {
                break TerminationStatus::GradientConverged;
            }
        }

        // Nonmonotone backtracking Armijo along the feasible segment; the
        // sufficient-decrease reference is the worst of the recent values.
        let reference = history.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let mut alpha = 1.0;
        let mut accepted: Option<(Point, f64)> = None;
        for _ in 0..opts.max_backtracks {
            let candidate = &x + &(&direction * alpha);
            let value = obj.value(&candidate)?;
            func_evals += 1;
            if value.is_finite() && value <= reference + opts.armijo_c * alpha * slope {
                accepted = Some((candidate, value));
                break;
            }
            alpha *= opts.backtrack_factor;
        }
        let (x_new, fun_new) = match accepted {
            Some(pair) => pair,
            None => break TerminationStatus::LineSearchFailed,
        };

        let grad_new = gradient_at(obj, &x_new, use_fd)?;
        let step = &x_new - &x;
        let grad_change = &grad_new - &grad;
        bb_step = spectral_step(&step, &grad_change, bb_step);

        let decrease = fun - fun_new;
        let scale = fun.abs().max(fun_new.abs()).max(1.0);
        let step_norm = inf_norm(&step);

        x = x_new;
        fun = fun_new;
        grad = grad_new;
        iterations += 1;
        history.push(fun);
        if history.len() > GLL_MEMORY {
            history.remove(0);
        }

        if opts.verbose {
            eprintln!("iter {iterations}: f = {fun:.12e}, step = {step_norm:.3e}");
        }

        if decrease >= 0.0 && decrease <= opts.fun_tol * scale {
            break TerminationStatus::FunctionConverged;
        }
        if step_norm <= opts.step_tol {
            break TerminationStatus::StepConverged;
        }
    };

    Ok(BoundedOutcome {
        converged: status.converged(),
        status,
        x,
        fun,
        jac: grad,
        iterations,
        func_evals,
    })
}

/// Evaluate the gradient in the mode fixed for this run.
fn gradient_at<O: BoundedObjective>(obj: &O, x: &Point, use_fd: bool) -> OptResult<Grad> {
    if use_fd {
        fd_gradient(obj, x)
    } else {
        let grad = obj.grad(x)?;
        validate_grad(&grad, x.len())?;
        Ok(grad)
    }
}

/// Central finite-difference gradient of the objective, with error capture.
///
/// The difference stencil can't return `Result`, so any error raised by the
/// objective is stored aside and the stencil sees `NaN`; the first captured
/// error is re-raised afterwards, before gradient validation.
fn fd_gradient<O: BoundedObjective>(obj: &O, x: &Point) -> OptResult<Grad> {
    let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
    let value_fn = |v: &Vec<f64>| -> f64 {
        let point = Array1::from(v.clone());
        match obj.value(&point) {
            Ok(val) => val,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                f64::NAN
            }
        }
    };
    let fd = x.to_vec().central_diff(&value_fn);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    let grad = Array1::from(fd);
    validate_grad(&grad, x.len())?;
    Ok(grad)
}

/// Infinity norm of a vector; zero for the empty vector.
fn inf_norm(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0_f64, |acc, &value| acc.max(value.abs()))
}

/// Projected gradient residual `P(x - g) - x`.
///
/// Its infinity norm is the stationarity measure for the box-constrained
/// problem: zero exactly at KKT points.
fn projected_residual(x: &Point, grad: &Grad, bounds: &Bounds) -> Point {
    let shifted = x - grad;
    let projected = bounds.project(&shifted);
    &projected - x
}

/// Initial spectral scale from the start gradient.
fn initial_step(grad: &Grad) -> f64 {
    let norm = inf_norm(grad);
    if norm > 0.0 { (1.0 / norm).clamp(STEP_MIN, STEP_MAX) } else { 1.0 }
}

/// Barzilai-Borwein step `s.s / s.y`, keeping the previous scale when the
/// curvature along the step is not positive.
fn spectral_step(step: &Point, grad_change: &Point, previous: f64) -> f64 {
    let sy = step.dot(grad_change);
    if sy > f64::EPSILON {
        (step.dot(step) / sy).clamp(STEP_MIN, STEP_MAX)
    } else {
        previous.clamp(STEP_MIN, STEP_MAX)
    }
}
