//! Adapter that exposes a calculator as an `argmin` problem.
//!
//! The outer parameter-estimation loop is external to this crate; what it
//! needs from us is a cost function and a gradient. This adapter wraps a
//! [`SplineCalculator`] behind `argmin`'s `CostFunction` and `Gradient`
//! traits so any of the ecosystem's gradient-based solvers (L-BFGS with a
//! line search being the usual choice) can drive the hierarchical
//! objective unchanged.
//!
//! The calculator mutates per call (warm-start state of the inner
//! problem), while `argmin` evaluates through `&self`; the adapter owns
//! the calculator behind a `RefCell` to bridge the two. Sentinel values
//! pass through untouched: a failed simulation surfaces as an infinite
//! cost or a `NaN` gradient, which the outer solver treats as a rejected
//! step.
use crate::simulator::Simulator;
use crate::spline::calculator::{EvalRequest, SplineCalculator};
use argmin::core::{CostFunction, Error, Gradient};
use ndarray::Array1;
use std::cell::RefCell;

/// Bridges a [`SplineCalculator`] to `argmin`'s problem traits.
pub struct CalculatorProblem<S: Simulator> {
    calculator: RefCell<SplineCalculator<S>>,
}

impl<S: Simulator> CalculatorProblem<S> {
    /// Wrap a calculator for consumption by an `argmin` executor.
    pub fn new(calculator: SplineCalculator<S>) -> Self {
        Self { calculator: RefCell::new(calculator) }
    }

    /// Current optimal inner parameter values, for diagnostics after (or
    /// during) an outer run.
    pub fn inner_parameters(&self) -> Vec<(String, f64)> {
        self.calculator.borrow().problem().inner_parameter_map()
    }

    /// Unwrap the calculator, keeping its warm-start state.
    pub fn into_inner(self) -> SplineCalculator<S> {
        self.calculator.into_inner()
    }
}

impl<S: Simulator> CostFunction for CalculatorProblem<S> {
    type Param = Array1<f64>;
    type Output = f64;

    /// Evaluate the hierarchical objective value at `param`.
    ///
    /// # Errors
    /// Propagates contract violations ([`crate::spline::errors::SplineError`])
    /// from the calculator; sentinel `+inf` values are returned as plain
    /// costs, not errors.
    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        let mut calculator = self.calculator.borrow_mut();
        let result = calculator.evaluate(&param.view(), &EvalRequest::value())?;
        Ok(result.fval.unwrap_or(f64::INFINITY))
    }
}

impl<S: Simulator> Gradient for CalculatorProblem<S> {
    type Param = Array1<f64>;
    type Gradient = Array1<f64>;

    /// Evaluate the analytic outer gradient at `param`.
    ///
    /// # Errors
    /// Propagates contract violations from the calculator; a failed
    /// simulation yields a `NaN` vector rather than an error.
    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, Error> {
        let mut calculator = self.calculator.borrow_mut();
        let result = calculator.evaluate(&param.view(), &EvalRequest::with_gradient())?;
        let dimension = calculator.n_outer_parameters();
        Ok(result.grad.unwrap_or_else(|| Array1::from_elem(dimension, f64::NAN)))
    }
}
