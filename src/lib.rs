//! spline_calibration — hierarchical inner optimization for ODE-model
//! calibration against nonlinear-monotone measurements.
//!
//! Purpose
//! -------
//! Serve as the embedded inner layer of a parameter-estimation toolkit:
//! for every outer (dynamical) parameter vector proposed by an external
//! optimizer, estimate the per-group monotone spline transformation
//! between simulation output and measured data by solving a
//! bound-constrained inner problem, and propagate the derivatives of the
//! optimal inner solution analytically back into the outer gradient via
//! the KKT sensitivity system.
//!
//! Key behaviors
//! -------------
//! - `spline` owns the domain: inner parameters and groups, spline basis
//!   construction, the reformulated objective, the per-group inner
//!   solver, sensitivity propagation, and the calculator orchestrating
//!   one outer evaluation.
//! - `optimization` provides the box-constrained local minimizer the
//!   inner solve runs on and the `argmin` adapter the outer loop can
//!   drive.
//! - `simulator` defines the narrow interfaces to the external
//!   collaborators: the simulation engine and the outer/simulation
//!   parameter mapping.
//!
//! Invariants & assumptions
//! ------------------------
//! - The ODE integrator, the outer optimizer, and all model/format I/O
//!   live outside this crate and are consumed only through the
//!   `simulator` interfaces and the `optimization::outer` adapter.
//! - A failed simulation or a non-converged inner solve is reported as a
//!   sentinel (`+inf` objective, `NaN` gradient) with a warning, never as
//!   an error, so outer optimizers keep receiving well-formed numbers.
//! - One calculator instance serves one outer optimization; concurrent
//!   multi-starts use independent instances and share no state.
//!
//! Downstream usage
//! ----------------
//! - Build a [`spline::SplineProblem`] from inner parameters, the
//!   experimental data tables, and the spline ratio; wire a
//!   [`spline::SplineCalculator`] with a `simulator::Simulator`
//!   implementation and the parameter mapping; then either call
//!   [`spline::SplineCalculator::evaluate`] directly or hand the
//!   calculator to an `argmin` solver through
//!   [`optimization::outer::CalculatorProblem`].

pub mod optimization;
pub mod simulator;
pub mod spline;

pub use optimization::bounded::{
    BoundedObjective, BoundedOptions, BoundedOutcome, Bounds, TerminationStatus,
};
pub use optimization::errors::{OptError, OptResult};
pub use optimization::outer::CalculatorProblem;
pub use simulator::{
    ConditionMap, ConditionOutput, ParameterMapping, ParameterSource, SensitivityOrder,
    SimulationStatus, Simulator,
};
pub use spline::{
    EvalMode, EvalRequest, EvalResult, GroupFit, ParameterScale, SplineCalculator, SplineError,
    SplineInnerSolver, SplineParameter, SplineProblem, SplineResult, SplineSolverOptions,
};
