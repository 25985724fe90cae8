//! bounded — box-constrained local minimization behind a narrow interface.
//!
//! Purpose
//! -------
//! Provide the minimizer contract the hierarchical inner solve is written
//! against: implement [`BoundedObjective`] for a problem, call [`minimize`]
//! with a start point, [`Bounds`], and [`BoundedOptions`], and receive a
//! [`BoundedOutcome`] carrying `{x, fun, jac, converged}`.
//!
//! Key behaviors
//! -------------
//! - Validate configuration at construction ([`BoundedOptions::new`]) and
//!   inputs at call time, reporting problems as [`OptError`] values.
//! - Run a spectral projected gradient method that reaches bound
//!   boundaries exactly, which downstream active-set reasoning relies on.
//! - Fall back to central finite differences when no analytic gradient is
//!   implemented.
//!
//! Conventions
//! -----------
//! - Non-convergence is a normal outcome (`converged == false`), not an
//!   error; callers decide the failure policy.
//! - All vectors use the canonical aliases [`Point`] and [`Grad`].
pub mod solver;
pub mod traits;
pub mod types;
pub mod validation;

pub use solver::minimize;
pub use traits::{BoundedObjective, BoundedOptions, BoundedOutcome, TerminationStatus};
pub use types::{Bounds, Grad, Point};
