//! optimization — bounded minimizer, outer-solver bridge, and error surface.
//!
//! Purpose
//! -------
//! Provide the optimization layer the hierarchical calibration core is
//! built on: a box-constrained local minimizer for the per-group inner
//! problems, an `argmin` adapter so outer gradient-based solvers can drive
//! a calculator, and a single error/result surface for both.
//!
//! Key behaviors
//! -------------
//! - Expose the narrow bounded-minimization contract (`bounded`): an
//!   objective trait, validated options and bounds, and a normalized
//!   outcome `{x, fun, jac, converged}`.
//! - Bridge a calculator to `argmin`'s `CostFunction`/`Gradient` traits
//!   (`outer`) so the outer parameter-estimation loop can reuse the
//!   ecosystem's solvers unchanged.
//! - Normalize configuration issues and numerical failures into a single
//!   enum (`errors::OptError`) with a common result alias (`OptResult<T>`).
//!
//! Invariants & assumptions
//! ------------------------
//! - The bounded minimizer operates on feasible points only; projection is
//!   the single constraint mechanism, and bound boundaries are reachable
//!   exactly.
//! - Objective implementations treat domain violations as recoverable
//!   errors surfaced through the optimization layer, never panics.
//! - Non-convergence is an outcome, not an error; sentinel-value policies
//!   live in the calibration layer above.
//!
//! Conventions
//! -----------
//! - Parameters and gradients are `ndarray`-based aliases (`Point`,
//!   `Grad`); scalar objectives are plain `f64`.
//! - Public entrypoints that can fail return `OptResult<T>`; raw `argmin`
//!   errors never cross this boundary inward.

pub mod bounded;
pub mod errors;
pub mod outer;
