//! Validation helpers for bound-constrained minimization.
//!
//! This module centralizes the consistency checks used across the minimizer
//! interface:
//!
//! - **Tolerance checks**: [`verify_tol`] ensures numeric tolerances are
//!   finite and strictly positive.
//! - **Line-search parameters**: [`verify_armijo`] keeps Armijo constants
//!   and shrink factors strictly inside (0, 1).
//! - **Gradient validation**: [`validate_grad`] enforces correct dimension
//!   and finite entries.
//! - **Start points**: [`validate_start`] rejects non-finite entries before
//!   the first projection.
//!
//! These helpers standardize error reporting by returning domain-specific
//! [`OptError`] variants, making higher-level code more uniform and easier
//! to debug.
use crate::optimization::{
    bounded::types::{Grad, Point},
    errors::{OptError, OptResult},
};

/// Validate a tolerance value: must be finite and strictly positive.
///
/// The caller supplies the error constructor so one helper serves every
/// tolerance field.
///
/// # Errors
/// Returns the constructed [`OptError`] if the value is non-finite or <= 0.
pub fn verify_tol<E>(tol: f64, make_err: E) -> OptResult<()>
where
    E: Fn(f64, &'static str) -> OptError,
{
    if !tol.is_finite() {
        return Err(make_err(tol, "Tolerance must be finite."));
    }
    if tol <= 0.0 {
        return Err(make_err(tol, "Tolerance must be positive."));
    }
    Ok(())
}

/// Validate an Armijo-type line-search parameter: strictly inside (0, 1).
///
/// # Errors
/// Returns [`OptError::InvalidArmijoParam`] otherwise.
pub fn verify_armijo(value: f64) -> OptResult<()> {
    if !value.is_finite() || value <= 0.0 || value >= 1.0 {
        return Err(OptError::InvalidArmijoParam {
            value,
            reason: "Line search parameters must lie strictly inside (0, 1).",
        });
    }
    Ok(())
}

/// Validate a gradient vector against dimension and finiteness.
///
/// Checks:
/// - `grad.len() == dim`
/// - every element is finite (`NaN` or infinities are rejected)
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if length does not match `dim`.
/// - [`OptError::InvalidGradient`] with the index/value/reason of the first
///   offending element.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate a start point: every entry must be finite.
///
/// # Errors
/// Returns [`OptError::InvalidStartPoint`] with the first offending entry.
pub fn validate_start(x0: &Point) -> OptResult<()> {
    for (index, &value) in x0.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidStartPoint { index, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Verify tolerance validation accepts positive finite values and
    // rejects zero, negative, and non-finite ones.
    //
    // Given
    // -----
    // - Tolerances 1e-8, 0.0, -1.0, and NaN.
    //
    // Expect
    // ------
    // - Only 1e-8 validates.
    fn verify_tol_accepts_only_positive_finite_values() {
        let make = |tol, reason| OptError::InvalidTolGrad { tol, reason };
        assert!(verify_tol(1e-8, make).is_ok());
        assert!(verify_tol(0.0, make).is_err());
        assert!(verify_tol(-1.0, make).is_err());
        assert!(verify_tol(f64::NAN, make).is_err());
    }

    #[test]
    // Purpose
    // -------
    // Verify gradient validation flags both dimension mismatches and
    // non-finite entries.
    //
    // Given
    // -----
    // - A length-2 gradient validated against dim 3, and a gradient with
    //   a NaN entry validated against its own length.
    //
    // Expect
    // ------
    // - `GradientDimMismatch` and `InvalidGradient` respectively.
    fn validate_grad_flags_dimension_and_finiteness() {
        let short = array![1.0, 2.0];
        assert!(matches!(
            validate_grad(&short, 3),
            Err(OptError::GradientDimMismatch { expected: 3, found: 2 })
        ));

        let with_nan = array![1.0, f64::NAN];
        assert!(matches!(
            validate_grad(&with_nan, 2),
            Err(OptError::InvalidGradient { index: 1, .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Verify start-point validation rejects infinities.
    //
    // Given
    // -----
    // - A start point containing `+inf`.
    //
    // Expect
    // ------
    // - `Err(OptError::InvalidStartPoint { index: 1, .. })`.
    fn validate_start_rejects_non_finite_entries() {
        let x0 = array![0.0, f64::INFINITY];
        assert!(matches!(
            validate_start(&x0),
            Err(OptError::InvalidStartPoint { index: 1, .. })
        ));
    }
}
