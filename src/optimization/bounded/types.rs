//! bounded::types — shared numeric aliases and the box-constraint carrier.
//!
//! Purpose
//! -------
//! Centralize the core numeric types used by the bound-constrained
//! minimizer. By defining these in one place, the rest of the optimization
//! code can stay agnostic to `ndarray` generics and can more easily evolve
//! if the backend changes.
//!
//! Key behaviors
//! -------------
//! - Define canonical aliases for parameter vectors and gradients
//!   ([`Point`], [`Grad`]).
//! - Provide the validated box-constraint carrier [`Bounds`] with an
//!   elementwise projection used by the solver on every iterate.
//!
//! Invariants & assumptions
//! ------------------------
//! - All minimizer vectors are `ndarray` containers over `f64`.
//! - [`Bounds`] entries are never `NaN` and satisfy `lower[i] <= upper[i]`
//!   elementwise; infinite entries encode one-sided or absent constraints.
//!
//! Conventions
//! -----------
//! - [`Point`] and [`Grad`] are treated conceptually as column vectors with
//!   length equal to the number of free parameters.
//! - Projection clamps elementwise into `[lower, upper]`; it is the only
//!   constraint mechanism this layer knows about.
use crate::optimization::errors::{OptError, OptResult};
use ndarray::Array1;

/// Parameter vector for bound-constrained minimization.
///
/// Alias for `ndarray::Array1<f64>`, used as the canonical parameter type
/// throughout the minimizer.
pub type Point = Array1<f64>;

/// Gradient vector matching the shape of [`Point`].
pub type Grad = Array1<f64>;

/// Validated box constraints `lower[i] <= x[i] <= upper[i]`.
///
/// Entries may be `-inf`/`+inf` to disable a side. Construction rejects
/// `NaN` entries, mismatched lengths, and inverted pairs, so downstream
/// code may clamp without re-checking.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl Bounds {
    /// Create validated two-sided bounds.
    ///
    /// Validates:
    /// - `lower.len() == upper.len()`
    /// - no entry is `NaN`
    /// - `lower[i] <= upper[i]` elementwise
    ///
    /// # Errors
    /// - [`OptError::BoundsDimMismatch`] on length mismatch.
    /// - [`OptError::InvalidBound`] for the first `NaN` entry.
    /// - [`OptError::BoundsInverted`] for the first inverted pair.
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> OptResult<Self> {
        if lower.len() != upper.len() {
            return Err(OptError::BoundsDimMismatch { lower: lower.len(), upper: upper.len() });
        }
        for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if lo.is_nan() {
                return Err(OptError::InvalidBound { index, value: lo });
            }
            if hi.is_nan() {
                return Err(OptError::InvalidBound { index, value: hi });
            }
            if lo > hi {
                return Err(OptError::BoundsInverted { index, lower: lo, upper: hi });
            }
        }
        Ok(Bounds { lower, upper })
    }

    /// Create lower-only bounds; every upper bound is `+inf`.
    ///
    /// # Errors
    /// Returns [`OptError::InvalidBound`] if a lower entry is `NaN`.
    pub fn lower_only(lower: Array1<f64>) -> OptResult<Self> {
        let upper = Array1::from_elem(lower.len(), f64::INFINITY);
        Bounds::new(lower, upper)
    }

    /// Number of constrained coordinates.
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// Whether the bound set is empty (zero-dimensional).
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Lower bound vector.
    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    /// Upper bound vector.
    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    /// Elementwise projection of `x` onto the box.
    ///
    /// The construction invariants (`lower <= upper`, no `NaN` bounds)
    /// guarantee the clamp is well defined for every finite `x[i]`.
    pub fn project(&self, x: &Array1<f64>) -> Array1<f64> {
        let mut projected = x.clone();
        for ((value, &lo), &hi) in projected.iter_mut().zip(self.lower.iter()).zip(self.upper.iter())
        {
            *value = value.clamp(lo, hi);
        }
        projected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Verify that projection clamps below-lower and above-upper entries and
    // leaves interior entries untouched.
    //
    // Given
    // -----
    // - Bounds [0, 1] x [0, 10] and a point (-0.5, 12.0).
    //
    // Expect
    // ------
    // - The projected point is (0.0, 10.0).
    fn project_clamps_into_the_box() {
        // Arrange
        let bounds = Bounds::new(array![0.0, 0.0], array![1.0, 10.0])
            .expect("valid bounds should construct");

        // Act
        let projected = bounds.project(&array![-0.5, 12.0]);

        // Assert
        assert_eq!(projected, array![0.0, 10.0]);
    }

    #[test]
    // Purpose
    // -------
    // Ensure the constructor rejects inverted bound pairs.
    //
    // Given
    // -----
    // - lower = [1.0], upper = [0.0].
    //
    // Expect
    // ------
    // - `Err(OptError::BoundsInverted { index: 0, .. })`.
    fn new_rejects_inverted_pairs() {
        let result = Bounds::new(array![1.0], array![0.0]);
        assert!(matches!(result, Err(OptError::BoundsInverted { index: 0, .. })));
    }

    #[test]
    // Purpose
    // -------
    // Ensure `lower_only` produces a box that never clamps from above.
    //
    // Given
    // -----
    // - Lower bounds [0.0, 0.5] and a large candidate point.
    //
    // Expect
    // ------
    // - Only the entry below its lower bound moves.
    fn lower_only_leaves_upper_side_open() {
        let bounds = Bounds::lower_only(array![0.0, 0.5]).expect("valid lower bounds");
        let projected = bounds.project(&array![-3.0, 1e12]);
        assert_eq!(projected, array![0.0, 1e12]);
    }

    #[test]
    // Purpose
    // -------
    // Ensure `NaN` bound entries are rejected at construction.
    //
    // Given
    // -----
    // - A lower bound containing `NaN`.
    //
    // Expect
    // ------
    // - `Err(OptError::InvalidBound { .. })`.
    fn new_rejects_nan_entries() {
        let result = Bounds::new(array![f64::NAN], array![1.0]);
        assert!(matches!(result, Err(OptError::InvalidBound { index: 0, .. })));
    }
}
