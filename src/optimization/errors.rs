//! Error taxonomy for the bound-constrained minimizer layer.

/// Crate-wide result alias for minimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that finite differences should be used.
    GradientNotImplemented,

    /// Gradient dimensions do not match parameter dimensions.
    GradientDimMismatch {
        expected: usize,
        found: usize,
    },

    /// Gradient elements need to be finite.
    InvalidGradient {
        index: usize,
        value: f64,
        reason: &'static str,
    },

    // ---- Options ----
    /// Gradient tolerance needs to be positive and finite.
    InvalidTolGrad {
        tol: f64,
        reason: &'static str,
    },

    /// Step-size tolerance needs to be positive and finite.
    InvalidTolStep {
        tol: f64,
        reason: &'static str,
    },

    /// Objective change tolerance needs to be positive and finite.
    InvalidTolFun {
        tol: f64,
        reason: &'static str,
    },

    /// Maximum iterations needs to be positive.
    InvalidMaxIter {
        max_iter: usize,
        reason: &'static str,
    },

    /// Armijo parameter must lie strictly inside (0, 1).
    InvalidArmijoParam {
        value: f64,
        reason: &'static str,
    },

    // ---- Bounds ----
    /// Lower and upper bound vectors must have equal length.
    BoundsDimMismatch {
        lower: usize,
        upper: usize,
    },

    /// A lower bound exceeds the matching upper bound.
    BoundsInverted {
        index: usize,
        lower: f64,
        upper: f64,
    },

    /// Bound entries must not be NaN.
    InvalidBound {
        index: usize,
        value: f64,
    },

    /// Bounds dimension does not match the start point dimension.
    BoundsStartMismatch {
        bounds: usize,
        start: usize,
    },

    // ---- Objective ----
    /// Start point entries must be finite.
    InvalidStartPoint {
        index: usize,
        value: f64,
    },

    /// Objective returned a non-finite value at a feasible point.
    NonFiniteValue {
        value: f64,
    },
}

impl std::error::Error for OptError {}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Gradient ----
            OptError::GradientNotImplemented => {
                write!(f, "Analytic gradient not implemented")
            }
            OptError::GradientDimMismatch { expected, found } => {
                write!(f, "Gradient dimension mismatch: expected {expected}, found {found}")
            }
            OptError::InvalidGradient { index, value, reason } => {
                write!(f, "Invalid gradient at index {index}: {value}: {reason}")
            }

            // ---- Options ----
            OptError::InvalidTolGrad { tol, reason } => {
                write!(f, "Invalid gradient tolerance {tol}: {reason}")
            }
            OptError::InvalidTolStep { tol, reason } => {
                write!(f, "Invalid step tolerance {tol}: {reason}")
            }
            OptError::InvalidTolFun { tol, reason } => {
                write!(f, "Invalid objective change tolerance {tol}: {reason}")
            }
            OptError::InvalidMaxIter { max_iter, reason } => {
                write!(f, "Invalid maximum iterations {max_iter}: {reason}")
            }
            OptError::InvalidArmijoParam { value, reason } => {
                write!(f, "Invalid Armijo parameter {value}: {reason}")
            }

            // ---- Bounds ----
            OptError::BoundsDimMismatch { lower, upper } => {
                write!(f, "Bounds dimension mismatch: lower has {lower}, upper has {upper}")
            }
            OptError::BoundsInverted { index, lower, upper } => {
                write!(f, "Inverted bounds at index {index}: lower {lower} > upper {upper}")
            }
            OptError::InvalidBound { index, value } => {
                write!(f, "Bound at index {index} is NaN: {value}")
            }
            OptError::BoundsStartMismatch { bounds, start } => {
                write!(f, "Bounds dimension {bounds} does not match start point dimension {start}")
            }

            // ---- Objective ----
            OptError::InvalidStartPoint { index, value } => {
                write!(f, "Start point entry at index {index} is not finite: {value}")
            }
            OptError::NonFiniteValue { value } => {
                write!(f, "Objective returned a non-finite value: {value}")
            }
        }
    }
}
