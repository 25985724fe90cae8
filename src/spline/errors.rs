//! Error and result types for the hierarchical spline calibration core.
//!
//! Two kinds of failure never appear here by design: a failed simulation
//! and a non-converged inner solve are sentinel results (`+inf` values,
//! `NaN` gradients, logged warnings), not errors, so gradient-based outer
//! optimizers always receive well-formed numeric output.

/// Crate-wide result alias for spline calibration operations.
pub type SplineResult<T> = Result<T, SplineError>;

#[derive(Debug, Clone, PartialEq)]
pub enum SplineError {
    // ---- Configuration ----
    /// Spline ratio must be finite and strictly positive.
    InvalidSplineRatio {
        value: f64,
        reason: &'static str,
    },

    /// Inner optimizer options failed validation at construction.
    InvalidSolverOption {
        detail: String,
    },

    // ---- Parameter construction ----
    /// Parameter ids must be non-empty.
    EmptyParameterId,

    /// Spline parameter ranks are 1-based.
    InvalidIndex {
        id: String,
        index: usize,
    },

    /// A parameter's lower bound exceeds its upper bound, or a bound is NaN.
    InvalidParameterBounds {
        id: String,
        lower: f64,
        upper: f64,
    },

    /// Unknown parameter scale name.
    InvalidScale {
        name: String,
        reason: &'static str,
    },

    /// Observation masks must cover at least one condition.
    EmptyMask {
        id: String,
    },

    // ---- Problem construction ----
    /// At least one spline parameter is required.
    EmptyProblem,

    /// Parameter ids must be unique within a problem.
    DuplicateParameterId {
        id: String,
    },

    /// Ranks within a group must be exactly 1..=N.
    NonContiguousIndices {
        group: usize,
        expected: usize,
        found: usize,
    },

    /// All parameters of a group must share one observation mask.
    InconsistentMask {
        group: usize,
    },

    /// Group size must equal ceil(spline_ratio * datapoints).
    ParameterCountMismatch {
        group: usize,
        expected: usize,
        found: usize,
    },

    /// A group's mask selects no observations.
    NoObservations {
        group: usize,
    },

    /// Measurements must be finite.
    NonFiniteMeasurement {
        group: usize,
        index: usize,
        value: f64,
    },

    // ---- Spline basis ----
    /// At least two breakpoints are required to span a range.
    TooFewSplineParameters {
        found: usize,
    },

    /// An interval assignment lies outside `1..=N`.
    IntervalOutOfRange {
        observation: usize,
        interval: usize,
        n_spline_pars: usize,
    },

    // ---- Data shape ----
    /// Mask and data disagree on the number of conditions.
    ConditionCountMismatch {
        expected: usize,
        found: usize,
    },

    /// Mask and data disagree on a condition's array shape.
    MaskShapeMismatch {
        condition: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Two per-observation vectors disagree in length.
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Noise standard deviations must be finite and strictly positive.
    NonPositiveNoise {
        index: usize,
        value: f64,
    },

    /// A gradient was requested but the engine returned no sensitivities.
    MissingSensitivities {
        condition: usize,
    },

    // ---- Parameter mapping ----
    /// An id was not found in the relevant parameter id table.
    UnknownParameterId {
        id: String,
    },

    /// Outer parameter vector length does not match the id table.
    ParameterDimMismatch {
        expected: usize,
        found: usize,
    },

    // ---- Requests ----
    /// Requested quantities or mode are outside the supported surface.
    UnsupportedRequest {
        reason: &'static str,
    },

    // ---- Sensitivity propagation ----
    /// The KKT sensitivity system could not be solved.
    KktSolveFailed {
        reason: &'static str,
    },
}

impl std::error::Error for SplineError {}

impl std::fmt::Display for SplineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Configuration ----
            SplineError::InvalidSplineRatio { value, reason } => {
                write!(f, "Invalid spline ratio {value}: {reason}")
            }
            SplineError::InvalidSolverOption { detail } => {
                write!(f, "Invalid inner solver option: {detail}")
            }

            // ---- Parameter construction ----
            SplineError::EmptyParameterId => {
                write!(f, "Spline parameter ids must be non-empty")
            }
            SplineError::InvalidIndex { id, index } => {
                write!(f, "Invalid rank {index} for spline parameter '{id}': ranks are 1-based")
            }
            SplineError::InvalidParameterBounds { id, lower, upper } => {
                write!(f, "Invalid bounds [{lower}, {upper}] for spline parameter '{id}'")
            }
            SplineError::InvalidScale { name, reason } => {
                write!(f, "Invalid parameter scale '{name}': {reason}")
            }
            SplineError::EmptyMask { id } => {
                write!(f, "Observation mask for spline parameter '{id}' covers no conditions")
            }

            // ---- Problem construction ----
            SplineError::EmptyProblem => {
                write!(f, "A spline problem requires at least one parameter")
            }
            SplineError::DuplicateParameterId { id } => {
                write!(f, "Duplicate spline parameter id '{id}'")
            }
            SplineError::NonContiguousIndices { group, expected, found } => {
                write!(
                    f,
                    "Group {group} ranks must be exactly 1..={expected}, found rank {found} out of place"
                )
            }
            SplineError::InconsistentMask { group } => {
                write!(f, "Parameters of group {group} do not share one observation mask")
            }
            SplineError::ParameterCountMismatch { group, expected, found } => {
                write!(
                    f,
                    "Group {group} must have {expected} spline parameters for its datapoint count, found {found}"
                )
            }
            SplineError::NoObservations { group } => {
                write!(f, "Group {group} selects no observations")
            }
            SplineError::NonFiniteMeasurement { group, index, value } => {
                write!(
                    f,
                    "Measurement {index} of group {group} must be finite, found {value}"
                )
            }

            // ---- Spline basis ----
            SplineError::TooFewSplineParameters { found } => {
                write!(f, "At least two spline parameters are required, found {found}")
            }
            SplineError::IntervalOutOfRange { observation, interval, n_spline_pars } => {
                write!(
                    f,
                    "Interval {interval} of observation {observation} lies outside 1..={n_spline_pars}"
                )
            }

            // ---- Data shape ----
            SplineError::ConditionCountMismatch { expected, found } => {
                write!(f, "Condition count mismatch: expected {expected}, found {found}")
            }
            SplineError::MaskShapeMismatch { condition, expected, found } => {
                write!(
                    f,
                    "Condition {condition} shape mismatch: mask is {expected:?}, data is {found:?}"
                )
            }
            SplineError::LengthMismatch { what, expected, found } => {
                write!(f, "Length mismatch for {what}: expected {expected}, found {found}")
            }
            SplineError::NonPositiveNoise { index, value } => {
                write!(
                    f,
                    "Noise standard deviation at observation {index} must be finite and positive, found {value}"
                )
            }
            SplineError::MissingSensitivities { condition } => {
                write!(
                    f,
                    "Gradient requested but condition {condition} returned no forward sensitivities"
                )
            }

            // ---- Parameter mapping ----
            SplineError::UnknownParameterId { id } => {
                write!(f, "Parameter id '{id}' not found in the id table")
            }
            SplineError::ParameterDimMismatch { expected, found } => {
                write!(f, "Outer parameter dimension mismatch: expected {expected}, found {found}")
            }

            // ---- Requests ----
            SplineError::UnsupportedRequest { reason } => {
                write!(f, "Unsupported evaluation request: {reason}")
            }

            // ---- Sensitivity propagation ----
            SplineError::KktSolveFailed { reason } => {
                write!(f, "KKT sensitivity solve failed: {reason}")
            }
        }
    }
}
