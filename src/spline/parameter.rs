//! Spline inner-parameter value object.
//!
//! Purpose
//! -------
//! Represent one scalar inner unknown of the hierarchical problem: the
//! spline height attached to one breakpoint of one group's monotone
//! observable transformation. Parameters are validated at construction and
//! then owned by a [`SplineProblem`](crate::spline::problem::SplineProblem);
//! only the `value` field ever changes afterwards, rewritten after each
//! successful inner solve.
//!
//! Invariants & assumptions
//! ------------------------
//! - `index` is the 1-based rank of the parameter inside its group; within
//!   a group, ranks are contiguous and order the breakpoints.
//! - `observation_mask` holds one boolean matrix per experimental
//!   condition, shaped like that condition's measurement table; all
//!   parameters of a group share one mask.
//! - `value` stores the cumulative spline height (not the increment) in
//!   linear space.
use crate::spline::errors::{SplineError, SplineResult};
use ndarray::Array2;
use std::str::FromStr;

/// Scale on which a parameter value is reported.
///
/// Parsing:
/// This enum implements `FromStr` and accepts case-insensitive names
/// (`"lin"`, `"log"`, `"log10"`). Unknown names return
/// [`SplineError::InvalidScale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterScale {
    Lin,
    Log,
    Log10,
}

impl FromStr for ParameterScale {
    type Err = SplineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lin" => Ok(ParameterScale::Lin),
            "log" => Ok(ParameterScale::Log),
            "log10" => Ok(ParameterScale::Log10),
            _ => Err(SplineError::InvalidScale {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'lin', 'log' or 'log10'.",
            }),
        }
    }
}

impl std::fmt::Display for ParameterScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterScale::Lin => write!(f, "lin"),
            ParameterScale::Log => write!(f, "log"),
            ParameterScale::Log10 => write!(f, "log10"),
        }
    }
}

/// One scalar inner unknown of the spline transformation.
///
/// Fields are immutable after construction except `value`, which carries
/// the warm-start state between calculator invocations.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineParameter {
    /// Unique id within the problem.
    pub id: String,
    /// Group key; parameters of one group are solved jointly.
    pub group: usize,
    /// 1-based rank within the group, ordering the breakpoints.
    pub index: usize,
    /// Reporting scale; spline estimation operates in linear space.
    pub scale: ParameterScale,
    /// Lower bound of the reported value.
    pub lower_bound: f64,
    /// Upper bound of the reported value.
    pub upper_bound: f64,
    /// One boolean matrix per condition selecting this group's
    /// observations.
    pub observation_mask: Vec<Array2<bool>>,
    /// Current cumulative spline height, updated after each successful
    /// inner solve. Starts at zero, which marks the warm start as unset.
    pub value: f64,
}

impl SplineParameter {
    /// Create a validated spline parameter.
    ///
    /// Validates:
    /// - `id` is non-empty
    /// - `index >= 1`
    /// - bounds are not NaN and `lower_bound <= upper_bound`
    /// - the mask covers at least one condition
    ///
    /// The initial `value` is zero.
    ///
    /// # Errors
    /// - [`SplineError::EmptyParameterId`]
    /// - [`SplineError::InvalidIndex`]
    /// - [`SplineError::InvalidParameterBounds`]
    /// - [`SplineError::EmptyMask`]
    pub fn new(
        id: impl Into<String>, group: usize, index: usize, scale: ParameterScale, lower_bound: f64,
        upper_bound: f64, observation_mask: Vec<Array2<bool>>,
    ) -> SplineResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(SplineError::EmptyParameterId);
        }
        if index == 0 {
            return Err(SplineError::InvalidIndex { id, index });
        }
        if lower_bound.is_nan() || upper_bound.is_nan() || lower_bound > upper_bound {
            return Err(SplineError::InvalidParameterBounds {
                id,
                lower: lower_bound,
                upper: upper_bound,
            });
        }
        if observation_mask.is_empty() {
            return Err(SplineError::EmptyMask { id });
        }
        Ok(SplineParameter {
            id,
            group,
            index,
            scale,
            lower_bound,
            upper_bound,
            observation_mask,
            value: 0.0,
        })
    }
}
