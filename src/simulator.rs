//! simulator — external simulation engine interface and parameter mapping.
//!
//! Purpose
//! -------
//! Define the narrow contract between the calibration core and the
//! dynamical-model simulation engine that produces trajectories and
//! forward sensitivities, plus the many-to-many mapping between outer
//! optimization parameters and per-condition simulation parameters.
//!
//! Key behaviors
//! -------------
//! - [`Simulator`] is a capability trait injected into the calculator at
//!   construction; absence of a backend is a wiring error at startup, not
//!   a runtime probe.
//! - [`ConditionOutput`] carries one condition's status, trajectories,
//!   noise standard deviations, and (when requested) forward
//!   sensitivities.
//! - [`ParameterMapping::fill_in`] resolves the outer parameter vector
//!   into one simulation parameter vector per experimental condition,
//!   honoring fixed numeric overrides.
//!
//! Invariants & assumptions
//! ------------------------
//! - `y` and `sigma` share the shape `(timepoints, observables)` for each
//!   condition; `sy` has shape `(timepoints, simulation parameters,
//!   observables)` and is present whenever first-order sensitivities were
//!   requested and the simulation succeeded.
//! - A failed condition reports [`SimulationStatus::Failure`]; the engine
//!   never signals failure by panicking or by returning malformed arrays.
//! - Mapping entries cover every simulation parameter id of every
//!   condition; unresolvable ids are construction/call errors.
//!
//! Conventions
//! -----------
//! - The engine may parallelize across conditions internally; this
//!   interface is synchronous and ordering of the returned vector matches
//!   the condition ordering of the experimental data.
//! - Engine-level likelihood fields are intentionally absent: the
//!   hierarchical objective recomputes its value from the inner solve.
use crate::spline::errors::{SplineError, SplineResult};
use ndarray::{Array1, Array2, Array3, ArrayView1};

/// Requested sensitivity order for a simulation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensitivityOrder {
    /// Trajectories only.
    Zero,
    /// Trajectories plus forward sensitivities `sy`.
    First,
}

/// Per-condition status reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationStatus {
    /// Integration succeeded; arrays are valid.
    Success,
    /// Integration failed; the calculator converts this to sentinel
    /// results instead of raising.
    Failure,
}

/// One experimental condition's simulation result.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionOutput {
    /// Success/failure sentinel for this condition.
    pub status: SimulationStatus,
    /// Trajectories, shape `(timepoints, observables)`.
    pub y: Array2<f64>,
    /// Noise standard deviations, same shape as `y`.
    pub sigma: Array2<f64>,
    /// Forward sensitivities, shape `(timepoints, simulation parameters,
    /// observables)`; `None` when only order zero was requested or the
    /// condition failed.
    pub sy: Option<Array3<f64>>,
}

/// Capability interface of the external simulation engine.
///
/// One call simulates every experimental condition for the given
/// per-condition parameter vectors (aligned with the caller's simulation
/// parameter id table) and the requested sensitivity order.
pub trait Simulator {
    fn simulate(
        &self, parameters: &[Array1<f64>], order: SensitivityOrder,
    ) -> Vec<ConditionOutput>;
}

/// Source of one simulation parameter's value within a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSource {
    /// Mapped to an outer optimization parameter by id.
    Estimated(String),
    /// Fixed numeric override for this condition.
    Fixed(f64),
}

/// Mapping of simulation parameters for one experimental condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionMap {
    /// Ordered `(simulation parameter id, source)` pairs.
    pub map_sim_var: Vec<(String, ParameterSource)>,
}

/// Many-to-many outer/simulation parameter mapping, one entry per
/// experimental condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMapping {
    pub conditions: Vec<ConditionMap>,
}

impl ParameterMapping {
    /// Resolve the outer vector `x` into one simulation parameter vector
    /// per condition, aligned with `par_sim_ids`.
    ///
    /// Every simulation parameter id must be covered by the condition's
    /// map; estimated entries are looked up in `par_opt_ids`.
    ///
    /// # Errors
    /// - [`SplineError::ParameterDimMismatch`] if `x` and `par_opt_ids`
    ///   disagree in length.
    /// - [`SplineError::UnknownParameterId`] if a mapped id is absent from
    ///   the relevant id table or a simulation parameter is left unmapped.
    pub fn fill_in(
        &self, x: &ArrayView1<f64>, par_opt_ids: &[String], par_sim_ids: &[String],
    ) -> SplineResult<Vec<Array1<f64>>> {
        if x.len() != par_opt_ids.len() {
            return Err(SplineError::ParameterDimMismatch {
                expected: par_opt_ids.len(),
                found: x.len(),
            });
        }
        let mut filled = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            let mut values: Vec<Option<f64>> = vec![None; par_sim_ids.len()];
            for (sim_id, source) in &condition.map_sim_var {
                let sim_idx = index_of(par_sim_ids, sim_id)?;
                values[sim_idx] = Some(match source {
                    ParameterSource::Fixed(value) => *value,
                    ParameterSource::Estimated(opt_id) => {
                        let opt_idx = index_of(par_opt_ids, opt_id)?;
                        x[opt_idx]
                    }
                });
            }
            let mut resolved = Array1::zeros(par_sim_ids.len());
            for (sim_idx, value) in values.into_iter().enumerate() {
                match value {
                    Some(value) => resolved[sim_idx] = value,
                    None => {
                        return Err(SplineError::UnknownParameterId {
                            id: par_sim_ids[sim_idx].clone(),
                        });
                    }
                }
            }
            filled.push(resolved);
        }
        Ok(filled)
    }
}

/// Position of `id` in an id table.
///
/// # Errors
/// Returns [`SplineError::UnknownParameterId`] when absent.
pub(crate) fn index_of(ids: &[String], id: &str) -> SplineResult<usize> {
    ids.iter()
        .position(|candidate| candidate == id)
        .ok_or_else(|| SplineError::UnknownParameterId { id: id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    // Purpose
    // -------
    // Verify that fill_in resolves estimated and fixed sources per
    // condition, including the same outer parameter mapping into several
    // conditions.
    //
    // Given
    // -----
    // - Outer ids [k1, k2] with x = [0.5, 2.0].
    // - Two conditions over sim ids [a, b]; condition 1 maps a->k1, b->k2,
    //   condition 2 maps a->k1, b->fixed 7.0.
    //
    // Expect
    // ------
    // - Condition 1 resolves to [0.5, 2.0], condition 2 to [0.5, 7.0].
    fn fill_in_resolves_estimated_and_fixed_sources() {
        // Arrange
        let mapping = ParameterMapping {
            conditions: vec![
                ConditionMap {
                    map_sim_var: vec![
                        ("a".to_string(), ParameterSource::Estimated("k1".to_string())),
                        ("b".to_string(), ParameterSource::Estimated("k2".to_string())),
                    ],
                },
                ConditionMap {
                    map_sim_var: vec![
                        ("a".to_string(), ParameterSource::Estimated("k1".to_string())),
                        ("b".to_string(), ParameterSource::Fixed(7.0)),
                    ],
                },
            ],
        };
        let x = array![0.5, 2.0];

        // Act
        let filled = mapping
            .fill_in(&x.view(), &ids(&["k1", "k2"]), &ids(&["a", "b"]))
            .expect("mapping should resolve");

        // Assert
        assert_eq!(filled.len(), 2);
        assert_eq!(filled[0], array![0.5, 2.0]);
        assert_eq!(filled[1], array![0.5, 7.0]);
    }

    #[test]
    // Purpose
    // -------
    // Verify that an unmapped simulation parameter is reported as an
    // unknown id rather than silently passed through as NaN.
    //
    // Given
    // -----
    // - A condition map covering only sim id `a` while the table has
    //   [a, b].
    //
    // Expect
    // ------
    // - `Err(SplineError::UnknownParameterId { id: "b" })`.
    fn fill_in_rejects_unmapped_simulation_parameters() {
        let mapping = ParameterMapping {
            conditions: vec![ConditionMap {
                map_sim_var: vec![(
                    "a".to_string(),
                    ParameterSource::Estimated("k1".to_string()),
                )],
            }],
        };
        let x = array![1.0];
        let result = mapping.fill_in(&x.view(), &ids(&["k1"]), &ids(&["a", "b"]));
        assert!(matches!(
            result,
            Err(SplineError::UnknownParameterId { id }) if id == "b"
        ));
    }

    #[test]
    // Purpose
    // -------
    // Verify the outer vector length is checked against the outer id
    // table.
    //
    // Given
    // -----
    // - One outer id but a length-2 vector.
    //
    // Expect
    // ------
    // - `Err(SplineError::ParameterDimMismatch { expected: 1, found: 2 })`.
    fn fill_in_rejects_outer_dimension_mismatch() {
        let mapping = ParameterMapping { conditions: vec![] };
        let x = array![1.0, 2.0];
        let result = mapping.fill_in(&x.view(), &ids(&["k1"]), &ids(&["a"]));
        assert!(matches!(
            result,
            Err(SplineError::ParameterDimMismatch { expected: 1, found: 2 })
        ));
    }
}
