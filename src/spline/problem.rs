//! Spline inner problem: parameter arena, groups, and mask extraction.
//!
//! Purpose
//! -------
//! Aggregate validated [`SplineParameter`]s into groups (one group per
//! distinct measurement/observable relationship) and own each group's
//! measurement snapshot together with the per-call simulation and noise
//! snapshots the inner solver refreshes on every calculator invocation.
//!
//! Key behaviors
//! -------------
//! - Store parameters in a dense arena sorted by `(group, index)` with an
//!   id-to-slot map and per-group ranges, so group access is slicing, not
//!   string-keyed lookup.
//! - Validate the group structure at construction: contiguous 1-based
//!   ranks, one shared observation mask per group, and a group size that
//!   matches `ceil(spline_ratio * datapoints)`.
//! - Extract measurement vectors from per-condition tables through boolean
//!   masks ([`extract_masked`]), in row-major observation order.
//!
//! Invariants & assumptions
//! ------------------------
//! - Structure is immutable after construction; only parameter `value`
//!   fields and the per-group `current_simulation` / `noise_parameters`
//!   snapshots change between calls.
//! - Group keys are reported in ascending order, matching the arena
//!   layout; per-group fit vectors elsewhere in the crate are aligned with
//!   that order.
//!
//! Conventions
//! -----------
//! - `N` (`n_spline_pars`) is the number of spline parameters of a group;
//!   `K` (`n_datapoints`) the number of masked observations.
use crate::spline::{
    errors::{SplineError, SplineResult},
    parameter::SplineParameter,
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::ops::Range;

/// One group's data snapshot.
///
/// `measurements`, `mask`, the dimensions, and the measurement extrema are
/// fixed at problem build time; `current_simulation` and
/// `noise_parameters` are overwritten by the inner solver on every
/// calculator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupData {
    /// Group key.
    pub group: usize,
    /// Ordered measurement vector `z`.
    pub measurements: Array1<f64>,
    /// Shared observation mask, one boolean matrix per condition.
    pub mask: Vec<Array2<bool>>,
    /// Number of spline parameters `N`.
    pub n_spline_pars: usize,
    /// Number of masked observations `K`.
    pub n_datapoints: usize,
    /// Smallest measurement of the group.
    pub min_datapoint: f64,
    /// Largest measurement of the group.
    pub max_datapoint: f64,
    /// Simulation snapshot `y`, refreshed every call.
    pub current_simulation: Array1<f64>,
    /// Noise snapshot `sigma`, refreshed every call.
    pub noise_parameters: Array1<f64>,
}

/// Arena of spline parameters partitioned into groups.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineProblem {
    parameters: Vec<SplineParameter>,
    slot_by_id: HashMap<String, usize>,
    group_ranges: Vec<(usize, Range<usize>)>,
    groups: Vec<GroupData>,
    spline_ratio: f64,
}

impl SplineProblem {
    /// Build a problem from parameters, per-condition measurement tables,
    /// and the spline ratio fixing `N = ceil(spline_ratio * K)` per group.
    ///
    /// Parameters are re-sorted by `(group, index)`; the caller's order is
    /// irrelevant.
    ///
    /// # Errors
    /// - [`SplineError::InvalidSplineRatio`] for a non-finite or
    ///   non-positive ratio.
    /// - [`SplineError::EmptyProblem`] / [`SplineError::DuplicateParameterId`]
    ///   for malformed parameter sets.
    /// - [`SplineError::NonContiguousIndices`] /
    ///   [`SplineError::InconsistentMask`] /
    ///   [`SplineError::ParameterCountMismatch`] /
    ///   [`SplineError::NoObservations`] for malformed groups.
    /// - Shape errors from [`extract_masked`].
    pub fn new(
        mut parameters: Vec<SplineParameter>, data: &[Array2<f64>], spline_ratio: f64,
    ) -> SplineResult<Self> {
        if !spline_ratio.is_finite() || spline_ratio <= 0.0 {
            return Err(SplineError::InvalidSplineRatio {
                value: spline_ratio,
                reason: "Spline ratio must be finite and positive.",
            });
        }
        if parameters.is_empty() {
            return Err(SplineError::EmptyProblem);
        }
        parameters.sort_by(|a, b| (a.group, a.index).cmp(&(b.group, b.index)));

        let mut slot_by_id = HashMap::with_capacity(parameters.len());
        for (slot, parameter) in parameters.iter().enumerate() {
            if slot_by_id.insert(parameter.id.clone(), slot).is_some() {
                return Err(SplineError::DuplicateParameterId { id: parameter.id.clone() });
            }
        }

        let mut group_ranges: Vec<(usize, Range<usize>)> = Vec::new();
        let mut start = 0usize;
        for end in 1..=parameters.len() {
            if end == parameters.len() || parameters[end].group != parameters[start].group {
                group_ranges.push((parameters[start].group, start..end));
                start = end;
            }
        }

        let mut groups = Vec::with_capacity(group_ranges.len());
        for (group, range) in &group_ranges {
            let members = &parameters[range.clone()];
            let n_spline_pars = members.len();
            for (offset, member) in members.iter().enumerate() {
                if member.index != offset + 1 {
                    return Err(SplineError::NonContiguousIndices {
                        group: *group,
                        expected: n_spline_pars,
                        found: member.index,
                    });
                }
            }
            let mask = &members[0].observation_mask;
            for member in members.iter().skip(1) {
                if member.observation_mask != *mask {
                    return Err(SplineError::InconsistentMask { group: *group });
                }
            }
            let measurements = extract_masked(data, mask)?;
            let n_datapoints = measurements.len();
            if n_datapoints == 0 {
                return Err(SplineError::NoObservations { group: *group });
            }
            for (index, &value) in measurements.iter().enumerate() {
                if !value.is_finite() {
                    return Err(SplineError::NonFiniteMeasurement { group: *group, index, value });
                }
            }
            let expected = (spline_ratio * n_datapoints as f64).ceil() as usize;
            if expected != n_spline_pars {
                return Err(SplineError::ParameterCountMismatch {
                    group: *group,
                    expected,
                    found: n_spline_pars,
                });
            }
            let min_datapoint = measurements.iter().fold(f64::INFINITY, |acc, &v| acc.min(v));
            let max_datapoint =
                measurements.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
            groups.push(GroupData {
                group: *group,
                mask: mask.clone(),
                measurements,
                n_spline_pars,
                n_datapoints,
                min_datapoint,
                max_datapoint,
                current_simulation: Array1::zeros(n_datapoints),
                noise_parameters: Array1::ones(n_datapoints),
            });
        }

        Ok(SplineProblem { parameters, slot_by_id, group_ranges, groups, spline_ratio })
    }

    /// Ordered group keys.
    pub fn groups(&self) -> Vec<usize> {
        self.group_ranges.iter().map(|(group, _)| *group).collect()
    }

    /// Number of groups.
    pub fn n_groups(&self) -> usize {
        self.group_ranges.len()
    }

    /// Spline ratio fixed at build time.
    pub fn spline_ratio(&self) -> f64 {
        self.spline_ratio
    }

    /// A group's data snapshot, if the key exists.
    pub fn group_data(&self, group: usize) -> Option<&GroupData> {
        self.group_position(group).map(|pos| &self.groups[pos])
    }

    /// Mutable access to a group's data snapshot.
    pub(crate) fn group_data_mut(&mut self, group: usize) -> Option<&mut GroupData> {
        self.group_position(group).map(move |pos| &mut self.groups[pos])
    }

    /// The group's parameters in rank order; empty for unknown keys.
    pub fn parameters_for_group(&self, group: usize) -> &[SplineParameter] {
        match self.group_position(group) {
            Some(pos) => {
                let range = self.group_ranges[pos].1.clone();
                &self.parameters[range]
            }
            None => &[],
        }
    }

    /// Mutable rank-ordered access to a group's parameters.
    pub(crate) fn parameters_for_group_mut(&mut self, group: usize) -> &mut [SplineParameter] {
        match self.group_position(group) {
            Some(pos) => {
                let range = self.group_ranges[pos].1.clone();
                &mut self.parameters[range]
            }
            None => &mut [],
        }
    }

    /// Bulk accessor for the current parameter values, in arena order.
    pub fn parameter_values(&self) -> Array1<f64> {
        Array1::from_iter(self.parameters.iter().map(|p| p.value))
    }

    /// Current `(id, value)` pairs for diagnostics and plotting.
    pub fn inner_parameter_map(&self) -> Vec<(String, f64)> {
        self.parameters.iter().map(|p| (p.id.clone(), p.value)).collect()
    }

    /// Look up a parameter by id.
    pub fn parameter(&self, id: &str) -> Option<&SplineParameter> {
        self.slot_by_id.get(id).map(|&slot| &self.parameters[slot])
    }

    fn group_position(&self, group: usize) -> Option<usize> {
        self.group_ranges.iter().position(|(key, _)| *key == group)
    }
}

/// Extract masked entries from per-condition tables into one flat vector.
///
/// Entries are taken condition by condition in row-major order, matching
/// the observation order of the group's measurement vector.
///
/// # Errors
/// - [`SplineError::ConditionCountMismatch`] if the table and mask lists
///   differ in length.
/// - [`SplineError::MaskShapeMismatch`] if a condition's shapes disagree.
pub fn extract_masked(
    expdata: &[Array2<f64>], mask: &[Array2<bool>],
) -> SplineResult<Array1<f64>> {
    if expdata.len() != mask.len() {
        return Err(SplineError::ConditionCountMismatch {
            expected: mask.len(),
            found: expdata.len(),
        });
    }
    let mut values = Vec::new();
    for (condition, (table, keep)) in expdata.iter().zip(mask.iter()).enumerate() {
        if table.dim() != keep.dim() {
            return Err(SplineError::MaskShapeMismatch {
                condition,
                expected: keep.dim(),
                found: table.dim(),
            });
        }
        for (&value, &selected) in table.iter().zip(keep.iter()) {
            if selected {
                values.push(value);
            }
        }
    }
    Ok(Array1::from(values))
}
