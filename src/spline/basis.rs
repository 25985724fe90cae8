//! Spline basis construction over the current simulation range.
//!
//! Purpose
//! -------
//! Before each inner optimization the spline bases have to be fixed to
//! some values; they are rescaled to the current simulation of the group.
//! When simulations lie very close together (or collapse into a single
//! point, e.g. a steady state), the bases are placed on a fixed-width
//! synthetic window instead, to avoid numerical problems from the frequent
//! division by `delta_c`.
//!
//! Key behaviors
//! -------------
//! - [`rescale_spline_bases`] builds the breakpoint vector, the spacing
//!   `delta_c`, and the interval assignment of every observation.
//! - [`spline_bases_gradient`] is the directional derivative of the same
//!   construction with respect to one outer parameter; the two share the
//!   degenerate/non-degenerate branch so finite differences of the value
//!   construction reproduce the gradient.
//! - [`spline_mapped_simulations`] maps simulations through a fitted
//!   spline, for diagnostics and plotting.
//! - [`monotonicity_measure`] counts order inversions between measurement
//!   and simulation, a cheap check whether a monotone transformation can
//!   fit at all.
//!
//! Invariants & assumptions
//! ------------------------
//! - Breakpoints are strictly increasing whenever the simulation range is
//!   non-degenerate; in the degenerate branch they are strictly increasing
//!   by construction of the synthetic window.
//! - Interval assignments always lie in `1..=N`; out-of-window
//!   observations are clamped with a warning.
//! - `delta_c` is bounded below by `MIN_SIM_RANGE / (N - 1)`, so the
//!   objective's divisions by `delta_c` are safe.
use crate::spline::errors::{SplineError, SplineResult};
use log::warn;
use ndarray::{Array1, ArrayView1};

/// Smallest simulation range the bases are scaled to directly; anything
/// tighter is remapped to a synthetic window of exactly this width.
pub const MIN_SIM_RANGE: f64 = 1e-3;

/// One group's spline basis for the current simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineBasis {
    /// Spacing between adjacent breakpoints.
    pub delta_c: f64,
    /// Breakpoints `c`, length `N`.
    pub bases: Array1<f64>,
    /// Interval assignment `n[k]` of every observation, entries in
    /// `1..=N`.
    pub intervals: Vec<usize>,
}

impl SplineBasis {
    /// Number of spline parameters `N`.
    pub fn n_spline_pars(&self) -> usize {
        self.bases.len()
    }
}

/// Rescale the spline bases to the current simulation.
///
/// Non-degenerate ranges spread the breakpoints evenly over
/// `[min(sim), max(sim)]`; the observations realizing the extrema are
/// pinned to the first and last interval. Ranges tighter than
/// [`MIN_SIM_RANGE`] use a synthetic window of that width, anchored at
/// zero when the range midpoint is itself small and centered on the
/// midpoint otherwise.
///
/// # Errors
/// - [`SplineError::TooFewSplineParameters`] for `N < 2`.
/// - [`SplineError::LengthMismatch`] for an empty simulation vector.
pub fn rescale_spline_bases(
    sim: &ArrayView1<f64>, n_spline_pars: usize,
) -> SplineResult<SplineBasis> {
    let n = n_spline_pars;
    if n < 2 {
        return Err(SplineError::TooFewSplineParameters { found: n });
    }
    if sim.is_empty() {
        return Err(SplineError::LengthMismatch {
            what: "current simulation",
            expected: 1,
            found: 0,
        });
    }

    let (min_idx, max_idx) = extrema_indices(sim);
    let min_all = sim[min_idx];
    let max_all = sim[max_idx];
    let spacing_slots = (n - 1) as f64;
    let mut intervals = vec![1usize; sim.len()];

    if max_all - min_all < MIN_SIM_RANGE {
        let average = (max_all + min_all) / 2.0;
        let delta_c = MIN_SIM_RANGE / spacing_slots;
        let bases = if average < MIN_SIM_RANGE / 2.0 {
            Array1::linspace(0.0, MIN_SIM_RANGE, n)
        } else {
            Array1::linspace(average - MIN_SIM_RANGE / 2.0, average + MIN_SIM_RANGE / 2.0, n)
        };
        for (observation, &y) in sim.iter().enumerate() {
            intervals[observation] = clamped_interval(y, bases[0], delta_c, n, true);
        }
        Ok(SplineBasis { delta_c, bases, intervals })
    } else {
        let delta_c = (max_all - min_all) / spacing_slots;
        let bases = Array1::linspace(min_all, max_all, n);
        for (observation, &y) in sim.iter().enumerate() {
            intervals[observation] = if observation == max_idx {
                n
            } else if observation == min_idx {
                1
            } else {
                clamped_interval(y, bases[0], delta_c, n, false)
            };
        }
        Ok(SplineBasis { delta_c, bases, intervals })
    }
}

/// Directional derivative of [`rescale_spline_bases`] with respect to one
/// outer parameter, given the simulation sensitivities `sy` for that
/// parameter.
///
/// Returns `(delta_c_dot, bases_dot)`. The branch taken matches the value
/// construction: a linspace endpoint map for non-degenerate ranges, a
/// constant shift of the centered synthetic window, and zero for the
/// zero-anchored window.
///
/// # Errors
/// - [`SplineError::TooFewSplineParameters`] for `N < 2`.
/// - [`SplineError::LengthMismatch`] if `sim` and `sy` differ in length
///   or are empty.
pub fn spline_bases_gradient(
    sim: &ArrayView1<f64>, sy: &ArrayView1<f64>, n_spline_pars: usize,
) -> SplineResult<(f64, Array1<f64>)> {
    let n = n_spline_pars;
    if n < 2 {
        return Err(SplineError::TooFewSplineParameters { found: n });
    }
    if sim.is_empty() {
        return Err(SplineError::LengthMismatch {
            what: "current simulation",
            expected: 1,
            found: 0,
        });
    }
    if sy.len() != sim.len() {
        return Err(SplineError::LengthMismatch {
            what: "simulation sensitivities",
            expected: sim.len(),
            found: sy.len(),
        });
    }

    let (min_idx, max_idx) = extrema_indices(sim);
    if sim[max_idx] - sim[min_idx] < MIN_SIM_RANGE {
        let average = (sim[max_idx] + sim[min_idx]) / 2.0;
        let bases_dot = if average < MIN_SIM_RANGE / 2.0 {
            Array1::zeros(n)
        } else {
            Array1::from_elem(n, (sy[max_idx] + sy[min_idx]) / 2.0)
        };
        Ok((0.0, bases_dot))
    } else {
        let delta_c_dot = (sy[max_idx] - sy[min_idx]) / ((n - 1) as f64);
        Ok((delta_c_dot, Array1::linspace(sy[min_idx], sy[max_idx], n)))
    }
}

/// Cumulative spline heights `xi[i] = s[0] + ... + s[i]`.
pub fn cumulative_heights(s: &ArrayView1<f64>) -> Array1<f64> {
    let mut heights = Array1::zeros(s.len());
    let mut running = 0.0;
    for (slot, &increment) in s.iter().enumerate() {
        running += increment;
        heights[slot] = running;
    }
    heights
}

/// Map model simulations through the fitted spline.
///
/// Observations pinned to the first interval take the first spline
/// height; all others are linearly interpolated between the heights of
/// their interval's breakpoints.
///
/// # Errors
/// - [`SplineError::LengthMismatch`] if `s` does not match the basis or
///   `sim` does not match the interval assignment.
/// - [`SplineError::IntervalOutOfRange`] for a corrupted interval entry.
pub fn spline_mapped_simulations(
    s: &ArrayView1<f64>, sim: &ArrayView1<f64>, basis: &SplineBasis,
) -> SplineResult<Array1<f64>> {
    let n = basis.n_spline_pars();
    if s.len() != n {
        return Err(SplineError::LengthMismatch {
            what: "spline parameters",
            expected: n,
            found: s.len(),
        });
    }
    if sim.len() != basis.intervals.len() {
        return Err(SplineError::LengthMismatch {
            what: "simulation vector",
            expected: basis.intervals.len(),
            found: sim.len(),
        });
    }

    let xi = cumulative_heights(s);
    let mut mapped = Array1::zeros(sim.len());
    for (observation, (&y, &interval)) in sim.iter().zip(basis.intervals.iter()).enumerate() {
        if interval == 0 || interval > n {
            return Err(SplineError::IntervalOutOfRange {
                observation,
                interval,
                n_spline_pars: n,
            });
        }
        let i = interval - 1;
        mapped[observation] = if i == 0 {
            xi[0]
        } else {
            (y - basis.bases[i - 1]) * (xi[i] - xi[i - 1]) / basis.delta_c + xi[i - 1]
        };
    }
    Ok(mapped)
}

/// Monotonicity measure: the number of order inversions of the simulation
/// with respect to the measurement.
///
/// Pairs are ordered by measurement; a pair counts as an inversion when
/// the simulations are strictly decreasing, or when they are tied while
/// the measurements differ. Zero means a monotone transformation can map
/// simulation onto measurement exactly.
///
/// # Errors
/// Returns [`SplineError::LengthMismatch`] if the vectors differ in
/// length.
pub fn monotonicity_measure(
    measurement: &ArrayView1<f64>, simulation: &ArrayView1<f64>,
) -> SplineResult<usize> {
    if measurement.len() != simulation.len() {
        return Err(SplineError::LengthMismatch {
            what: "monotonicity measure input",
            expected: measurement.len(),
            found: simulation.len(),
        });
    }
    let mut pairs: Vec<(f64, f64)> =
        measurement.iter().copied().zip(simulation.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut inversions = 0usize;
    for first in 0..pairs.len() {
        for second in (first + 1)..pairs.len() {
            if pairs[first].1 > pairs[second].1 {
                inversions += 1;
            } else if pairs[first].1 == pairs[second].1 && pairs[first].0 != pairs[second].0 {
                inversions += 1;
            }
        }
    }
    Ok(inversions)
}

/// Indices of the first minimum and first maximum.
fn extrema_indices(values: &ArrayView1<f64>) -> (usize, usize) {
    let mut min_idx = 0usize;
    let mut max_idx = 0usize;
    for (index, &value) in values.iter().enumerate() {
        if value < values[min_idx] {
            min_idx = index;
        }
        if value > values[max_idx] {
            max_idx = index;
        }
    }
    (min_idx, max_idx)
}

/// Ceil-rule interval of one observation, clamped into `1..=N`.
fn clamped_interval(y: f64, first_base: f64, delta_c: f64, n: usize, warn_on_clamp: bool) -> usize {
    let raw = ((y - first_base) / delta_c).ceil() as i64 + 1;
    if raw > n as i64 {
        if warn_on_clamp {
            warn!(
                "Interval for a simulation has been set to a larger value than the number of spline parameters."
            );
        }
        n
    } else if raw < 1 {
        if warn_on_clamp {
            warn!("Interval for a simulation lies below the spline window; clamped to the first interval.");
        }
        1
    } else {
        raw as usize
    }
}
