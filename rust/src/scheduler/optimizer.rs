//! Start-slot selection minimizing carbon cost.
//!
//! The optimizer takes every instance of a request in a single call so that
//! constraints linking instances (for example a per-slot capacity ceiling)
//! can be added without changing its interface. No such constraint exists
//! today: each instance is minimized independently with a sliding-window sum
//! over its per-slot cost series, which bounds the search by
//! `instances x grid length`.

use rustc_hash::FxHashMap;

use crate::expansion::TaskInstance;
use crate::grid::TimeGrid;
use crate::{log_changes, log_debug};

use super::core::SchedulerError;
use super::cost::CostModel;
use super::window::CandidateWindow;

/// Chosen start slot for one instance.
///
/// Invariant: `window.start_min <= start <= window.start_max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub start: usize,
    /// Cost at `start`
    pub cost: u64,
    /// Cost at the earliest candidate start
    pub baseline_cost: u64,
}

/// Minimum-cost start over `window` for a run of `duration` slots.
///
/// Ties resolve to the earliest start. Returns `None` if the window does not
/// fit inside `series`.
fn sliding_window_minimum(
    series: &[u64],
    duration: usize,
    window: CandidateWindow,
) -> Option<Assignment> {
    if duration == 0 || window.start_min > window.start_max {
        return None;
    }
    let end = window.start_max.checked_add(duration)?;
    if end > series.len() {
        return None;
    }

    // Accumulate in u128 so the running sum stays exact even for saturated slot costs
    let mut cost: u128 = series[window.start_min..window.start_min + duration]
        .iter()
        .map(|&c| u128::from(c))
        .sum();
    let baseline = cost;
    let mut best_start = window.start_min;
    let mut best_cost = cost;

    for start in window.start_min + 1..=window.start_max {
        cost = cost - u128::from(series[start - 1]) + u128::from(series[start + duration - 1]);
        if cost < best_cost {
            best_cost = cost;
            best_start = start;
        }
    }

    Some(Assignment {
        start: best_start,
        cost: u64::try_from(best_cost).unwrap_or(u64::MAX),
        baseline_cost: u64::try_from(baseline).unwrap_or(u64::MAX),
    })
}

/// Batch optimizer over all (instance, candidate window) pairs of a request.
pub struct Optimizer<'a> {
    grid: &'a TimeGrid,
    cost_model: &'a CostModel,
    verbosity: u8,
}

impl<'a> Optimizer<'a> {
    pub fn new(grid: &'a TimeGrid, cost_model: &'a CostModel, verbosity: u8) -> Self {
        Self {
            grid,
            cost_model,
            verbosity,
        }
    }

    /// Choose a start slot for every candidate.
    ///
    /// Returns one assignment per input pair, in input order.
    pub fn optimize(
        &self,
        candidates: &[(&TaskInstance, CandidateWindow)],
    ) -> Result<Vec<Assignment>, SchedulerError> {
        if candidates.is_empty() {
            return Err(SchedulerError::NoFeasibleSchedule);
        }

        // Instances with equal energy share a cost series
        let mut series_by_weight: FxHashMap<u64, Vec<u64>> = FxHashMap::default();
        let mut assignments = Vec::with_capacity(candidates.len());

        for (instance, window) in candidates {
            let weight = CostModel::weight(instance.energy_per_block);
            let series = series_by_weight.entry(weight).or_insert_with(|| {
                log_debug!(self.verbosity, "  Building cost series for weight {} Wh", weight);
                self.cost_model.slot_costs(weight, self.grid)
            });

            let assignment =
                sliding_window_minimum(series, instance.duration_blocks as usize, *window)
                    .ok_or(SchedulerError::NoFeasibleSchedule)?;

            log_changes!(
                self.verbosity,
                "Assigned {} to slot {} (cost {}, earliest-start cost {})",
                instance.name,
                assignment.start,
                assignment.cost,
                assignment.baseline_cost
            );
            assignments.push(assignment);
        }

        Ok(assignments)
    }
}
