//! Flattening of assignments into per-block schedule rows.

use chrono::Duration;

use crate::expansion::TaskInstance;
use crate::grid::TimeGrid;
use crate::models::{InstanceSummary, ScheduleEntry};

use super::core::SchedulerError;
use super::optimizer::Assignment;

/// Emit one entry per occupied block, grouped by instance in input order.
pub fn assemble_schedule(
    placed: &[(&TaskInstance, Assignment)],
    grid: &TimeGrid,
) -> Result<Vec<ScheduleEntry>, SchedulerError> {
    let total_blocks: usize = placed
        .iter()
        .map(|(instance, _)| instance.duration_blocks as usize)
        .sum();
    let mut entries = Vec::with_capacity(total_blocks);

    for (instance, assignment) in placed {
        for offset in 0..instance.duration_blocks as usize {
            let timestamp = grid
                .timestamp(assignment.start + offset)
                .ok_or(SchedulerError::NoFeasibleSchedule)?;
            entries.push(ScheduleEntry {
                timestamp,
                task: instance.name.clone(),
                energy_kwh: instance.energy_per_block,
            });
        }
    }

    Ok(entries)
}

/// Summary of where `instance` landed and what it costs.
pub fn summarize(
    instance: &TaskInstance,
    assignment: &Assignment,
    grid: &TimeGrid,
) -> Result<InstanceSummary, SchedulerError> {
    let start = grid
        .timestamp(assignment.start)
        .ok_or(SchedulerError::NoFeasibleSchedule)?;
    let run = Duration::milliseconds(
        grid.slot_length().num_milliseconds() * i64::from(instance.duration_blocks),
    );
    Ok(InstanceSummary {
        task: instance.name.clone(),
        start,
        end: start + run,
        start_slot: assignment.start,
        duration_blocks: instance.duration_blocks,
        cost: assignment.cost,
        baseline_cost: assignment.baseline_cost,
    })
}
