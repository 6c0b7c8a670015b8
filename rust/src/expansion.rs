//! Expansion of task specs into concrete, independently scheduled instances.

use chrono::{DateTime, Duration, Utc};

use crate::models::{FlexWindow, TaskSpec};
use crate::scheduler::SchedulerError;

/// Largest accepted `repeat_days`.
pub const MAX_REPEAT_DAYS: u32 = 366;

/// One concrete occurrence of a task spec with an absolute window.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskInstance {
    pub name: String,
    pub duration_blocks: u32,
    pub energy_per_block: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

fn invalid(spec: &TaskSpec, reason: &str) -> SchedulerError {
    SchedulerError::InvalidTask {
        task: spec.name.clone(),
        reason: reason.to_string(),
    }
}

/// Window of occurrence `day_offset`, before any grid is consulted.
fn occurrence_window(
    window: FlexWindow,
    day_offset: i64,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let shift = Duration::days(day_offset);
    match window {
        FlexWindow::Absolute { start, end } => Some((
            start.checked_add_signed(shift)?,
            end.checked_add_signed(shift)?,
        )),
        FlexWindow::Daily {
            start_date,
            start_time,
            end_time,
        } => {
            let start = start_date.and_time(start_time).and_utc();
            let mut end = start_date.and_time(end_time).and_utc();
            // A window ending at or before its start time runs past midnight
            if end <= start {
                end = end.checked_add_signed(Duration::days(1))?;
            }
            Some((
                start.checked_add_signed(shift)?,
                end.checked_add_signed(shift)?,
            ))
        }
    }
}

/// Expand one spec into its instances, in day order.
///
/// A repeat count of `R > 1` yields `R` instances named `"<name> (Day k+1)"`,
/// each shifted forward by `k` days. Feasibility against the carbon grid is
/// not checked here.
pub fn expand_task(spec: &TaskSpec) -> Result<Vec<TaskInstance>, SchedulerError> {
    if spec.duration_blocks == 0 {
        return Err(invalid(spec, "duration_blocks must be positive"));
    }
    if !spec.energy_per_block.is_finite() || spec.energy_per_block <= 0.0 {
        return Err(invalid(spec, "energy_per_block must be a positive number"));
    }
    let window = spec.window().ok_or_else(|| {
        invalid(
            spec,
            "flexibility window requires flex_start and flex_end, \
             or start_date, flex_start_time and flex_end_time",
        )
    })?;
    if let FlexWindow::Absolute { start, end } = window {
        if end < start {
            return Err(invalid(spec, "flex_end is before flex_start"));
        }
    }

    let repeat_days = spec.repeat_days.unwrap_or(1).max(1);
    if repeat_days > MAX_REPEAT_DAYS {
        return Err(invalid(
            spec,
            &format!("repeat_days must be at most {}, got {}", MAX_REPEAT_DAYS, repeat_days),
        ));
    }
    let mut instances = Vec::new();

    for day_offset in 0..repeat_days {
        let (window_start, window_end) = occurrence_window(window, i64::from(day_offset))
            .ok_or_else(|| invalid(spec, "flexibility window is out of the representable range"))?;
        let name = if repeat_days > 1 {
            format!("{} (Day {})", spec.name, day_offset + 1)
        } else {
            spec.name.clone()
        };
        instances.push(TaskInstance {
            name,
            duration_blocks: spec.duration_blocks,
            energy_per_block: spec.energy_per_block,
            window_start,
            window_end,
        });
    }

    Ok(instances)
}

/// Expand every spec, preserving input order.
pub fn expand_tasks(specs: &[TaskSpec]) -> Result<Vec<TaskInstance>, SchedulerError> {
    let mut instances = Vec::new();
    for spec in specs {
        instances.extend(expand_task(spec)?);
    }
    Ok(instances)
}
