//! Mapping of instance flexibility windows onto grid slot ranges.

use chrono::Duration;

use crate::expansion::TaskInstance;
use crate::grid::TimeGrid;

use super::core::SchedulerError;

/// Inclusive range of feasible start slots for one instance.
///
/// Invariant: `start_min <= start_max`, and `start_max + duration <= grid.len()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandidateWindow {
    pub start_min: usize,
    pub start_max: usize,
}

impl CandidateWindow {
    /// Number of candidate starts (always at least one).
    pub fn num_starts(&self) -> usize {
        self.start_max - self.start_min + 1
    }

    #[inline]
    pub fn contains(&self, start: usize) -> bool {
        (self.start_min..=self.start_max).contains(&start)
    }

    pub fn starts(&self) -> std::ops::RangeInclusive<usize> {
        self.start_min..=self.start_max
    }
}

/// Resolve the start slots at which `instance` fits entirely inside both its
/// flexibility window and the grid.
///
/// A start slot must begin at or after the window start, and the run of
/// `duration_blocks` slots must end at or before the window end.
pub fn resolve_window(
    instance: &TaskInstance,
    grid: &TimeGrid,
) -> Result<CandidateWindow, SchedulerError> {
    if grid.is_empty() {
        return Err(SchedulerError::InsufficientData);
    }
    let infeasible = || SchedulerError::NoFeasibleWindow {
        task: instance.name.clone(),
    };

    let duration = instance.duration_blocks as usize;
    if duration == 0 || duration > grid.len() {
        return Err(infeasible());
    }
    if instance.window_end < grid.start() || instance.window_start >= grid.end() {
        return Err(infeasible());
    }

    let start_min = grid.first_slot_at_or_after(instance.window_start);

    let run = Duration::milliseconds(
        grid.slot_length().num_milliseconds() * i64::from(instance.duration_blocks),
    );
    let latest_start = instance
        .window_end
        .checked_sub_signed(run)
        .ok_or_else(infeasible)?;
    let start_max = grid
        .last_slot_at_or_before(latest_start)
        .ok_or_else(infeasible)?
        .min(grid.len() - duration);

    if start_min > start_max {
        return Err(infeasible());
    }

    Ok(CandidateWindow {
        start_min,
        start_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 8, hour, minute, 0).unwrap()
    }

    /// Eight 15-minute slots starting at midnight.
    fn grid() -> TimeGrid {
        let samples: Vec<_> = (0..8)
            .map(|i| (t(0, 0) + Duration::minutes(15 * i), 100.0))
            .collect();
        TimeGrid::build(&samples, Duration::minutes(15), 0).unwrap()
    }

    fn instance(
        duration_blocks: u32,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> TaskInstance {
        TaskInstance {
            name: "task".to_string(),
            duration_blocks,
            energy_per_block: 1.0,
            window_start,
            window_end,
        }
    }

    #[test]
    fn test_full_window() {
        let window = resolve_window(&instance(4, t(0, 0), t(2, 0)), &grid()).unwrap();
        assert_eq!(
            window,
            CandidateWindow {
                start_min: 0,
                start_max: 4
            }
        );
        assert_eq!(window.num_starts(), 5);
    }

    #[test]
    fn test_window_equal_to_duration_has_one_start() {
        let window = resolve_window(&instance(2, t(0, 30), t(1, 0)), &grid()).unwrap();
        assert_eq!(window.start_min, 2);
        assert_eq!(window.start_max, 2);
    }

    #[test]
    fn test_unaligned_window_start_rounds_up() {
        let window = resolve_window(&instance(1, t(0, 20), t(2, 0)), &grid()).unwrap();
        assert_eq!(window.start_min, 2);
    }

    #[test]
    fn test_window_beyond_grid_is_clamped() {
        let window = resolve_window(&instance(3, t(0, 0) - Duration::hours(1), t(6, 0)), &grid())
            .unwrap();
        assert_eq!(window.start_min, 0);
        // 8 slots, duration 3: last full run starts at slot 5
        assert_eq!(window.start_max, 5);
    }

    #[test]
    fn test_window_shorter_than_duration_is_infeasible() {
        let err = resolve_window(&instance(4, t(0, 0), t(0, 45)), &grid()).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::NoFeasibleWindow {
                task: "task".to_string()
            }
        );
    }

    #[test]
    fn test_window_outside_grid_is_infeasible() {
        let after = resolve_window(&instance(1, t(5, 0), t(6, 0)), &grid());
        assert!(matches!(after, Err(SchedulerError::NoFeasibleWindow { .. })));

        let before = resolve_window(
            &instance(1, t(0, 0) - Duration::hours(3), t(0, 0) - Duration::hours(1)),
            &grid(),
        );
        assert!(matches!(before, Err(SchedulerError::NoFeasibleWindow { .. })));
    }

    #[test]
    fn test_duration_longer_than_grid_is_infeasible() {
        let err = resolve_window(&instance(9, t(0, 0), t(6, 0)), &grid()).unwrap_err();
        assert!(matches!(err, SchedulerError::NoFeasibleWindow { .. }));
    }
}
