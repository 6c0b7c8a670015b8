//! Carbon-aware scheduler: one request from forecast and task specs to schedule.

use chrono::{DateTime, Duration, Utc};
use rustc_hash::FxHashSet;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::{InfeasiblePolicy, SchedulingConfig};
use crate::expansion::{expand_tasks, TaskInstance};
use crate::grid::{GridError, TimeGrid};
use crate::models::{ScheduleResult, TaskSpec};
use crate::{log_changes, log_checks};

use super::assembly::{assemble_schedule, summarize};
use super::cost::CostModel;
use super::optimizer::{Assignment, Optimizer};
use super::window::{resolve_window, CandidateWindow};

/// Errors that can occur during scheduling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Insufficient carbon intensity data: the forecast is empty or has no usable values")]
    InsufficientData,
    #[error("No valid time slots for task '{task}' in the given window")]
    NoFeasibleWindow { task: String },
    #[error("No feasible schedule found")]
    NoFeasibleSchedule,
    #[error("Invalid task '{task}': {reason}")]
    InvalidTask { task: String, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Timestamp {0} is outside the carbon intensity grid")]
    OutOfRange(DateTime<Utc>),
    #[error("Forecast spans {slots} slots, more than the maximum of {max}")]
    ForecastTooLong { slots: u64, max: usize },
}

impl From<GridError> for SchedulerError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::InsufficientData => SchedulerError::InsufficientData,
            GridError::OutOfRange(ts) => SchedulerError::OutOfRange(ts),
            GridError::InvalidSlotLength(ms) => {
                SchedulerError::InvalidConfig(format!("slot length must be positive, got {} ms", ms))
            }
            GridError::SpanTooLarge { slots, max } => SchedulerError::ForecastTooLong { slots, max },
        }
    }
}

/// Scheduler holding validated configuration; stateless across requests.
#[derive(Clone, Debug)]
pub struct CarbonScheduler {
    config: SchedulingConfig,
    policy: InfeasiblePolicy,
    cost_model: CostModel,
}

impl Default for CarbonScheduler {
    fn default() -> Self {
        Self {
            config: SchedulingConfig::default(),
            policy: InfeasiblePolicy::Fail,
            cost_model: CostModel::default(),
        }
    }
}

impl CarbonScheduler {
    /// Create a scheduler, validating the configuration upfront.
    pub fn new(config: SchedulingConfig) -> Result<Self, SchedulerError> {
        let policy = config.validate().map_err(SchedulerError::InvalidConfig)?;
        let cost_model = CostModel::new(config.penalty_intensity);
        Ok(Self {
            config,
            policy,
            cost_model,
        })
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    fn slot_length(&self) -> Duration {
        Duration::minutes(self.config.slot_minutes)
    }

    /// Build the dense time grid for a raw forecast.
    pub fn build_grid(&self, forecast: &[(DateTime<Utc>, f64)]) -> Result<TimeGrid, SchedulerError> {
        Ok(TimeGrid::build(
            forecast,
            self.slot_length(),
            self.config.verbosity,
        )?)
    }

    /// Run one scheduling request.
    ///
    /// The grid is built before any task is looked at, so an unusable forecast
    /// always surfaces as `InsufficientData`.
    pub fn schedule(
        &self,
        tasks: &[TaskSpec],
        forecast: &[(DateTime<Utc>, f64)],
    ) -> Result<ScheduleResult, SchedulerError> {
        let verbosity = self.config.verbosity;

        // Phase 1: grid
        let grid = self.build_grid(forecast)?;

        // Phase 2: expansion
        let instances = expand_tasks(tasks)?;
        log_checks!(
            verbosity,
            "Expanded {} task specs into {} instances",
            tasks.len(),
            instances.len()
        );
        self.warn_duplicate_names(&instances);

        // Phase 3: candidate windows
        let mut candidates: Vec<(&TaskInstance, CandidateWindow)> =
            Vec::with_capacity(instances.len());
        let mut skipped: Vec<String> = Vec::new();

        for instance in &instances {
            match resolve_window(instance, &grid) {
                Ok(window) => {
                    log_checks!(
                        verbosity,
                        "  {}: candidate starts [{}, {}]",
                        instance.name,
                        window.start_min,
                        window.start_max
                    );
                    candidates.push((instance, window));
                }
                Err(SchedulerError::NoFeasibleWindow { task })
                    if self.policy == InfeasiblePolicy::Skip =>
                {
                    log_changes!(verbosity, "Skipping {}: no feasible start slot", task);
                    skipped.push(task);
                }
                Err(e) => return Err(e),
            }
        }

        // Phase 4: optimization
        let optimizer = Optimizer::new(&grid, &self.cost_model, verbosity);
        let assignments = optimizer.optimize(&candidates)?;
        if assignments.len() != candidates.len() {
            return Err(SchedulerError::NoFeasibleSchedule);
        }
        for ((_, window), assignment) in candidates.iter().zip(&assignments) {
            if !window.contains(assignment.start) {
                return Err(SchedulerError::NoFeasibleSchedule);
            }
        }

        // Phase 5: assembly
        let placed: Vec<(&TaskInstance, Assignment)> = candidates
            .iter()
            .map(|(instance, _)| *instance)
            .zip(assignments)
            .collect();
        let entries = assemble_schedule(&placed, &grid)?;
        let summaries = placed
            .iter()
            .map(|(instance, assignment)| summarize(instance, assignment, &grid))
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = ScheduleResult {
            entries,
            instances: summaries,
            skipped,
            algorithm_metadata: HashMap::new(),
        };
        result.algorithm_metadata = self.metadata(&grid, &result);

        log_changes!(
            verbosity,
            "Scheduled {} instances ({} skipped): {:.3} gCO2, {:.3} gCO2 saved",
            result.instances.len(),
            result.skipped.len(),
            result.total_emissions_g(),
            result.carbon_saved_g()
        );

        Ok(result)
    }

    fn warn_duplicate_names(&self, instances: &[TaskInstance]) {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for instance in instances {
            if !seen.insert(instance.name.as_str()) {
                log_changes!(
                    self.config.verbosity,
                    "Warning: duplicate task name {:?}; instances are scheduled separately",
                    instance.name
                );
            }
        }
    }

    fn metadata(&self, grid: &TimeGrid, result: &ScheduleResult) -> HashMap<String, String> {
        let baseline_g: f64 = result
            .instances
            .iter()
            .map(|i| i.baseline_emissions_g())
            .sum();

        let mut metadata = HashMap::new();
        metadata.insert("algorithm".to_string(), "sliding_window_min".to_string());
        metadata.insert(
            "slot_minutes".to_string(),
            self.config.slot_minutes.to_string(),
        );
        metadata.insert("grid_slots".to_string(), grid.len().to_string());
        metadata.insert("grid_start".to_string(), grid.start().to_rfc3339());
        metadata.insert(
            "instances".to_string(),
            result.instances.len().to_string(),
        );
        metadata.insert("skipped".to_string(), result.skipped.len().to_string());
        metadata.insert(
            "total_emissions_g".to_string(),
            format!("{:.3}", result.total_emissions_g()),
        );
        metadata.insert("baseline_emissions_g".to_string(), format!("{:.3}", baseline_g));
        metadata
    }
}

/// Schedule `tasks` against `forecast` with the given configuration.
pub fn schedule_tasks(
    tasks: &[TaskSpec],
    forecast: &[(DateTime<Utc>, f64)],
    config: SchedulingConfig,
) -> Result<ScheduleResult, SchedulerError> {
    CarbonScheduler::new(config)?.schedule(tasks, forecast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 8, 0, 0, 0).unwrap()
    }

    fn slot(i: i64) -> NaiveDateTime {
        (t0() + Duration::minutes(15 * i)).naive_utc()
    }

    fn forecast(values: &[f64]) -> Vec<(DateTime<Utc>, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (t0() + Duration::minutes(15 * i as i64), *v))
            .collect()
    }

    fn task(name: &str, duration: u32, start_slot: i64, end_slot: i64) -> TaskSpec {
        TaskSpec::absolute(name, duration, 1.0, slot(start_slot), slot(end_slot))
    }

    #[test]
    fn test_flat_series_picks_first_start() {
        let result = CarbonScheduler::default()
            .schedule(&[task("flat", 4, 0, 8)], &forecast(&[100.0; 8]))
            .unwrap();

        assert_eq!(result.instances[0].start_slot, 0);
        assert_eq!(result.entries.len(), 4);
        assert_eq!(result.entries[0].timestamp, t0());
    }

    #[test]
    fn test_low_carbon_valley_is_chosen() {
        let values = [10.0, 10.0, 10.0, 1.0, 1.0, 10.0, 10.0, 10.0];
        let result = CarbonScheduler::default()
            .schedule(&[task("valley", 2, 0, 8)], &forecast(&values))
            .unwrap();

        assert_eq!(result.instances[0].start_slot, 3);
        let stamps: Vec<_> = result.entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![slot(3).and_utc(), slot(4).and_utc()]);
        assert!(result.carbon_saved_g() > 0.0);
    }

    #[test]
    fn test_window_equal_to_duration() {
        let values = [1.0, 50.0, 50.0, 1.0, 1.0];
        let result = CarbonScheduler::default()
            .schedule(&[task("fixed", 2, 1, 3)], &forecast(&values))
            .unwrap();
        assert_eq!(result.instances[0].start_slot, 1);
        assert_eq!(result.instances[0].cost, result.instances[0].baseline_cost);
    }

    #[test]
    fn test_short_window_names_task() {
        let err = CarbonScheduler::default()
            .schedule(
                &[task("ok", 1, 0, 8), task("too short", 4, 0, 3)],
                &forecast(&[100.0; 8]),
            )
            .unwrap_err();
        assert_eq!(
            err,
            SchedulerError::NoFeasibleWindow {
                task: "too short".to_string()
            }
        );
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_empty_forecast_fails_before_tasks() {
        // The task is invalid too, but the forecast is checked first
        let bad = TaskSpec::absolute("bad", 0, 1.0, slot(0), slot(1));
        let err = CarbonScheduler::default().schedule(&[bad], &[]).unwrap_err();
        assert_eq!(err, SchedulerError::InsufficientData);
    }

    #[test]
    fn test_skip_policy_reports_infeasible_instances() {
        let config = SchedulingConfig {
            infeasible_policy: "skip".to_string(),
            ..SchedulingConfig::default()
        };
        let result = CarbonScheduler::new(config)
            .unwrap()
            .schedule(
                &[task("ok", 1, 0, 8), task("too short", 4, 0, 3)],
                &forecast(&[100.0; 8]),
            )
            .unwrap();

        assert_eq!(result.skipped, vec!["too short".to_string()]);
        assert_eq!(result.instances.len(), 1);
        assert_eq!(result.algorithm_metadata.get("skipped"), Some(&"1".to_string()));
    }

    #[test]
    fn test_skip_policy_with_nothing_feasible_fails() {
        let config = SchedulingConfig {
            infeasible_policy: "skip".to_string(),
            ..SchedulingConfig::default()
        };
        let err = CarbonScheduler::new(config)
            .unwrap()
            .schedule(&[task("too short", 4, 0, 3)], &forecast(&[100.0; 8]))
            .unwrap_err();
        assert_eq!(err, SchedulerError::NoFeasibleSchedule);
    }

    #[test]
    fn test_repeated_task_across_days() {
        // Two days of hourly data: cheap at 03:00 on day one, 05:00 on day two
        let mut samples = Vec::new();
        for hour in 0..48i64 {
            let value = match hour {
                3 => 20.0,
                29 => 15.0,
                _ => 200.0,
            };
            samples.push((t0() + Duration::hours(hour), value));
        }
        let spec = TaskSpec::daily(
            "EV",
            1,
            5.0,
            NaiveDate::from_ymd_opt(2025, 4, 8).unwrap(),
            NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        )
        .with_repeat_days(2);

        let result = CarbonScheduler::default().schedule(&[spec], &samples).unwrap();

        assert_eq!(result.instances.len(), 2);
        assert_eq!(result.instances[0].task, "EV (Day 1)");
        assert_eq!(result.instances[0].start, t0() + Duration::hours(3));
        assert_eq!(result.instances[1].task, "EV (Day 2)");
        assert_eq!(result.instances[1].start, t0() + Duration::hours(29));
    }

    #[test]
    fn test_schedule_is_deterministic() {
        let values = [30.0, 20.0, 20.0, 40.0, 10.0, 10.0, 50.0, 20.0];
        let tasks = vec![task("a", 2, 0, 8), task("b", 3, 1, 8), task("a", 1, 0, 4)];
        let scheduler = CarbonScheduler::default();

        let first = scheduler.schedule(&tasks, &forecast(&values)).unwrap();
        let second = scheduler.schedule(&tasks, &forecast(&values)).unwrap();

        assert_eq!(first.entries, second.entries);
        assert_eq!(first.instances, second.instances);
    }

    #[test]
    fn test_entries_follow_instance_order() {
        let values = [1.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 1.0];
        let tasks = vec![task("late", 1, 4, 8), task("early", 1, 0, 4)];
        let result = CarbonScheduler::default()
            .schedule(&tasks, &forecast(&values))
            .unwrap();

        assert_eq!(result.entries[0].task, "late");
        assert_eq!(result.entries[0].timestamp, slot(7).and_utc());
        assert_eq!(result.entries[1].task, "early");
        assert_eq!(result.entries[1].timestamp, slot(0).and_utc());
    }

    #[test]
    fn test_metadata() {
        let result = CarbonScheduler::default()
            .schedule(&[task("a", 1, 0, 4)], &forecast(&[100.0; 4]))
            .unwrap();
        let meta = &result.algorithm_metadata;
        assert_eq!(meta.get("algorithm"), Some(&"sliding_window_min".to_string()));
        assert_eq!(meta.get("grid_slots"), Some(&"4".to_string()));
        assert_eq!(meta.get("instances"), Some(&"1".to_string()));
        // 1000 Wh * 100 g/kWh = 100 g
        assert_eq!(meta.get("total_emissions_g"), Some(&"100.000".to_string()));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SchedulingConfig {
            slot_minutes: -5,
            ..SchedulingConfig::default()
        };
        assert!(matches!(
            CarbonScheduler::new(config),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_grid_error_conversion() {
        let ts = t0();
        assert_eq!(
            SchedulerError::from(GridError::OutOfRange(ts)),
            SchedulerError::OutOfRange(ts)
        );
        assert_eq!(
            SchedulerError::from(GridError::InsufficientData),
            SchedulerError::InsufficientData
        );
        assert_eq!(
            SchedulerError::from(GridError::SpanTooLarge { slots: 7, max: 5 }),
            SchedulerError::ForecastTooLong { slots: 7, max: 5 }
        );
    }

    #[test]
    fn test_schedule_tasks_helper() {
        let result = schedule_tasks(
            &[task("a", 2, 0, 4)],
            &forecast(&[5.0, 1.0, 1.0, 5.0]),
            SchedulingConfig::default(),
        )
        .unwrap();
        assert_eq!(result.instances[0].start_slot, 1);
    }
}
