//! Request and result types shared with the Python host.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use pyo3::prelude::*;
use std::collections::HashMap;

/// Flexibility window of a task spec, resolved from its optional fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlexWindow {
    /// Absolute start/end timestamps (UTC).
    Absolute {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Same time-of-day window every day from `start_date`.
    Daily {
        start_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    },
}

/// A flexible task to be placed on the carbon grid.
///
/// The window is either absolute (`flex_start`/`flex_end`) or daily
/// (`start_date`, `flex_start_time`, `flex_end_time`). Naive timestamps are
/// interpreted as UTC.
#[pyclass]
#[derive(Clone, Debug)]
pub struct TaskSpec {
    #[pyo3(get, set)]
    pub name: String,
    /// Number of consecutive 15-minute blocks the task runs for
    #[pyo3(get, set)]
    pub duration_blocks: u32,
    /// Energy drawn per block, kWh
    #[pyo3(get, set)]
    pub energy_per_block: f64,
    #[pyo3(get, set)]
    pub flex_start: Option<NaiveDateTime>,
    #[pyo3(get, set)]
    pub flex_end: Option<NaiveDateTime>,
    #[pyo3(get, set)]
    pub repeat_days: Option<u32>,
    #[pyo3(get, set)]
    pub start_date: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub flex_start_time: Option<NaiveTime>,
    #[pyo3(get, set)]
    pub flex_end_time: Option<NaiveTime>,
}

impl TaskSpec {
    /// Task with an absolute flexibility window.
    pub fn absolute(
        name: &str,
        duration_blocks: u32,
        energy_per_block: f64,
        flex_start: NaiveDateTime,
        flex_end: NaiveDateTime,
    ) -> Self {
        Self {
            name: name.to_string(),
            duration_blocks,
            energy_per_block,
            flex_start: Some(flex_start),
            flex_end: Some(flex_end),
            repeat_days: None,
            start_date: None,
            flex_start_time: None,
            flex_end_time: None,
        }
    }

    /// Task with a time-of-day window starting on `start_date`.
    pub fn daily(
        name: &str,
        duration_blocks: u32,
        energy_per_block: f64,
        start_date: NaiveDate,
        flex_start_time: NaiveTime,
        flex_end_time: NaiveTime,
    ) -> Self {
        Self {
            name: name.to_string(),
            duration_blocks,
            energy_per_block,
            flex_start: None,
            flex_end: None,
            repeat_days: None,
            start_date: Some(start_date),
            flex_start_time: Some(flex_start_time),
            flex_end_time: Some(flex_end_time),
        }
    }

    pub fn with_repeat_days(mut self, repeat_days: u32) -> Self {
        self.repeat_days = Some(repeat_days);
        self
    }

    /// Resolve the window form. Absolute fields win when both forms are set.
    pub fn window(&self) -> Option<FlexWindow> {
        match (self.flex_start, self.flex_end) {
            (Some(start), Some(end)) => Some(FlexWindow::Absolute {
                start: start.and_utc(),
                end: end.and_utc(),
            }),
            _ => match (self.start_date, self.flex_start_time, self.flex_end_time) {
                (Some(start_date), Some(start_time), Some(end_time)) => Some(FlexWindow::Daily {
                    start_date,
                    start_time,
                    end_time,
                }),
                _ => None,
            },
        }
    }
}

#[pymethods]
impl TaskSpec {
    #[new]
    #[pyo3(signature = (
        name,
        duration_blocks,
        energy_per_block,
        flex_start=None,
        flex_end=None,
        repeat_days=None,
        start_date=None,
        flex_start_time=None,
        flex_end_time=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        name: String,
        duration_blocks: u32,
        energy_per_block: f64,
        flex_start: Option<NaiveDateTime>,
        flex_end: Option<NaiveDateTime>,
        repeat_days: Option<u32>,
        start_date: Option<NaiveDate>,
        flex_start_time: Option<NaiveTime>,
        flex_end_time: Option<NaiveTime>,
    ) -> Self {
        Self {
            name,
            duration_blocks,
            energy_per_block,
            flex_start,
            flex_end,
            repeat_days,
            start_date,
            flex_start_time,
            flex_end_time,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "TaskSpec(name={:?}, duration_blocks={}, energy_per_block={}, repeat_days={:?})",
            self.name, self.duration_blocks, self.energy_per_block, self.repeat_days
        )
    }
}

/// One occupied block of the output schedule.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleEntry {
    #[pyo3(get)]
    pub timestamp: DateTime<Utc>,
    #[pyo3(get)]
    pub task: String,
    #[pyo3(get)]
    pub energy_kwh: f64,
}

#[pymethods]
impl ScheduleEntry {
    fn __repr__(&self) -> String {
        format!(
            "ScheduleEntry(timestamp={}, task={:?}, energy_kwh={})",
            self.timestamp.to_rfc3339(),
            self.task,
            self.energy_kwh
        )
    }
}

/// Placement and carbon figures for one task instance.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceSummary {
    #[pyo3(get)]
    pub task: String,
    #[pyo3(get)]
    pub start: DateTime<Utc>,
    /// Exclusive end of the last occupied block
    #[pyo3(get)]
    pub end: DateTime<Utc>,
    #[pyo3(get)]
    pub start_slot: usize,
    #[pyo3(get)]
    pub duration_blocks: u32,
    /// Carbon cost at the chosen start (Wh x gCO2/kWh, i.e. mg CO2)
    #[pyo3(get)]
    pub cost: u64,
    /// Carbon cost had the instance started at its earliest feasible slot
    #[pyo3(get)]
    pub baseline_cost: u64,
}

#[pymethods]
impl InstanceSummary {
    /// Emissions at the chosen start, grams CO2.
    #[getter]
    pub fn emissions_g(&self) -> f64 {
        self.cost as f64 / 1000.0
    }

    /// Emissions at the earliest feasible start, grams CO2.
    #[getter]
    pub fn baseline_emissions_g(&self) -> f64 {
        self.baseline_cost as f64 / 1000.0
    }

    /// Grams CO2 avoided relative to starting as early as possible.
    #[getter]
    pub fn carbon_saved_g(&self) -> f64 {
        self.baseline_emissions_g() - self.emissions_g()
    }

    fn __repr__(&self) -> String {
        format!(
            "InstanceSummary(task={:?}, start={}, start_slot={}, emissions_g={:.3})",
            self.task,
            self.start.to_rfc3339(),
            self.start_slot,
            self.emissions_g()
        )
    }
}

/// Result of one scheduling request.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct ScheduleResult {
    /// One entry per occupied block, grouped by instance in expansion order
    #[pyo3(get)]
    pub entries: Vec<ScheduleEntry>,
    #[pyo3(get)]
    pub instances: Vec<InstanceSummary>,
    /// Instances left out under the "skip" infeasible policy
    #[pyo3(get)]
    pub skipped: Vec<String>,
    /// Converted to a Python dict on access.
    #[pyo3(get)]
    pub algorithm_metadata: HashMap<String, String>,
}

#[pymethods]
impl ScheduleResult {
    #[getter]
    pub fn total_emissions_g(&self) -> f64 {
        self.instances.iter().map(|i| i.emissions_g()).sum()
    }

    #[getter]
    pub fn carbon_saved_g(&self) -> f64 {
        self.instances.iter().map(|i| i.carbon_saved_g()).sum()
    }

    fn __len__(&self) -> usize {
        self.entries.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "ScheduleResult(entries={}, instances={}, skipped={})",
            self.entries.len(),
            self.instances.len(),
            self.skipped.len()
        )
    }
}
