//! Rust implementation of the Green Grid carbon-aware scheduler.
//!
//! This module shifts flexible energy-consuming tasks into the lowest-carbon
//! slots of a carbon-intensity forecast and exposes the engine to Python.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::{DateTime, NaiveDateTime, Utc};
use pyo3::prelude::*;
use pyo3::types::PyDateTime;

mod config;
pub mod expansion;
pub mod grid;
pub mod logging;
mod models;
pub mod scheduler;

pub use config::{InfeasiblePolicy, SchedulingConfig};
pub use expansion::{expand_task, expand_tasks, TaskInstance};
pub use grid::{GridError, TimeGrid};
pub use models::{FlexWindow, InstanceSummary, ScheduleEntry, ScheduleResult, TaskSpec};
pub use scheduler::{
    schedule_tasks, Assignment, CandidateWindow, CarbonScheduler, CostModel, Optimizer,
    SchedulerError,
};

/// Forecast timestamp as received from Python: aware, or naive meaning UTC.
#[derive(Clone, Copy, Debug)]
enum PyTimestamp {
    Aware(DateTime<Utc>),
    Naive(NaiveDateTime),
}

impl<'py> FromPyObject<'py> for PyTimestamp {
    fn extract_bound(ob: &Bound<'py, PyAny>) -> PyResult<Self> {
        let dt = ob.downcast::<PyDateTime>()?;
        if dt.getattr("tzinfo")?.is_none() {
            return Ok(PyTimestamp::Naive(dt.extract()?));
        }
        // Region zones (zoneinfo, pytz) have no fixed offset; let Python resolve it
        let utc = ob
            .py()
            .import_bound("datetime")?
            .getattr("timezone")?
            .getattr("utc")?;
        Ok(PyTimestamp::Aware(
            dt.call_method1("astimezone", (utc,))?.extract()?,
        ))
    }
}

impl PyTimestamp {
    fn to_utc(self) -> DateTime<Utc> {
        match self {
            PyTimestamp::Aware(ts) => ts,
            PyTimestamp::Naive(ts) => ts.and_utc(),
        }
    }
}

fn forecast_to_utc(forecast: Vec<(PyTimestamp, f64)>) -> Vec<(DateTime<Utc>, f64)> {
    forecast
        .into_iter()
        .map(|(ts, value)| (ts.to_utc(), value))
        .collect()
}

/// Schedule tasks into the lowest-carbon slots of a forecast.
///
/// # Arguments
/// * `tasks` - List of TaskSpec to place
/// * `forecast` - List of (datetime, gCO2/kWh) samples; naive datetimes are UTC
/// * `config` - Scheduling configuration (defaults to 15-minute slots)
///
/// # Returns
/// * ScheduleResult with one entry per occupied block
///
/// # Raises
/// * ValueError on insufficient data, an infeasible task window, or invalid input
#[pyfunction]
#[pyo3(name = "schedule_tasks", signature = (tasks, forecast, config=None))]
fn py_schedule_tasks(
    py: Python<'_>,
    tasks: Vec<TaskSpec>,
    forecast: Vec<(PyTimestamp, f64)>,
    config: Option<SchedulingConfig>,
) -> PyResult<ScheduleResult> {
    let forecast = forecast_to_utc(forecast);
    let config = config.unwrap_or_default();

    // Pure computation, so other Python threads may run meanwhile
    match py.allow_threads(|| schedule_tasks(&tasks, &forecast, config)) {
        Ok(result) => Ok(result),
        Err(e) => Err(pyo3::exceptions::PyValueError::new_err(e.to_string())),
    }
}

/// Resample a raw forecast onto the dense, gap-filled slot grid.
///
/// # Returns
/// * List of (datetime, gCO2/kWh) pairs, one per slot
///
/// # Raises
/// * ValueError if the forecast is empty or slot_minutes is not positive
#[pyfunction]
#[pyo3(signature = (forecast, slot_minutes=15))]
fn build_time_grid(
    forecast: Vec<(PyTimestamp, f64)>,
    slot_minutes: i64,
) -> PyResult<Vec<(DateTime<Utc>, f64)>> {
    let config = SchedulingConfig {
        slot_minutes,
        ..SchedulingConfig::default()
    };
    let grid = CarbonScheduler::new(config)
        .and_then(|scheduler| scheduler.build_grid(&forecast_to_utc(forecast)))
        .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?;
    Ok(grid.points().collect())
}

/// The greengrid.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Request and result types
    m.add_class::<TaskSpec>()?;
    m.add_class::<ScheduleEntry>()?;
    m.add_class::<InstanceSummary>()?;
    m.add_class::<ScheduleResult>()?;

    // Config types
    m.add_class::<SchedulingConfig>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(py_schedule_tasks, m)?)?;
    m.add_function(wrap_pyfunction!(build_time_grid, m)?)?;

    Ok(())
}
