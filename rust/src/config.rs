//! Configuration types for the carbon scheduler.

use pyo3::prelude::*;

/// Default slot cadence of the time grid, in minutes.
pub const DEFAULT_SLOT_MINUTES: i64 = 15;

/// Intensity (gCO2/kWh) substituted for slots with no usable carbon data.
pub const DEFAULT_PENALTY_INTENSITY: f64 = 9999.0;

/// What to do when a task instance has no feasible start slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfeasiblePolicy {
    /// Abort the whole request.
    Fail,
    /// Leave the instance out and report it in the result.
    Skip,
}

impl InfeasiblePolicy {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "fail" => Some(Self::Fail),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

/// Configuration for grid construction, costing and failure handling.
#[pyclass]
#[derive(Clone, Debug)]
pub struct SchedulingConfig {
    /// Width of one grid slot in minutes
    #[pyo3(get, set)]
    pub slot_minutes: i64,
    /// Intensity used when a slot's carbon value is undefined
    #[pyo3(get, set)]
    pub penalty_intensity: f64,
    /// Infeasible-instance handling: "fail" or "skip"
    #[pyo3(get, set)]
    pub infeasible_policy: String,
    /// Logging verbosity (0-3), see `crate::logging`
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            penalty_intensity: DEFAULT_PENALTY_INTENSITY,
            infeasible_policy: "fail".to_string(),
            verbosity: 0,
        }
    }
}

impl SchedulingConfig {
    /// Check the configuration and return the parsed infeasible policy.
    pub fn validate(&self) -> Result<InfeasiblePolicy, String> {
        if self.slot_minutes <= 0 {
            return Err(format!(
                "slot_minutes must be positive, got {}",
                self.slot_minutes
            ));
        }
        if !self.penalty_intensity.is_finite() || self.penalty_intensity < 0.0 {
            return Err(format!(
                "penalty_intensity must be a non-negative number, got {}",
                self.penalty_intensity
            ));
        }
        InfeasiblePolicy::parse(&self.infeasible_policy).ok_or_else(|| {
            format!(
                "Unknown infeasible_policy: {:?} (expected \"fail\" or \"skip\")",
                self.infeasible_policy
            )
        })
    }
}

#[pymethods]
impl SchedulingConfig {
    #[new]
    #[pyo3(signature = (
        slot_minutes=None,
        penalty_intensity=None,
        infeasible_policy=None,
        verbosity=None
    ))]
    fn new(
        slot_minutes: Option<i64>,
        penalty_intensity: Option<f64>,
        infeasible_policy: Option<String>,
        verbosity: Option<u8>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            slot_minutes: slot_minutes.unwrap_or(defaults.slot_minutes),
            penalty_intensity: penalty_intensity.unwrap_or(defaults.penalty_intensity),
            infeasible_policy: infeasible_policy.unwrap_or(defaults.infeasible_policy),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SchedulingConfig(slot_minutes={}, penalty_intensity={}, infeasible_policy={:?})",
            self.slot_minutes, self.penalty_intensity, self.infeasible_policy
        )
    }
}
