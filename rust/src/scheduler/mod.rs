//! Carbon-aware scheduling pipeline.
//!
//! Each request flows through window resolution, costing, optimization and
//! assembly against a single time grid built from the request's forecast.

mod assembly;
mod core;
mod cost;
mod optimizer;
mod window;

pub use assembly::{assemble_schedule, summarize};
pub use core::{schedule_tasks, CarbonScheduler, SchedulerError};
pub use cost::CostModel;
pub use optimizer::{Assignment, Optimizer};
pub use window::{resolve_window, CandidateWindow};
