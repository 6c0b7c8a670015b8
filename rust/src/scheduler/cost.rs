//! Integer carbon cost of placing an instance at a start slot.
//!
//! Energy is weighted in whole watt-hours so that cost comparisons are exact
//! integer comparisons. Cost units are Wh x gCO2/kWh, i.e. milligrams CO2.

use crate::config::DEFAULT_PENALTY_INTENSITY;
use crate::expansion::TaskInstance;
use crate::grid::TimeGrid;

#[derive(Clone, Debug, PartialEq)]
pub struct CostModel {
    penalty_intensity: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(DEFAULT_PENALTY_INTENSITY)
    }
}

impl CostModel {
    pub fn new(penalty_intensity: f64) -> Self {
        Self { penalty_intensity }
    }

    pub fn penalty_intensity(&self) -> f64 {
        self.penalty_intensity
    }

    /// Energy per block in whole watt-hours (truncated).
    #[inline]
    pub fn weight(energy_per_block_kwh: f64) -> u64 {
        (energy_per_block_kwh * 1000.0) as u64
    }

    /// Cost of one block at `intensity`.
    ///
    /// Undefined intensities take the penalty value; negative ones count as zero.
    #[inline]
    pub fn slot_cost(&self, weight: u64, intensity: Option<f64>) -> u64 {
        let intensity = intensity
            .filter(|v| v.is_finite())
            .unwrap_or(self.penalty_intensity)
            .max(0.0);
        (weight as f64 * intensity) as u64
    }

    /// Per-slot cost series over the whole grid for one weight.
    pub fn slot_costs(&self, weight: u64, grid: &TimeGrid) -> Vec<u64> {
        (0..grid.len())
            .map(|idx| self.slot_cost(weight, grid.intensity(idx)))
            .collect()
    }

    /// Total cost of running `instance` from slot `start`.
    ///
    /// Slots past the end of the grid are charged at the penalty intensity.
    pub fn cost(&self, instance: &TaskInstance, start: usize, grid: &TimeGrid) -> u64 {
        let weight = Self::weight(instance.energy_per_block);
        (0..instance.duration_blocks as usize)
            .map(|i| {
                let intensity = start.checked_add(i).and_then(|idx| grid.intensity(idx));
                self.slot_cost(weight, intensity)
            })
            .fold(0u64, u64::saturating_add)
    }
}
