//! Fixed-cadence carbon-intensity grid built from irregular forecast samples.
//!
//! Samples are binned into slots aligned to the earliest sample. A slot with
//! several samples takes their mean; empty slots are filled by linear
//! interpolation between the nearest known slots, and held flat beyond the
//! first and last known values. After `TimeGrid::build` every slot has a
//! finite intensity.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::log_debug;

/// Largest number of slots a grid may span (about 28 years of 15-minute slots).
pub const MAX_GRID_SLOTS: usize = 1_000_000;

/// Errors raised while building or addressing a time grid.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Insufficient carbon intensity data: the forecast is empty or has no usable values")]
    InsufficientData,
    #[error("Timestamp {0} is outside the range covered by the carbon intensity grid")]
    OutOfRange(DateTime<Utc>),
    #[error("Slot length must be positive, got {0} ms")]
    InvalidSlotLength(i64),
    #[error("Forecast spans {slots} slots, more than the maximum of {max}")]
    SpanTooLarge { slots: u64, max: usize },
}

/// Dense carbon-intensity series at a fixed cadence.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeGrid {
    start: DateTime<Utc>,
    slot_millis: i64,
    intensities: Vec<f64>,
}

impl TimeGrid {
    /// Resample `samples` onto a grid of `slot`-wide bins.
    ///
    /// Samples may arrive in any order. Non-finite values are treated as
    /// missing but their timestamps still extend the covered range.
    pub fn build(
        samples: &[(DateTime<Utc>, f64)],
        slot: Duration,
        verbosity: u8,
    ) -> Result<Self, GridError> {
        let slot_millis = slot.num_milliseconds();
        if slot_millis <= 0 {
            return Err(GridError::InvalidSlotLength(slot_millis));
        }

        let Some(start) = samples.iter().map(|(ts, _)| *ts).min() else {
            return Err(GridError::InsufficientData);
        };
        let end = samples.iter().map(|(ts, _)| *ts).max().unwrap_or(start);
        let slots = (end - start)
            .num_milliseconds()
            .checked_div(slot_millis)
            .and_then(|n| u64::try_from(n).ok())
            .and_then(|n| n.checked_add(1))
            .unwrap_or(u64::MAX);
        let len = match usize::try_from(slots) {
            Ok(len) if len <= MAX_GRID_SLOTS => len,
            _ => {
                return Err(GridError::SpanTooLarge {
                    slots,
                    max: MAX_GRID_SLOTS,
                })
            }
        };

        // (sum, count) per slot
        let mut bins: Vec<(f64, u32)> = vec![(0.0, 0); len];
        for (ts, value) in samples {
            if !value.is_finite() {
                continue;
            }
            let idx = ((*ts - start).num_milliseconds() / slot_millis) as usize;
            bins[idx].0 += value;
            bins[idx].1 += 1;
        }

        let known: Vec<usize> = bins
            .iter()
            .enumerate()
            .filter(|(_, (_, count))| *count > 0)
            .map(|(idx, _)| idx)
            .collect();
        let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
            return Err(GridError::InsufficientData);
        };

        let mut intensities: Vec<f64> = bins
            .iter()
            .map(|(sum, count)| {
                if *count > 0 {
                    sum / f64::from(*count)
                } else {
                    f64::NAN
                }
            })
            .collect();

        // Hold the nearest known value outside the known range
        let head = intensities[first];
        let tail = intensities[last];
        intensities[..first].fill(head);
        intensities[last + 1..].fill(tail);

        // Linear interpolation by slot position between known neighbours
        for pair in known.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            let (v_lo, v_hi) = (intensities[lo], intensities[hi]);
            let span = (hi - lo) as f64;
            for idx in lo + 1..hi {
                let frac = (idx - lo) as f64 / span;
                intensities[idx] = v_lo + (v_hi - v_lo) * frac;
            }
        }

        log_debug!(
            verbosity,
            "Grid: {} samples -> {} slots from {} ({} filled)",
            samples.len(),
            len,
            start,
            len - known.len()
        );

        Ok(Self {
            start,
            slot_millis,
            intensities,
        })
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    /// Timestamp of slot 0.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive end of the covered range (end of the last slot).
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::milliseconds(self.slot_millis * self.len() as i64)
    }

    pub fn slot_length(&self) -> Duration {
        Duration::milliseconds(self.slot_millis)
    }

    /// Timestamp at which slot `idx` begins.
    pub fn timestamp(&self, idx: usize) -> Option<DateTime<Utc>> {
        if idx < self.len() {
            Some(self.start + Duration::milliseconds(self.slot_millis * idx as i64))
        } else {
            None
        }
    }

    /// Intensity of slot `idx`, `None` if outside the grid or not finite.
    #[inline]
    pub fn intensity(&self, idx: usize) -> Option<f64> {
        self.intensities.get(idx).copied().filter(|v| v.is_finite())
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Index of the slot whose window `[ts_i, ts_i + slot)` contains `ts`.
    pub fn index(&self, ts: DateTime<Utc>) -> Result<usize, GridError> {
        if ts < self.start {
            return Err(GridError::OutOfRange(ts));
        }
        let idx = ((ts - self.start).num_milliseconds() / self.slot_millis) as usize;
        if idx >= self.len() {
            return Err(GridError::OutOfRange(ts));
        }
        Ok(idx)
    }

    /// First slot whose start timestamp is at or after `ts`.
    ///
    /// May return `len()` or more when `ts` lies beyond the last slot start.
    pub fn first_slot_at_or_after(&self, ts: DateTime<Utc>) -> usize {
        if ts <= self.start {
            return 0;
        }
        let offset = (ts - self.start).num_milliseconds();
        ((offset + self.slot_millis - 1) / self.slot_millis) as usize
    }

    /// Last slot whose start timestamp is at or before `ts`.
    pub fn last_slot_at_or_before(&self, ts: DateTime<Utc>) -> Option<usize> {
        if ts < self.start || self.is_empty() {
            return None;
        }
        let idx = ((ts - self.start).num_milliseconds() / self.slot_millis) as usize;
        Some(idx.min(self.len() - 1))
    }

    /// `(timestamp, intensity)` pairs in slot order.
    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.intensities
            .iter()
            .enumerate()
            .map(move |(idx, v)| {
                let ts = self.start + Duration::milliseconds(self.slot_millis * idx as i64);
                (ts, *v)
            })
    }
}
