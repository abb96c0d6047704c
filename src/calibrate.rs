//! Clock calibration.
//!
//! Zone timestamps are raw cycle counter values. The capture also records a
//! sparse series of `(tick, tsc)` pairs whenever the instrumented program
//! ticked, together with a single `ticks_per_second` rate reported at
//! startup. Those pairs give us a cycles-per-second factor.
//!
//! Only two adjacent samples from the middle of the series are used. Drift
//! over that short interval is assumed to be negligible, and the single
//! factor is then applied to every timestamp in a report.

use serde::Serialize;

use crate::error::ZoneError;

/// One calibration sample: a logical tick and the cycle counter read at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickSample {
    pub tick: i64,
    pub cycles: i64,
}

impl TickSample {
    pub fn new(tick: i64, cycles: i64) -> Self {
        Self { tick, cycles }
    }
}

/// Compute the cycles-per-second conversion factor.
///
/// `samples` must be ordered by tick.
///
/// # Examples
///
/// ```
/// use tmdump::calibrate::{calibrate, TickSample};
///
/// let samples: Vec<TickSample> = [(1, 10), (2, 20), (3, 30), (4, 40), (5, 50)]
///     .into_iter()
///     .map(|(tick, cycles)| TickSample::new(tick, cycles))
///     .collect();
/// assert_eq!(calibrate(&samples, 100.0).unwrap(), 1000.0);
/// ```
pub fn calibrate(samples: &[TickSample], ticks_per_second: f64) -> Result<f64, ZoneError> {
    let mid = samples.len() / 2;
    if mid + 1 >= samples.len() {
        return Err(ZoneError::InsufficientSamples {
            found: samples.len(),
        });
    }
    if !ticks_per_second.is_finite() || ticks_per_second <= 0.0 {
        return Err(ZoneError::degenerate(format!(
            "ticks_per_second must be positive, got {ticks_per_second}"
        )));
    }

    let a = samples[mid];
    let b = samples[mid + 1];

    let dtick = i128::from(b.tick) - i128::from(a.tick);
    let dcycles = i128::from(b.cycles) - i128::from(a.cycles);

    if dtick == 0 {
        return Err(ZoneError::degenerate(format!(
            "zero tick delta between samples {mid} and {}",
            mid + 1
        )));
    }
    if dtick < 0 {
        return Err(ZoneError::degenerate(format!(
            "tick samples are not ordered (tick {} follows {})",
            b.tick, a.tick
        )));
    }

    let cycles_per_tick = dcycles as f64 / dtick as f64;
    let cycles_per_second = cycles_per_tick * ticks_per_second;

    if !cycles_per_second.is_finite() || cycles_per_second <= 0.0 {
        return Err(ZoneError::degenerate(format!(
            "non-positive cycle rate {cycles_per_second} (cycle delta {dcycles} over {dtick} ticks)"
        )));
    }

    Ok(cycles_per_second)
}

/// A cycles-per-second factor applied uniformly across one report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Calibration {
    cycles_per_second: f64,
}

impl Calibration {
    /// Calibrate from samples. See [`calibrate`].
    pub fn from_samples(samples: &[TickSample], ticks_per_second: f64) -> Result<Self, ZoneError> {
        calibrate(samples, ticks_per_second).map(|cycles_per_second| Self { cycles_per_second })
    }

    pub fn cycles_per_second(&self) -> f64 {
        self.cycles_per_second
    }

    /// Convert a cycle counter value to seconds.
    pub fn seconds(&self, cycles: u64) -> f64 {
        cycles as f64 / self.cycles_per_second
    }

    /// Convert a cycle count to milliseconds.
    pub fn millis(&self, cycles: u64) -> f64 {
        cycles as f64 * 1000.0 / self.cycles_per_second
    }
}
