//! # Session Statistics
//!
//! Running minimum / average / maximum of bus voltage and current.

use std::fmt;

use serde::Serialize;

/// Min/avg/max derived from a [`RunningStats`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSummary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

/// Running aggregate of one channel
///
/// Starts at `(+inf, -inf, 0, 0)`; only [`RunningStats::reset`] goes back there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }

    /// Fold one value into the aggregate.
    pub fn update(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    /// Number of values seen
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Average of all values, `None` before the first one
    #[must_use]
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Min/avg/max, `None` when no value has been seen
    ///
    /// A bound still at its infinite sentinel is reported as 0.
    #[must_use]
    pub fn summary(&self) -> Option<StatsSummary> {
        let avg = self.average()?;
        Some(StatsSummary {
            min: finite_or_zero(self.min),
            avg,
            max: finite_or_zero(self.max),
        })
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl fmt::Display for RunningStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.summary() {
            Some(s) => write!(f, "{:.4} / {:.4} / {:.4}", s.min, s.avg, s.max),
            None => f.write_str("-"),
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Statistics aggregate of a session
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Statistics {
    /// Bus voltage in volts
    pub voltage: RunningStats,
    /// Bus current in amperes
    pub current: RunningStats,
}

impl Statistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Update both channels with one measurement.
    pub fn update(&mut self, voltage: f64, current: f64) {
        self.voltage.update(voltage);
        self.current.update(current);
    }

    pub fn reset(&mut self) {
        self.voltage.reset();
        self.current.reset();
    }
}
