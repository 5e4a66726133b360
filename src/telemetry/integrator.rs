//! # Telemetry Integrator
//!
//! Folds decoded samples into a [`Session`]: accumulated energy and charge,
//! a smoothed temperature, running statistics and the reading to display.
//!
//! ## Integration
//!
//! Each sample covers one fixed 10 ms hardware tick, so the step is constant
//! and independent of how often the host polls:
//!
//! ```text
//! power   = V × I
//! energy += power × Δt            (Wh)
//! charge += I × 1000 × Δt         (mAh)
//! ```
//!
//! Samples must be integrated in acquisition order.
//!
//! ## Temperature smoothing
//!
//! One-pole low-pass: the first sample seeds the filter, then
//! `new = raw × (1 − α) + previous × α` with α = 0.9.

use chrono::{DateTime, Local};
use serde::Serialize;

use super::charger::ChargeProtocol;
use super::snapshot::TelemetrySnapshot;
use super::stats::Statistics;
use crate::fnb58::protocol::{Sample, SAMPLE_INTERVAL_HOURS, TEMPERATURE_SMOOTHING};

/// Exponential moving average used for the temperature channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureFilter {
    alpha: f64,
    value: Option<f64>,
}

impl Default for TemperatureFilter {
    fn default() -> Self {
        Self::new(TEMPERATURE_SMOOTHING)
    }
}

impl TemperatureFilter {
    /// Create an unset filter; `alpha` is the weight kept on history.
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            value: None,
        }
    }

    /// Feed one raw reading and return the smoothed value.
    pub fn update(&mut self, raw: f64) -> f64 {
        let next = match self.value {
            None => raw,
            Some(previous) => raw * (1.0 - self.alpha) + previous * self.alpha,
        };
        self.value = Some(next);
        next
    }

    /// Current estimate, `None` before the first reading
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Values shown for the most recent sample
///
/// Fields belong to the same sample and are always replaced together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub voltage_v: f64,
    pub current_a: f64,
    pub power_w: f64,
    pub dp_v: f64,
    pub dm_v: f64,
    /// Smoothed temperature
    pub temp_c: f64,
}

impl Reading {
    /// Charging protocol guessed from this reading
    #[must_use]
    pub fn protocol(&self) -> ChargeProtocol {
        ChargeProtocol::classify(self.voltage_v, self.dp_v, self.dm_v)
    }
}

/// Accumulated state of one measurement session
///
/// Owned by the polling task; consumers get copies through
/// [`Session::snapshot`].
#[derive(Debug, Clone)]
pub struct Session {
    energy_wh: f64,
    charge_mah: f64,
    temperature: TemperatureFilter,
    started_at: DateTime<Local>,
    stats: Statistics,
    latest: Option<Reading>,
    samples: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Start an empty session now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            energy_wh: 0.0,
            charge_mah: 0.0,
            temperature: TemperatureFilter::default(),
            started_at: Local::now(),
            stats: Statistics::new(),
            latest: None,
            samples: 0,
        }
    }

    /// Integrate one sample and make it the displayed reading.
    ///
    /// # Examples
    ///
    /// ```
    /// use magbank_monitor::fnb58::protocol::Sample;
    /// use magbank_monitor::telemetry::Session;
    ///
    /// let mut session = Session::new();
    /// let sample = Sample { voltage_v: 5.0, current_a: 2.0, dp_v: 0.0, dm_v: 0.0, temp_c: 30.0 };
    ///
    /// // 360 000 samples of 10 ms = one hour at 10 W
    /// for _ in 0..360_000 {
    ///     session.integrate(&sample);
    /// }
    /// assert!((session.energy_wh() - 10.0).abs() < 1e-6);
    /// assert!((session.charge_mah() - 2000.0).abs() < 1e-6);
    /// ```
    pub fn integrate(&mut self, sample: &Sample) -> Reading {
        let power_w = sample.power_w();

        self.energy_wh += power_w * SAMPLE_INTERVAL_HOURS;
        self.charge_mah += sample.current_a * 1000.0 * SAMPLE_INTERVAL_HOURS;
        let temp_c = self.temperature.update(sample.temp_c);

        let reading = Reading {
            voltage_v: sample.voltage_v,
            current_a: sample.current_a,
            power_w,
            dp_v: sample.dp_v,
            dm_v: sample.dm_v,
            temp_c,
        };
        self.latest = Some(reading);
        self.samples += 1;
        reading
    }

    /// Integrate the samples of one telemetry frame in order.
    ///
    /// The frame's last sample also updates the statistics.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of samples integrated
    pub fn ingest_frame(&mut self, samples: &[Sample]) -> usize {
        for sample in samples {
            self.integrate(sample);
        }

        if let Some(last) = samples.last() {
            self.stats.update(last.voltage_v, last.current_a);
        }

        samples.len()
    }

    /// Start a new session.
    ///
    /// Zeroes energy, charge and statistics, clears the temperature filter and
    /// the displayed reading. Connection state lives elsewhere and is untouched.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Accumulated energy in watt-hours
    #[must_use]
    pub fn energy_wh(&self) -> f64 {
        self.energy_wh
    }

    /// Accumulated charge in milliamp-hours
    #[must_use]
    pub fn charge_mah(&self) -> f64 {
        self.charge_mah
    }

    /// Smoothed temperature, `None` before the first sample
    #[must_use]
    pub fn smoothed_temperature(&self) -> Option<f64> {
        self.temperature.value()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    #[must_use]
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Reading of the most recently integrated sample
    #[must_use]
    pub fn latest(&self) -> Option<&Reading> {
        self.latest.as_ref()
    }

    #[must_use]
    pub fn samples_processed(&self) -> u64 {
        self.samples
    }

    /// Protocol guessed from the latest reading
    #[must_use]
    pub fn protocol(&self) -> Option<ChargeProtocol> {
        self.latest.map(|reading| reading.protocol())
    }

    /// Consistent copy of everything a display or logger needs.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let now = Local::now();
        TelemetrySnapshot {
            reading: self.latest,
            energy_wh: self.energy_wh,
            capacity_mah: self.charge_mah,
            protocol: self.protocol(),
            voltage_stats: self.stats.voltage.summary(),
            current_stats: self.stats.current.summary(),
            samples: self.samples,
            session_started: self.started_at,
            session_seconds: (now - self.started_at).num_milliseconds() as f64 / 1000.0,
        }
    }
}
