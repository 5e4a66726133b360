//! Point-in-time copy of a [`Session`](super::Session) for display and logging.

use chrono::{DateTime, Local};
use serde::Serialize;

use super::charger::ChargeProtocol;
use super::integrator::Reading;
use super::stats::StatsSummary;

/// Everything a consumer may show about the current session
///
/// Built in one go from the session, so the displayed sample, the
/// accumulators and the statistics always agree with each other.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// Latest sample, `None` until the first telemetry frame
    pub reading: Option<Reading>,
    pub energy_wh: f64,
    pub capacity_mah: f64,
    pub protocol: Option<ChargeProtocol>,
    pub voltage_stats: Option<StatsSummary>,
    pub current_stats: Option<StatsSummary>,
    /// Samples integrated since the session started
    pub samples: u64,
    pub session_started: DateTime<Local>,
    pub session_seconds: f64,
}
