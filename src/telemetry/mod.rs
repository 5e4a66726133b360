//! # Telemetry Module
//!
//! Turns decoded samples into session telemetry and records it.
//!
//! This module handles:
//! - Integrating power into energy (Wh) and current into charge (mAh)
//! - Smoothing the temperature channel
//! - Tracking min/avg/max of voltage and current
//! - Classifying the charging protocol
//! - Writing snapshots to rotating JSONL files

pub mod charger;
pub mod integrator;
pub mod logger;
pub mod snapshot;
pub mod stats;

pub use integrator::{Reading, Session};
pub use snapshot::TelemetrySnapshot;
