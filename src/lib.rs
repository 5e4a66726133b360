//! # Magbank Monitor Library
//!
//! Live power telemetry from an FNIRSI FNB58 USB meter.
//!
//! This library provides the protocol engine for the meter's vendor HID
//! interface (handshake, data requests, frame decoding) and the telemetry
//! pipeline on top of it: energy and charge integration, temperature
//! smoothing, running statistics and charging-protocol classification.

pub mod config;
pub mod device;
pub mod error;
pub mod fnb58;
pub mod telemetry;
pub mod transport;
