//! # FNB58 Protocol Constants and Types
//!
//! Every byte offset, scale factor and timing constant of the FNB58 wire
//! protocol lives here, so layout changes are made in one place.
//!
//! ## Frame layout
//!
//! ```text
//! byte 0      sync (0xAA)
//! byte 1      command / packet type
//! bytes 2..62 payload (telemetry: 4 × 15-byte samples starting at 2)
//! byte 63     CRC-8 over bytes 1..=62
//! ```
//!
//! ## Sample layout (15 bytes, little-endian)
//!
//! | Sub-offset | Size | Field | Scale |
//! |------------|------|-------|-------|
//! | 0  | 4 | VBUS voltage | / 100000 V |
//! | 4  | 4 | IBUS current | / 100000 A |
//! | 8  | 2 | D+ voltage   | / 1000 V |
//! | 10 | 2 | D- voltage   | / 1000 V |
//! | 12 | 1 | reserved     | ignored |
//! | 13 | 2 | temperature  | / 10 °C |
//!
//! The D- / reserved assignment at sub-offsets 10 and 12 is provisional until
//! confirmed against more hardware revisions.

use std::time::Duration;

/// FNIRSI USB vendor ID
pub const FNB58_VENDOR_ID: u16 = 0x2E3C;

/// FNB58 USB product ID
pub const FNB58_PRODUCT_ID: u16 = 0x5558;

/// HID interface carrying the measurement stream
pub const FNB58_HID_INTERFACE: u8 = 3;

/// Interrupt OUT endpoint (host → device)
pub const FNB58_ENDPOINT_OUT: u8 = 0x03;

/// Interrupt IN endpoint (device → host)
pub const FNB58_ENDPOINT_IN: u8 = 0x83;

/// Every frame in both directions is exactly one HID report
pub const FRAME_SIZE: usize = 64;

/// One fixed-size frame
pub type Frame = [u8; FRAME_SIZE];

/// Frame sync byte (always 0xAA)
pub const SYNC_BYTE: u8 = 0xAA;

/// First initialization command
pub const CMD_INIT_1: u8 = 0x81;

/// Second initialization command (must be sent twice)
pub const CMD_INIT_2: u8 = 0x82;

/// Data request / keepalive command
pub const CMD_DATA_REQUEST: u8 = 0x83;

/// Packet type tag of telemetry frames
pub const PACKET_TYPE_TELEMETRY: u8 = 0x04;

/// Offset of the packet type byte
pub const PACKET_TYPE_OFFSET: usize = 1;

/// Offset of the CRC-8 trailer
pub const CHECKSUM_OFFSET: usize = FRAME_SIZE - 1;

/// Samples carried by one telemetry frame
pub const SAMPLES_PER_FRAME: usize = 4;

/// Size of one sample record
pub const SAMPLE_SIZE: usize = 15;

/// Offset of the first sample record
pub const FIRST_SAMPLE_OFFSET: usize = 2;

/// Sub-offset of the 4-byte voltage field
pub const VOLTAGE_OFFSET: usize = 0;

/// Sub-offset of the 4-byte current field
pub const CURRENT_OFFSET: usize = 4;

/// Sub-offset of the 2-byte D+ field
pub const DP_OFFSET: usize = 8;

/// Sub-offset of the 2-byte D- field
pub const DM_OFFSET: usize = 10;

/// Sub-offset of the unused byte
pub const RESERVED_OFFSET: usize = 12;

/// Sub-offset of the 2-byte temperature field
pub const TEMPERATURE_OFFSET: usize = 13;

/// Raw counts per volt of VBUS
pub const VOLTAGE_SCALE: f64 = 100_000.0;

/// Raw counts per amp of IBUS
pub const CURRENT_SCALE: f64 = 100_000.0;

/// Raw counts per volt on D+ / D-
pub const DATA_LINE_SCALE: f64 = 1_000.0;

/// Raw counts per °C
pub const TEMPERATURE_SCALE: f64 = 10.0;

/// Hardware acquisition rate
pub const SAMPLE_RATE_HZ: u32 = 100;

/// Duration covered by one sample
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// [`SAMPLE_INTERVAL`] expressed in hours, the integration step
pub const SAMPLE_INTERVAL_HOURS: f64 = 0.010 / 3600.0;

/// Telemetry frames produced per second of streaming
pub const FRAMES_PER_SECOND: u32 = SAMPLE_RATE_HZ / SAMPLES_PER_FRAME as u32;

/// Weight given to the previous temperature estimate
pub const TEMPERATURE_SMOOTHING: f64 = 0.9;

/// Sample record exactly as transmitted, before scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    /// VBUS in 10 µV units
    pub voltage: u32,

    /// IBUS in 10 µA units
    pub current: u32,

    /// D+ in mV
    pub dp: u16,

    /// D- in mV
    pub dm: u16,

    /// Temperature in 0.1 °C
    pub temperature: u16,
}

impl RawSample {
    /// Apply the fixed scale factors.
    #[must_use]
    pub fn calibrate(&self) -> Sample {
        Sample {
            voltage_v: f64::from(self.voltage) / VOLTAGE_SCALE,
            current_a: f64::from(self.current) / CURRENT_SCALE,
            dp_v: f64::from(self.dp) / DATA_LINE_SCALE,
            dm_v: f64::from(self.dm) / DATA_LINE_SCALE,
            temp_c: f64::from(self.temperature) / TEMPERATURE_SCALE,
        }
    }
}

/// One calibrated measurement instant (one 10 ms hardware tick)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    /// Bus voltage in volts
    pub voltage_v: f64,

    /// Bus current in amperes
    pub current_a: f64,

    /// D+ line voltage in volts
    pub dp_v: f64,

    /// D- line voltage in volts
    pub dm_v: f64,

    /// Unsmoothed temperature in °C
    pub temp_c: f64,
}

impl Sample {
    /// Instantaneous power in watts
    #[must_use]
    pub fn power_w(&self) -> f64 {
        self.voltage_v * self.current_a
    }
}
