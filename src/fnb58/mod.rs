//! # FNB58 Protocol Module
//!
//! Implementation of the FNIRSI FNB58 vendor HID protocol.
//!
//! This module handles:
//! - Command frame encoding (init-1, init-2, data-request)
//! - Telemetry frame decoding (4 samples per 64-byte frame)
//! - CRC-8 trailer calculation and verification
//! - The wire layout constants, kept in one table in [`protocol`]

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
