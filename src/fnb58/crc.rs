//! # FNB58 CRC-8 Implementation
//!
//! Checksum carried in byte 63 of every FNB58 frame.
//!
//! **Polynomial**: 0x39 (x^8 + x^5 + x^4 + x^3 + 1)
//! **Initial Value**: 0x42
//! **Coverage**: bytes 1..=62 (everything except sync and the trailer itself)

use super::protocol::{Frame, CHECKSUM_OFFSET};

/// CRC-8 polynomial
const CRC8_POLY: u8 = 0x39;

/// CRC-8 initial register value
const CRC8_INIT: u8 = 0x42;

/// Precomputed CRC8 lookup table for fast calculation
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Generate CRC8 lookup table at compile time
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate the FNB58 CRC-8 of a byte slice
///
/// `const` so command frames can be built at compile time.
///
/// # Examples
///
/// ```
/// use magbank_monitor::fnb58::crc::crc8;
///
/// let mut body = [0u8; 62];
/// body[0] = 0x81;
/// assert_eq!(crc8(&body), 0x8E);
/// ```
pub const fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;
    let mut i = 0;

    while i < data.len() {
        crc = CRC8_TABLE[(crc ^ data[i]) as usize];
        i += 1;
    }

    crc
}

/// Checksum a full frame (bytes 1..=62)
pub const fn frame_checksum(frame: &Frame) -> u8 {
    let mut crc = CRC8_INIT;
    let mut i = 1;

    while i < CHECKSUM_OFFSET {
        crc = CRC8_TABLE[(crc ^ frame[i]) as usize];
        i += 1;
    }

    crc
}

/// Bitwise reference implementation, used to check the table
#[cfg(test)]
fn crc8_slow(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;

    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}
