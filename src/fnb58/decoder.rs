//! # FNB58 Packet Decoder
//!
//! Classifies incoming frames and extracts the four calibrated samples of a
//! telemetry frame.
//!
//! The device multiplexes control acknowledgements and telemetry on the same
//! IN endpoint, so anything that is not a telemetry frame is classified as
//! [`Packet::NotTelemetry`] rather than reported as an error.

use super::crc::crc8;
use super::protocol::*;

/// Classification of one received frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    /// Telemetry frame with its samples in acquisition order
    Telemetry([Sample; SAMPLES_PER_FRAME]),

    /// Handshake acknowledgement, unknown type or wrong length
    NotTelemetry,
}

impl Packet {
    /// Samples carried by the frame (empty for non-telemetry frames)
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        match self {
            Packet::Telemetry(samples) => samples,
            Packet::NotTelemetry => &[],
        }
    }

    /// Returns true for telemetry frames
    #[must_use]
    pub fn is_telemetry(&self) -> bool {
        matches!(self, Packet::Telemetry(_))
    }
}

/// Check the header of a frame without decoding it
#[must_use]
pub fn is_telemetry(frame: &[u8]) -> bool {
    frame.len() == FRAME_SIZE
        && frame[0] == SYNC_BYTE
        && frame[PACKET_TYPE_OFFSET] == PACKET_TYPE_TELEMETRY
}

/// Decode a frame into calibrated samples
///
/// Total over any input: frames with the wrong length, sync byte or packet
/// type are classified as [`Packet::NotTelemetry`].
///
/// # Arguments
///
/// * `frame` - Bytes of one interrupt IN transfer
///
/// # Examples
///
/// ```
/// use magbank_monitor::fnb58::decoder::{decode_frame, Packet};
///
/// let ack = [0xAAu8; 64];
/// assert_eq!(decode_frame(&ack), Packet::NotTelemetry);
/// ```
#[must_use]
pub fn decode_frame(frame: &[u8]) -> Packet {
    match decode_raw_samples(frame) {
        Some(raw) => Packet::Telemetry(raw.map(|sample| sample.calibrate())),
        None => Packet::NotTelemetry,
    }
}

/// Extract the raw (unscaled) records of a telemetry frame
///
/// # Returns
///
/// * `Option<[RawSample; 4]>` - Records in order, or `None` if not telemetry
#[must_use]
pub fn decode_raw_samples(frame: &[u8]) -> Option<[RawSample; SAMPLES_PER_FRAME]> {
    if !is_telemetry(frame) {
        return None;
    }

    Some(std::array::from_fn(|index| {
        let start = FIRST_SAMPLE_OFFSET + index * SAMPLE_SIZE;
        decode_record(&frame[start..start + SAMPLE_SIZE])
    }))
}

/// Verify the CRC-8 trailer of a frame
///
/// Not part of classification; the drain loop only consults it when checksum
/// verification is enabled.
#[must_use]
pub fn verify_checksum(frame: &[u8]) -> bool {
    frame.len() == FRAME_SIZE && frame[CHECKSUM_OFFSET] == crc8(&frame[1..CHECKSUM_OFFSET])
}

/// Decode one 15-byte record; the reserved byte is never looked at
fn decode_record(record: &[u8]) -> RawSample {
    RawSample {
        voltage: read_u32_le(record, VOLTAGE_OFFSET),
        current: read_u32_le(record, CURRENT_OFFSET),
        dp: read_u16_le(record, DP_OFFSET),
        dm: read_u16_le(record, DM_OFFSET),
        temperature: read_u16_le(record, TEMPERATURE_OFFSET),
    }
}

fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fnb58::encoder::{encode_telemetry_frame, INIT_1_FRAME, INIT_2_FRAME};

    fn raw(voltage: u32, current: u32, dp: u16, dm: u16, temperature: u16) -> RawSample {
        RawSample {
            voltage,
            current,
            dp,
            dm,
            temperature,
        }
    }

    #[test]
    fn test_decode_known_fixture() {
        let frame = encode_telemetry_frame(&[raw(500_000, 200_000, 600, 0, 250); 4]);

        let packet = decode_frame(&frame);
        assert!(packet.is_telemetry());
        assert_eq!(packet.samples().len(), 4);

        let sample = packet.samples()[0];
        assert!((sample.voltage_v - 5.0).abs() < 1e-9);
        assert!((sample.current_a - 2.0).abs() < 1e-9);
        assert!((sample.dp_v - 0.600).abs() < 1e-9);
        assert!((sample.temp_c - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_windows_are_independent() {
        let records = [
            raw(100_000, 10_000, 1, 2, 100),
            raw(200_000, 20_000, 3, 4, 200),
            raw(300_000, 30_000, 5, 6, 300),
            raw(400_000, 40_000, 7, 8, 400),
        ];
        let frame = encode_telemetry_frame(&records);

        let decoded = decode_raw_samples(&frame).expect("telemetry frame");
        assert_eq!(decoded, records);

        let packet = decode_frame(&frame);
        let volts: Vec<f64> = packet.samples().iter().map(|s| s.voltage_v).collect();
        assert_eq!(volts, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_decode_hand_built_offsets() {
        // Fourth record at offset 47, built byte by byte
        let mut frame = [0u8; 64];
        frame[0] = 0xAA;
        frame[1] = 0x04;
        frame[47..51].copy_from_slice(&912_345u32.to_le_bytes());
        frame[51..55].copy_from_slice(&123_456u32.to_le_bytes());
        frame[55..57].copy_from_slice(&2_700u16.to_le_bytes());
        frame[57..59].copy_from_slice(&2_650u16.to_le_bytes());
        frame[60..62].copy_from_slice(&367u16.to_le_bytes());

        let samples = decode_raw_samples(&frame).expect("telemetry frame");
        assert_eq!(samples[3], raw(912_345, 123_456, 2_700, 2_650, 367));
        assert_eq!(samples[0], RawSample::default());
    }

    #[test]
    fn test_reserved_byte_ignored() {
        let mut frame = encode_telemetry_frame(&[raw(500_000, 100_000, 0, 0, 300); 4]);
        let before = decode_frame(&frame);

        for index in 0..4 {
            frame[2 + index * 15 + 12] = 0xFF;
        }

        assert_eq!(decode_frame(&frame), before);
    }

    #[test]
    fn test_wrong_sync_not_telemetry() {
        let mut frame = encode_telemetry_frame(&[RawSample::default(); 4]);
        frame[0] = 0x55;
        assert_eq!(decode_frame(&frame), Packet::NotTelemetry);
        assert!(decode_frame(&frame).samples().is_empty());
    }

    #[test]
    fn test_other_packet_types_not_telemetry() {
        for packet_type in (0u8..=255).filter(|&t| t != 0x04) {
            let mut frame = [0u8; 64];
            frame[0] = 0xAA;
            frame[1] = packet_type;
            assert_eq!(
                decode_frame(&frame),
                Packet::NotTelemetry,
                "Type 0x{:02X} should be ignored",
                packet_type
            );
        }
    }

    #[test]
    fn test_handshake_frames_not_telemetry() {
        assert!(!decode_frame(&INIT_1_FRAME).is_telemetry());
        assert!(!decode_frame(&INIT_2_FRAME).is_telemetry());
    }

    #[test]
    fn test_wrong_length_not_telemetry() {
        let frame = encode_telemetry_frame(&[RawSample::default(); 4]);
        assert_eq!(decode_frame(&frame[..63]), Packet::NotTelemetry);
        assert_eq!(decode_frame(&[]), Packet::NotTelemetry);

        let mut long = frame.to_vec();
        long.push(0);
        assert_eq!(decode_frame(&long), Packet::NotTelemetry);
    }

    #[test]
    fn test_verify_checksum() {
        let mut frame = encode_telemetry_frame(&[raw(500_000, 100_000, 10, 20, 300); 4]);
        assert!(verify_checksum(&frame));
        assert!(verify_checksum(&INIT_1_FRAME));

        frame[20] ^= 0x01;
        assert!(!verify_checksum(&frame));
        assert!(!verify_checksum(&frame[..10]));
    }
}
