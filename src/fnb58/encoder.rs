//! # FNB58 Frame Encoder
//!
//! Builds host → device command frames and, for the simulator and tests,
//! device → host telemetry frames.

use super::crc::frame_checksum;
use super::protocol::*;

/// First handshake frame: `AA 81 00×61 8E`
pub const INIT_1_FRAME: Frame = command_frame(CMD_INIT_1);

/// Second handshake frame: `AA 82 00×61 96`
pub const INIT_2_FRAME: Frame = command_frame(CMD_INIT_2);

/// Data request / keepalive frame: `AA 83 00×61 9E`
pub const DATA_REQUEST_FRAME: Frame = command_frame(CMD_DATA_REQUEST);

/// Frames sent by the handshake, in order.
///
/// The device only starts streaming after it has seen init-2 twice, so the
/// repeat is part of the sequence.
pub const HANDSHAKE_SEQUENCE: [Frame; 3] = [INIT_1_FRAME, INIT_2_FRAME, INIT_2_FRAME];

/// Build a zero-padded command frame with its CRC trailer
///
/// # Arguments
///
/// * `command` - Command byte placed at offset 1
///
/// # Examples
///
/// ```
/// use magbank_monitor::fnb58::encoder::command_frame;
///
/// let frame = command_frame(0x83);
/// assert_eq!(frame[0], 0xAA);
/// assert_eq!(frame[1], 0x83);
/// assert_eq!(frame[63], 0x9E);
/// ```
pub const fn command_frame(command: u8) -> Frame {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = SYNC_BYTE;
    frame[PACKET_TYPE_OFFSET] = command;
    frame[CHECKSUM_OFFSET] = frame_checksum(&frame);
    frame
}

/// Encode four raw samples into a complete telemetry frame
///
/// The reserved byte of each record is left at zero and the trailer carries a
/// valid checksum.
///
/// # Arguments
///
/// * `samples` - Raw records in acquisition order
///
/// # Returns
///
/// * `Frame` - 64-byte telemetry frame
pub fn encode_telemetry_frame(samples: &[RawSample; SAMPLES_PER_FRAME]) -> Frame {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = SYNC_BYTE;
    frame[PACKET_TYPE_OFFSET] = PACKET_TYPE_TELEMETRY;

    for (index, sample) in samples.iter().enumerate() {
        let start = FIRST_SAMPLE_OFFSET + index * SAMPLE_SIZE;
        encode_sample(sample, &mut frame[start..start + SAMPLE_SIZE]);
    }

    frame[CHECKSUM_OFFSET] = frame_checksum(&frame);
    frame
}

/// Write one raw record into a 15-byte window
fn encode_sample(sample: &RawSample, record: &mut [u8]) {
    record[VOLTAGE_OFFSET..VOLTAGE_OFFSET + 4].copy_from_slice(&sample.voltage.to_le_bytes());
    record[CURRENT_OFFSET..CURRENT_OFFSET + 4].copy_from_slice(&sample.current.to_le_bytes());
    record[DP_OFFSET..DP_OFFSET + 2].copy_from_slice(&sample.dp.to_le_bytes());
    record[DM_OFFSET..DM_OFFSET + 2].copy_from_slice(&sample.dm.to_le_bytes());
    record[TEMPERATURE_OFFSET..TEMPERATURE_OFFSET + 2]
        .copy_from_slice(&sample.temperature.to_le_bytes());
}
