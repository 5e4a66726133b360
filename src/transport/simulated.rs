//! Simulated FNB58 for running without hardware
//!
//! Behaves like a meter on a ~10 W charger: init commands are acknowledged
//! with a housekeeping frame, and every data request queues the telemetry
//! frames the real device would have buffered since the previous request.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::port_trait::Transport;
use crate::error::TransportError;
use crate::fnb58::encoder::{command_frame, encode_telemetry_frame};
use crate::fnb58::protocol::*;

/// Nominal bus voltage (V)
const NOMINAL_VOLTAGE: f64 = 5.0;

/// Nominal load current (A)
const NOMINAL_CURRENT: f64 = 2.0;

/// Nominal D+/D- level (V)
const NOMINAL_DATA_LINE: f64 = 0.6;

const START_TEMPERATURE: f64 = 30.0;
const MAX_TEMPERATURE: f64 = 45.0;

/// Temperature rise per sample (°C), about 0.6 °C per minute
const TEMPERATURE_STEP: f64 = 0.0001;

/// Frames the simulated device buffers at most (10 s of data)
const MAX_BUFFERED_FRAMES: usize = 250;

/// Frame period of the telemetry stream
const FRAME_PERIOD: Duration = Duration::from_millis(40);

/// In-process stand-in for the meter
#[derive(Debug)]
pub struct SimulatedTransport {
    rng: StdRng,
    buffer: VecDeque<Frame>,
    last_request: Option<Instant>,
    temperature: f64,
}

impl SimulatedTransport {
    /// Create a simulator seeded from the OS
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Create a reproducible simulator
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            buffer: VecDeque::new(),
            last_request: None,
            temperature: START_TEMPERATURE,
        }
    }

    /// Frames waiting to be read
    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    fn queue_telemetry(&mut self) {
        let now = Instant::now();
        let frames = match self.last_request {
            Some(previous) => {
                let elapsed = now.duration_since(previous);
                (elapsed.as_millis() / FRAME_PERIOD.as_millis()) as usize
            }
            None => 1,
        }
        .clamp(1, MAX_BUFFERED_FRAMES);
        self.last_request = Some(now);

        for _ in 0..frames {
            let samples = [
                self.next_sample(),
                self.next_sample(),
                self.next_sample(),
                self.next_sample(),
            ];
            if self.buffer.len() == MAX_BUFFERED_FRAMES {
                self.buffer.pop_front();
            }
            self.buffer.push_back(encode_telemetry_frame(&samples));
        }

        debug!("Simulator queued {} telemetry frames", frames);
    }

    fn next_sample(&mut self) -> RawSample {
        self.temperature = (self.temperature + TEMPERATURE_STEP).min(MAX_TEMPERATURE);

        let voltage = NOMINAL_VOLTAGE + self.rng.random_range(-0.02..0.02);
        let current = NOMINAL_CURRENT + self.rng.random_range(-0.05..0.05);
        let dp = NOMINAL_DATA_LINE + self.rng.random_range(-0.01..0.01);
        let dm = NOMINAL_DATA_LINE + self.rng.random_range(-0.01..0.01);

        RawSample {
            voltage: (voltage * VOLTAGE_SCALE).round() as u32,
            current: (current * CURRENT_SCALE).round() as u32,
            dp: (dp * DATA_LINE_SCALE).round() as u16,
            dm: (dm * DATA_LINE_SCALE).round() as u16,
            temperature: (self.temperature * TEMPERATURE_SCALE).round() as u16,
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn write(&mut self, frame: &Frame, _timeout: Duration) -> Result<(), TransportError> {
        if frame[0] != SYNC_BYTE {
            return Err(TransportError::Io(format!(
                "unexpected sync byte 0x{:02x}",
                frame[0]
            )));
        }

        match frame[PACKET_TYPE_OFFSET] {
            // Acknowledged with a housekeeping frame echoing the command
            command @ (CMD_INIT_1 | CMD_INIT_2) => {
                self.buffer.push_back(command_frame(command));
            }
            CMD_DATA_REQUEST => self.queue_telemetry(),
            other => debug!("Simulator ignoring command 0x{:02x}", other),
        }

        Ok(())
    }

    async fn read(&mut self, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.buffer
            .pop_front()
            .map(|frame| frame.to_vec())
            .ok_or(TransportError::Timeout)
    }
}
