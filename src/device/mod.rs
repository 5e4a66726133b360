//! # Device Module
//!
//! Drives an FNB58 over any [`Transport`].
//!
//! This module handles:
//! - The init-1 / init-2 / init-2 handshake ([`handshake`])
//! - Data-request and buffer-drain polling cycles ([`drain`])
//! - Connection state tracking across cycles ([`Fnb58`])
//!
//! The driver never retries on its own. After a failure it reports the error
//! and its new state; the caller decides when to reconnect.

pub mod drain;
pub mod handshake;

use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{MeterError, Result};
use crate::telemetry::Session;
use crate::transport::Transport;

/// Connection state of the meter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    HandshakeInProgress,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::HandshakeInProgress => f.write_str("handshake in progress"),
            ConnectionState::Connected => f.write_str("connected"),
        }
    }
}

/// Timeouts and limits for handshake and polling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Timeout for every OUT transfer
    pub write_timeout: Duration,
    /// Read timeout after each handshake command
    pub handshake_timeout: Duration,
    /// Timeout of the first read after a data request
    pub first_read_timeout: Duration,
    /// Timeout of the following reads; expiry marks the end of the burst
    pub drain_read_timeout: Duration,
    /// Upper bound on frames read in one cycle
    pub max_frames_per_cycle: usize,
    /// Consecutive `NoData` cycles before the connection is dropped
    pub max_idle_cycles: u32,
    /// Drop telemetry frames whose CRC trailer does not match
    pub verify_checksum: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_millis(1000),
            handshake_timeout: Duration::from_millis(1000),
            first_read_timeout: Duration::from_millis(1000),
            drain_read_timeout: Duration::from_millis(50),
            max_frames_per_cycle: 100,
            max_idle_cycles: 3,
            verify_checksum: false,
        }
    }
}

/// Outcome of one polling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Frames read from the device, of any type
    pub frames_read: usize,
    /// Telemetry frames integrated into the session
    pub telemetry_frames: usize,
    /// Housekeeping frames skipped
    pub ignored_frames: usize,
    /// Telemetry frames dropped for a bad CRC trailer
    pub checksum_failures: usize,
    /// Samples integrated
    pub samples: usize,
    /// The frame cap ended the cycle before the buffer was empty
    pub capped: bool,
}

/// FNB58 driver
///
/// Owns the transport and the connection state. The telemetry [`Session`] is
/// passed in by the caller so it survives reconnects and transport swaps.
///
/// # Examples
///
/// ```
/// use magbank_monitor::device::{ConnectionState, Fnb58, PollSettings};
/// use magbank_monitor::telemetry::Session;
/// use magbank_monitor::transport::SimulatedTransport;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), magbank_monitor::error::MeterError> {
/// let mut meter = Fnb58::new(SimulatedTransport::with_seed(1), PollSettings::default());
/// let mut session = Session::new();
///
/// meter.connect().await?;
/// assert_eq!(meter.state(), ConnectionState::Connected);
///
/// let report = meter.poll(&mut session).await?;
/// assert_eq!(report.samples, 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Fnb58<T: Transport> {
    transport: T,
    state: ConnectionState,
    settings: PollSettings,
    idle_cycles: u32,
}

impl<T: Transport> Fnb58<T> {
    /// Wrap a transport; the driver starts disconnected
    pub fn new(transport: T, settings: PollSettings) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            settings,
            idle_cycles: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    #[must_use]
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Consecutive cycles that ended in `NoData`
    #[must_use]
    pub fn idle_cycles(&self) -> u32 {
        self.idle_cycles
    }

    /// Run the handshake
    ///
    /// # Errors
    ///
    /// Returns `HandshakeFailed` if any transfer of the sequence fails; the
    /// driver is then `Disconnected`.
    pub async fn connect(&mut self) -> Result<()> {
        self.idle_cycles = 0;
        handshake::connect(
            &mut self.transport,
            &mut self.state,
            self.settings.write_timeout,
            self.settings.handshake_timeout,
        )
        .await?;
        Ok(())
    }

    /// Run one polling cycle into `session`
    ///
    /// # Errors
    ///
    /// - `NotConnected`: called before a successful handshake
    /// - `NoData`: the device did not answer; after `max_idle_cycles` of these
    ///   in a row the driver drops to `Disconnected`
    /// - `Transport`: a transfer failed; the driver drops to `Disconnected`
    pub async fn poll(&mut self, session: &mut Session) -> Result<CycleReport> {
        if self.state != ConnectionState::Connected {
            return Err(MeterError::NotConnected);
        }

        match drain::poll_cycle(&mut self.transport, session, &self.settings).await {
            Ok(report) => {
                self.idle_cycles = 0;
                debug!(?report, "Poll cycle complete");
                Ok(report)
            }
            Err(MeterError::NoData) => {
                self.idle_cycles += 1;
                if self.idle_cycles >= self.settings.max_idle_cycles {
                    warn!(
                        "No data for {} consecutive cycles, dropping connection",
                        self.idle_cycles
                    );
                    self.mark_disconnected();
                }
                Err(MeterError::NoData)
            }
            Err(e) => {
                if e.requires_reconnect() {
                    self.mark_disconnected();
                }
                Err(e)
            }
        }
    }

    /// Force the next cycle to re-handshake
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.idle_cycles = 0;
    }

    /// Give the transport back, e.g. to close the USB handle
    pub fn into_transport(self) -> T {
        self.transport
    }
}
