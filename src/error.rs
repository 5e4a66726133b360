//! # Error Types
//!
//! Custom error types for Magbank Monitor using `thiserror`.
//!
//! Transport implementations report [`TransportError`]; everything above the
//! transport seam reports [`MeterError`], which records the phase (handshake or
//! steady-state polling) the failure happened in so the caller can decide
//! whether to reconnect.

use std::fmt;

use thiserror::Error;

/// Failure of a single transfer on the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transfer did not complete within its timeout
    #[error("transfer timed out")]
    Timeout,

    /// Any other I/O failure (device gone, pipe stalled, ...)
    #[error("transfer failed: {0}")]
    Io(String),
}

impl TransportError {
    /// Returns true for the benign "nothing arrived in time" outcome.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// Protocol phase an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Init-1 / init-2 / init-2 sequence
    Handshake,
    /// Data-request and drain cycles
    SteadyState,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Handshake => f.write_str("handshake"),
            Phase::SteadyState => f.write_str("steady-state polling"),
        }
    }
}

/// Main error type for Magbank Monitor
#[derive(Debug, Error)]
pub enum MeterError {
    /// No USB device with the configured IDs is attached
    #[error("FNB58 not found (VID 0x{vendor_id:04X}, PID 0x{product_id:04X})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// Opening or claiming the USB device failed
    #[error("USB error: {0}")]
    Usb(String),

    /// A transfer failed while running the init sequence
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] TransportError),

    /// A transfer failed outside the handshake
    #[error("transport error during {phase}: {source}")]
    Transport {
        phase: Phase,
        #[source]
        source: TransportError,
    },

    /// The device did not answer the data request in time
    #[error("no data: device did not answer the data request")]
    NoData,

    /// Polling was attempted before a successful handshake
    #[error("device is not connected")]
    NotConnected,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MeterError {
    /// Protocol phase the error belongs to, if it came from the device link.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        match self {
            MeterError::HandshakeFailed(_) => Some(Phase::Handshake),
            MeterError::Transport { phase, .. } => Some(*phase),
            MeterError::NoData | MeterError::NotConnected => Some(Phase::SteadyState),
            _ => None,
        }
    }

    /// Whether the device handle should be dropped and reopened before the
    /// next attempt.
    #[must_use]
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            MeterError::HandshakeFailed(_)
                | MeterError::Transport { .. }
                | MeterError::DeviceNotFound { .. }
                | MeterError::Usb(_)
        )
    }
}

/// Result type alias for Magbank Monitor
pub type Result<T> = std::result::Result<T, MeterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinguishable() {
        assert!(TransportError::Timeout.is_timeout());
        assert!(!TransportError::Io("pipe".to_string()).is_timeout());
    }

    #[test]
    fn test_handshake_error_phase() {
        let err = MeterError::HandshakeFailed(TransportError::Timeout);
        assert_eq!(err.phase(), Some(Phase::Handshake));
        assert!(err.requires_reconnect());
        assert_eq!(err.to_string(), "handshake failed: transfer timed out");
    }

    #[test]
    fn test_steady_state_error_phase() {
        let err = MeterError::Transport {
            phase: Phase::SteadyState,
            source: TransportError::Io("no device".to_string()),
        };
        assert_eq!(err.phase(), Some(Phase::SteadyState));
        assert!(err.requires_reconnect());
        assert!(err.to_string().contains("steady-state polling"));
        assert!(err.to_string().contains("no device"));
    }

    #[test]
    fn test_no_data_keeps_connection() {
        assert!(!MeterError::NoData.requires_reconnect());
        assert_eq!(MeterError::NoData.phase(), Some(Phase::SteadyState));
    }

    #[test]
    fn test_device_not_found_message() {
        let err = MeterError::DeviceNotFound {
            vendor_id: 0x2E3C,
            product_id: 0x5558,
        };
        assert_eq!(err.to_string(), "FNB58 not found (VID 0x2E3C, PID 0x5558)");
        assert_eq!(err.phase(), None);
    }
}
