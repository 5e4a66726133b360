//! # Charger Protocol Classification
//!
//! Guesses the charging protocol negotiated on the port from bus voltage and
//! the D+ / D- levels.
//!
//! Checks run in a fixed order and the ranges overlap, so the first match wins:
//!
//! | Order | Condition | Result |
//! |-------|-----------|--------|
//! | 1 | VBUS > 8.0 V | PD / QC high voltage |
//! | 2 | D+ > 2.0 V | Apple divider |
//! | 3 | D+ > 0.6 V and D- > 0.6 V | DCP (shorted data lines) |
//! | 4 | D+ > 0.4 V | QC handshake at 5 V |
//! | 5 | otherwise | Standard 5 V |

use std::fmt;

use serde::{Serialize, Serializer};

/// VBUS above this means a high-voltage contract is active
pub const HIGH_VOLTAGE_THRESHOLD_V: f64 = 8.0;

/// D+ level of Apple-style divider chargers
pub const APPLE_DP_THRESHOLD_V: f64 = 2.0;

/// D+ and D- level of a dedicated charging port
pub const DCP_THRESHOLD_V: f64 = 0.6;

/// D+ level of a Quick Charge handshake
pub const QC_DP_THRESHOLD_V: f64 = 0.4;

/// Charging protocol guessed from the latest reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeProtocol {
    /// USB PD or QC above 8 V
    HighVoltage,
    /// Apple 2.4 A divider on D+
    AppleDivider,
    /// BC1.2 dedicated charging port
    DedicatedChargingPort,
    /// Quick Charge handshake, still at 5 V
    QuickCharge5V,
    /// Plain 5 V
    Standard,
}

impl ChargeProtocol {
    /// Classify from bus voltage and data-line voltages.
    ///
    /// # Examples
    ///
    /// ```
    /// use magbank_monitor::telemetry::charger::ChargeProtocol;
    ///
    /// assert_eq!(ChargeProtocol::classify(9.0, 2.5, 0.0), ChargeProtocol::HighVoltage);
    /// assert_eq!(ChargeProtocol::classify(5.0, 0.0, 0.0), ChargeProtocol::Standard);
    /// ```
    #[must_use]
    pub fn classify(voltage_v: f64, dp_v: f64, dm_v: f64) -> Self {
        if voltage_v > HIGH_VOLTAGE_THRESHOLD_V {
            ChargeProtocol::HighVoltage
        } else if dp_v > APPLE_DP_THRESHOLD_V {
            ChargeProtocol::AppleDivider
        } else if dp_v > DCP_THRESHOLD_V && dm_v > DCP_THRESHOLD_V {
            ChargeProtocol::DedicatedChargingPort
        } else if dp_v > QC_DP_THRESHOLD_V {
            ChargeProtocol::QuickCharge5V
        } else {
            ChargeProtocol::Standard
        }
    }

    /// Human readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ChargeProtocol::HighVoltage => "PD / QC (HV)",
            ChargeProtocol::AppleDivider => "Apple 2.4A",
            ChargeProtocol::DedicatedChargingPort => "DCP 1.5A",
            ChargeProtocol::QuickCharge5V => "QC 5V",
            ChargeProtocol::Standard => "Standard 5V",
        }
    }
}

impl fmt::Display for ChargeProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ChargeProtocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
