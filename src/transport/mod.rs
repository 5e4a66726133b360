//! # Transport Module
//!
//! Byte pipes to the FNB58.
//!
//! This module handles:
//! - Finding the meter by VID/PID and claiming its HID interface (via `nusb`)
//! - Interrupt OUT/IN transfers of 64-byte frames with per-call timeouts
//! - A simulated meter for running without hardware
//!
//! The kernel HID driver is detached from the interface while it is claimed;
//! the interface is released when the transport is dropped.

pub mod port_trait;
pub mod simulated;

pub use port_trait::Transport;
pub use simulated::SimulatedTransport;

use async_trait::async_trait;
use nusb::transfer::RequestBuffer;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DeviceConfig;
use crate::error::{MeterError, Result, TransportError};
use crate::fnb58::protocol::{Frame, FRAME_SIZE};

/// FNB58 HID interface claimed through `nusb`
pub struct UsbHidTransport {
    interface: nusb::Interface,
    endpoint_out: u8,
    endpoint_in: u8,
    location: String,
}

impl std::fmt::Debug for UsbHidTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbHidTransport")
            .field("location", &self.location)
            .field("endpoint_out", &self.endpoint_out)
            .field("endpoint_in", &self.endpoint_in)
            .finish_non_exhaustive()
    }
}

impl UsbHidTransport {
    /// Find the meter and claim its HID interface
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound`: no device with the configured VID/PID is attached
    /// - `Usb`: enumeration, open or claim failed (permissions, busy, ...)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use magbank_monitor::config::DeviceConfig;
    /// use magbank_monitor::transport::UsbHidTransport;
    ///
    /// let transport = UsbHidTransport::open(&DeviceConfig::default())?;
    /// println!("Connected to: {}", transport.location());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(config: &DeviceConfig) -> Result<Self> {
        debug!(
            "Searching for USB device {:04x}:{:04x}",
            config.vendor_id, config.product_id
        );

        let device_info = nusb::list_devices()
            .map_err(|e| MeterError::Usb(format!("Failed to enumerate USB devices: {}", e)))?
            .find(|d| d.vendor_id() == config.vendor_id && d.product_id() == config.product_id)
            .ok_or(MeterError::DeviceNotFound {
                vendor_id: config.vendor_id,
                product_id: config.product_id,
            })?;

        let location = format!(
            "bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        );
        info!("Found FNB58 on {}", location);

        let device = device_info
            .open()
            .map_err(|e| MeterError::Usb(format!("Failed to open device on {}: {}", location, e)))?;

        let interface = device
            .detach_and_claim_interface(config.interface)
            .map_err(|e| {
                MeterError::Usb(format!(
                    "Failed to claim interface {} on {}: {}",
                    config.interface, location, e
                ))
            })?;
        info!("Interface {} claimed", config.interface);

        Ok(Self {
            interface,
            endpoint_out: config.endpoint_out,
            endpoint_in: config.endpoint_in,
            location,
        })
    }

    /// Bus and address the meter was found on
    pub fn location(&self) -> &str {
        &self.location
    }
}

#[async_trait]
impl Transport for UsbHidTransport {
    async fn write(&mut self, frame: &Frame, timeout: Duration) -> std::result::Result<(), TransportError> {
        let transfer = self.interface.interrupt_out(self.endpoint_out, frame.to_vec());

        // Dropping the transfer on timeout cancels it
        let completion = tokio::time::timeout(timeout, transfer)
            .await
            .map_err(|_| TransportError::Timeout)?;

        completion
            .into_result()
            .map_err(|e| TransportError::Io(format!("interrupt OUT 0x{:02x}: {}", self.endpoint_out, e)))?;

        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> std::result::Result<Vec<u8>, TransportError> {
        let transfer = self
            .interface
            .interrupt_in(self.endpoint_in, RequestBuffer::new(FRAME_SIZE));

        let completion = tokio::time::timeout(timeout, transfer)
            .await
            .map_err(|_| TransportError::Timeout)?;

        completion
            .into_result()
            .map_err(|e| TransportError::Io(format!("interrupt IN 0x{:02x}: {}", self.endpoint_in, e)))
    }
}
