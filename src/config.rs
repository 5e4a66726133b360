//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration for a stock FNB58.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::device::PollSettings;
use crate::error::{MeterError, Result};
use crate::fnb58::protocol::{
    FNB58_ENDPOINT_IN, FNB58_ENDPOINT_OUT, FNB58_HID_INTERFACE, FNB58_PRODUCT_ID,
    FNB58_VENDOR_ID,
};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// USB device selection
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,

    #[serde(default = "default_product_id")]
    pub product_id: u16,

    #[serde(default = "default_interface")]
    pub interface: u8,

    #[serde(default = "default_endpoint_out")]
    pub endpoint_out: u8,

    #[serde(default = "default_endpoint_in")]
    pub endpoint_in: u8,
}

/// Polling cadence and transfer timeouts
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    #[serde(default = "default_first_read_timeout_ms")]
    pub first_read_timeout_ms: u64,

    #[serde(default = "default_drain_read_timeout_ms")]
    pub drain_read_timeout_ms: u64,

    #[serde(default = "default_max_frames_per_cycle")]
    pub max_frames_per_cycle: usize,

    #[serde(default = "default_max_idle_cycles")]
    pub max_idle_cycles: u32,

    #[serde(default)]
    pub verify_checksum: bool,
}

/// Snapshot log and diagnostics configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_format")]
    pub format: String,

    /// File name (inside `log_dir`) for a copy of the diagnostic log
    #[serde(default)]
    pub diagnostics_file: Option<String>,
}

// Default value functions
fn default_vendor_id() -> u16 { FNB58_VENDOR_ID }
fn default_product_id() -> u16 { FNB58_PRODUCT_ID }
fn default_interface() -> u8 { FNB58_HID_INTERFACE }
fn default_endpoint_out() -> u8 { FNB58_ENDPOINT_OUT }
fn default_endpoint_in() -> u8 { FNB58_ENDPOINT_IN }

fn default_interval_ms() -> u64 { 1000 }
fn default_write_timeout_ms() -> u64 { 1000 }
fn default_handshake_timeout_ms() -> u64 { 1000 }
fn default_first_read_timeout_ms() -> u64 { 1000 }
fn default_drain_read_timeout_ms() -> u64 { 50 }
fn default_max_frames_per_cycle() -> usize { 100 }
fn default_max_idle_cycles() -> u32 { 3 }

fn default_logging_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_file_prefix() -> String { "magbank_history".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_format() -> String { "jsonl".to_string() }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            interface: default_interface(),
            endpoint_out: default_endpoint_out(),
            endpoint_in: default_endpoint_in(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            first_read_timeout_ms: default_first_read_timeout_ms(),
            drain_read_timeout_ms: default_drain_read_timeout_ms(),
            max_frames_per_cycle: default_max_frames_per_cycle(),
            max_idle_cycles: default_max_idle_cycles(),
            verify_checksum: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            log_dir: default_log_dir(),
            file_prefix: default_file_prefix(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_log_format(),
            diagnostics_file: None,
        }
    }
}

impl PollingConfig {
    /// Polling period of the main loop
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Settings handed to the device driver
    #[must_use]
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            first_read_timeout: Duration::from_millis(self.first_read_timeout_ms),
            drain_read_timeout: Duration::from_millis(self.drain_read_timeout_ms),
            max_frames_per_cycle: self.max_frames_per_cycle,
            max_idle_cycles: self.max_idle_cycles,
            verify_checksum: self.verify_checksum,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> MeterError {
    MeterError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use magbank_monitor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Endpoint direction is encoded in bit 7
        if self.device.endpoint_out & 0x80 != 0 {
            return Err(invalid("endpoint_out must be an OUT endpoint (bit 7 clear)"));
        }

        if self.device.endpoint_in & 0x80 == 0 {
            return Err(invalid("endpoint_in must be an IN endpoint (bit 7 set)"));
        }

        if self.polling.interval_ms == 0 || self.polling.interval_ms > 60000 {
            return Err(invalid("interval_ms must be between 1 and 60000"));
        }

        for (name, value) in [
            ("write_timeout_ms", self.polling.write_timeout_ms),
            ("handshake_timeout_ms", self.polling.handshake_timeout_ms),
            ("first_read_timeout_ms", self.polling.first_read_timeout_ms),
            ("drain_read_timeout_ms", self.polling.drain_read_timeout_ms),
        ] {
            if value == 0 || value > 10000 {
                return Err(invalid(format!("{} must be between 1 and 10000", name)));
            }
        }

        if self.polling.drain_read_timeout_ms >= self.polling.first_read_timeout_ms {
            return Err(invalid(
                "drain_read_timeout_ms must be shorter than first_read_timeout_ms",
            ));
        }

        if self.polling.max_frames_per_cycle == 0 {
            return Err(invalid("max_frames_per_cycle must be greater than 0"));
        }

        if self.polling.max_idle_cycles == 0 {
            return Err(invalid("max_idle_cycles must be greater than 0"));
        }

        if self.logging.enabled {
            if self.logging.log_dir.is_empty() {
                return Err(invalid("logging log_dir cannot be empty when enabled"));
            }

            if self.logging.file_prefix.is_empty() {
                return Err(invalid("logging file_prefix cannot be empty when enabled"));
            }
        }

        if self.logging.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.logging.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.logging.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        if let Some(name) = &self.logging.diagnostics_file {
            if name.is_empty() || name.contains(|c| c == '/' || c == '\\') {
                return Err(invalid("diagnostics_file must be a plain file name"));
            }
        }

        Ok(())
    }
}
