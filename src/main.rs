//! # Magbank Monitor
//!
//! Live power telemetry from an FNIRSI FNB58 USB meter.
//!
//! Polls the meter once per interval, integrates energy and charge, logs a
//! status line per cycle and appends snapshots to a JSON-lines history.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse arguments, load configuration
//!    - Set up logging (console, optional diagnostics file)
//!    - Start the snapshot logger task
//!
//! 2. **Main Loop** (every `polling.interval_ms`)
//!    - Open the USB device if needed and run the handshake
//!    - Request and drain buffered telemetry into the session
//!    - Publish a snapshot to the logger task
//!    - SIGUSR1 resets the session, Ctrl+C exits
//!
//! 3. **Shutdown**
//!    - Release the device and flush the history file
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- --config config/default.toml
//! cargo run -- --simulate --cycles 10
//! kill -USR1 $(pidof magbank-monitor)   # start a new session
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use magbank_monitor::config::{Config, DeviceConfig, LoggingConfig};
use magbank_monitor::device::{CycleReport, Fnb58, PollSettings};
use magbank_monitor::error::MeterError;
use magbank_monitor::telemetry::logger::TelemetryLogger;
use magbank_monitor::telemetry::{Session, TelemetrySnapshot};
use magbank_monitor::transport::{SimulatedTransport, Transport, UsbHidTransport};

/// Configuration file used when `--config` is not given and it exists
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Parser, Debug)]
#[command(name = "magbank-monitor", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use a simulated meter instead of USB hardware
    #[arg(long)]
    simulate: bool,

    /// Exit after this many polling cycles
    #[arg(long)]
    cycles: Option<u64>,
}

/// What the logger task receives after each tick
#[derive(Debug, Clone)]
struct TickStatus {
    connected: bool,
    snapshot: TelemetrySnapshot,
}

type Meter = Fnb58<Box<dyn Transport>>;

/// Owns the meter across reconnects
struct Monitor {
    device: DeviceConfig,
    settings: PollSettings,
    simulate: bool,
    meter: Option<Meter>,
}

impl Monitor {
    fn new(config: &Config, simulate: bool) -> Self {
        Self {
            device: config.device.clone(),
            settings: config.polling.poll_settings(),
            simulate,
            meter: None,
        }
    }

    fn is_connected(&self) -> bool {
        self.meter.as_ref().is_some_and(Meter::is_connected)
    }

    fn open_transport(&self) -> magbank_monitor::error::Result<Box<dyn Transport>> {
        if self.simulate {
            info!("Using simulated FNB58");
            return Ok(Box::new(SimulatedTransport::new()));
        }

        let transport = UsbHidTransport::open(&self.device)?;
        info!("FNB58 opened at {}", transport.location());
        Ok(Box::new(transport))
    }

    /// One polling tick: (re)open, (re)connect, drain into `session`
    async fn tick(&mut self, session: &mut Session) -> Option<CycleReport> {
        if self.meter.is_none() {
            match self.open_transport() {
                Ok(transport) => self.meter = Some(Fnb58::new(transport, self.settings.clone())),
                Err(e) => {
                    warn!("Cannot open meter: {}", e);
                    return None;
                }
            }
        }

        let meter = self.meter.as_mut()?;

        if !meter.is_connected() {
            let connected = meter.connect().await;
            if let Err(e) = connected {
                warn!("{}", e);
                self.release();
                return None;
            }
        }

        let polled = meter.poll(session).await;
        match polled {
            Ok(report) => Some(report),
            Err(MeterError::NoData) => {
                debug!("No data this cycle");
                None
            }
            Err(e) => {
                warn!("{}", e);
                if e.requires_reconnect() {
                    self.release();
                }
                None
            }
        }
    }

    /// Drop the transport so the next tick reopens the device
    fn release(&mut self) {
        if let Some(meter) = self.meter.take() {
            drop(meter.into_transport());
            info!("Meter released");
        }
    }
}

/// Console status for one cycle
fn status_line(session: &Session, report: &CycleReport) -> String {
    let Some(reading) = session.latest() else {
        return format!("Waiting for telemetry ({} frames read)", report.frames_read);
    };

    let temperature = session
        .smoothed_temperature()
        .map_or_else(|| "-".to_string(), |t| format!("{:.1}", t));

    format!(
        "{:.3} V | {:.3} A | {:.2} W | {:.4} Wh | {:.1} mAh | {} °C | {} | D+ {:.2} V D- {:.2} V | V {} | I {} | {} samples",
        reading.voltage_v,
        reading.current_a,
        reading.power_w,
        session.energy_wh(),
        session.charge_mah(),
        temperature,
        reading.protocol(),
        reading.dp_v,
        reading.dm_v,
        session.statistics().voltage,
        session.statistics().current,
        report.samples,
    )
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH)),
        None => Ok(Config::default()),
    }
}

/// Console logging plus an optional non-blocking diagnostics file
///
/// The returned guard must live until exit so buffered lines get written.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match &config.diagnostics_file {
        Some(name) => {
            let appender = tracing_appender::rolling::daily(&config.log_dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Write every published status to the history files
async fn run_logger(mut logger: TelemetryLogger, mut rx: watch::Receiver<Option<TickStatus>>) {
    while rx.changed().await.is_ok() {
        let status = rx.borrow_and_update().clone();
        let Some(status) = status else { continue };

        if let Err(e) = logger.log(status.connected, Some(&status.snapshot)) {
            warn!("Failed to write telemetry history: {}", e);
        }
    }

    if let Err(e) = logger.flush() {
        warn!("Failed to flush telemetry history: {}", e);
    }
}

/// SIGUSR1 listener; never fires on platforms without it
struct ResetSignal {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
}

impl ResetSignal {
    fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let inner = signal(SignalKind::user_defined1())
                .context("Failed to install SIGUSR1 handler")?;
            Ok(Self { inner })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        {
            if self.inner.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
        #[cfg(not(unix))]
        {
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let _log_guard = init_logging(&config.logging);

    info!("Magbank Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let (status_tx, status_rx) = watch::channel(None);
    let logger_task = if config.logging.enabled {
        let logger = TelemetryLogger::new(&config.logging)
            .with_context(|| format!("Failed to create log directory {}", config.logging.log_dir))?;
        Some(tokio::spawn(run_logger(logger, status_rx)))
    } else {
        drop(status_rx);
        None
    };

    let mut monitor = Monitor::new(&config, args.simulate);
    let mut session = Session::new();
    let mut reset_signal = ResetSignal::new()?;

    let mut ticker = interval(config.polling.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Polling every {} ms", config.polling.interval_ms);
    info!("Press Ctrl+C to exit");

    let mut cycles: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(report) = monitor.tick(&mut session).await {
                    info!("{}", status_line(&session, &report));
                }

                let _ = status_tx.send(Some(TickStatus {
                    connected: monitor.is_connected(),
                    snapshot: session.snapshot(),
                }));

                cycles += 1;
                if args.cycles.is_some_and(|limit| cycles >= limit) {
                    info!("Completed {} cycles", cycles);
                    break;
                }
            }

            _ = reset_signal.recv() => {
                session.reset();
                info!("Session reset");
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    monitor.release();
    info!(
        "Session total: {:.4} Wh, {:.1} mAh over {} samples",
        session.energy_wh(),
        session.charge_mah(),
        session.samples_processed()
    );

    drop(status_tx);
    if let Some(task) = logger_task {
        task.await.context("Logger task failed")?;
    }

    Ok(())
}
