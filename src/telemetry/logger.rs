//! # Telemetry Logger
//!
//! Appends one JSON object per polling tick to rotating JSONL files.
//!
//! Each line looks like:
//!
//! ```text
//! {"timestamp":"2026-10-19T12:00:00.123+02:00","connected":true,"fnb58":{...}}
//! ```
//!
//! `fnb58` is `null` while the meter is disconnected. Files are named
//! `{prefix}_{YYYYmmdd_HHMMSS}_{seq}.jsonl`; a new file is started after
//! `max_records_per_file` lines and only the newest `max_files_to_keep` files
//! are retained.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::snapshot::TelemetrySnapshot;
use crate::config::LoggingConfig;
use crate::error::Result;

/// One line of the history file
#[derive(Debug, Serialize)]
struct LogRecord<'a> {
    timestamp: DateTime<Local>,
    connected: bool,
    fnb58: Option<&'a TelemetrySnapshot>,
}

/// Rotating JSONL writer
#[derive(Debug)]
pub struct TelemetryLogger {
    dir: PathBuf,
    prefix: String,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    files_created: u64,
}

impl TelemetryLogger {
    /// Create a logger writing into `config.log_dir`
    ///
    /// The directory is created if missing; the first file is opened lazily on
    /// the first record.
    ///
    /// # Errors
    ///
    /// Returns error if the log directory cannot be created
    pub fn new(config: &LoggingConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            prefix: config.file_prefix.clone(),
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            writer: None,
            current_path: None,
            records_in_file: 0,
            files_created: 0,
        })
    }

    /// Append one record
    ///
    /// # Arguments
    ///
    /// * `connected` - Whether the meter was connected at this tick
    /// * `snapshot` - Session snapshot, ignored when disconnected
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the file write fails
    pub fn log(&mut self, connected: bool, snapshot: Option<&TelemetrySnapshot>) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let record = LogRecord {
            timestamp: Local::now(),
            connected,
            fnb58: if connected { snapshot } else { None },
        };
        let line = serde_json::to_string(&record)?;

        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        self.records_in_file += 1;
        Ok(())
    }

    /// Path of the file currently being written
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Records written to the current file
    #[must_use]
    pub fn records_in_file(&self) -> usize {
        self.records_in_file
    }

    /// Flush buffered data to disk
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        let name = format!(
            "{}_{}_{:04}.jsonl",
            self.prefix,
            Local::now().format("%Y%m%d_%H%M%S"),
            self.files_created
        );
        let path = self.dir.join(name);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Writing telemetry history to {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;
        self.files_created += 1;

        self.prune()
    }

    /// Delete the oldest history files beyond the retention limit
    fn prune(&self) -> Result<()> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| self.is_history_file(path))
            .collect();

        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        // Names embed a sortable timestamp and sequence number
        files.sort();
        let excess = files.len() - self.max_files_to_keep;

        for path in files.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed old telemetry file {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        Ok(())
    }

    fn is_history_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(&format!("{}_", self.prefix)) && name.ends_with(".jsonl"))
            .unwrap_or(false)
    }
}

impl Drop for TelemetryLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush telemetry log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fnb58::protocol::Sample;
    use crate::telemetry::Session;
    use tempfile::TempDir;

    fn logging_config(dir: &TempDir, max_records: usize, max_files: usize) -> LoggingConfig {
        LoggingConfig {
            log_dir: dir.path().to_string_lossy().to_string(),
            max_records_per_file: max_records,
            max_files_to_keep: max_files,
            ..LoggingConfig::default()
        }
    }

    fn history_files(dir: &TempDir) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
    }

    fn sample_snapshot() -> TelemetrySnapshot {
        let mut session = Session::new();
        session.ingest_frame(&[Sample {
            voltage_v: 5.0,
            current_a: 1.5,
            dp_v: 0.0,
            dm_v: 0.0,
            temp_c: 30.0,
        }]);
        session.snapshot()
    }

    #[test]
    fn test_writes_json_lines() {
        let dir = TempDir::new().unwrap();
        let mut logger = TelemetryLogger::new(&logging_config(&dir, 100, 10)).unwrap();
        let snapshot = sample_snapshot();

        logger.log(true, Some(&snapshot)).unwrap();
        logger.log(false, Some(&snapshot)).unwrap();

        let contents = fs::read_to_string(logger.current_path().unwrap()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["connected"], true);
        assert_eq!(first["fnb58"]["reading"]["voltage_v"], 5.0);
        assert!(first["timestamp"].is_string());

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["connected"], false);
        assert!(second["fnb58"].is_null());
    }

    #[test]
    fn test_file_naming() {
        let dir = TempDir::new().unwrap();
        let mut logger = TelemetryLogger::new(&logging_config(&dir, 100, 10)).unwrap();
        logger.log(false, None).unwrap();

        let name = logger
            .current_path()
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        assert!(name.starts_with("magbank_history_"));
        assert!(name.ends_with("_0000.jsonl"));
    }

    #[test]
    fn test_rotation_after_max_records() {
        let dir = TempDir::new().unwrap();
        let mut logger = TelemetryLogger::new(&logging_config(&dir, 2, 10)).unwrap();

        for _ in 0..5 {
            logger.log(false, None).unwrap();
        }

        let files = history_files(&dir);
        assert_eq!(files.len(), 3, "5 records at 2 per file should use 3 files");
        assert_eq!(logger.records_in_file(), 1);

        let total: usize = files
            .iter()
            .map(|path| fs::read_to_string(path).unwrap().lines().count())
            .sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_retention_keeps_newest_files() {
        let dir = TempDir::new().unwrap();
        let mut logger = TelemetryLogger::new(&logging_config(&dir, 1, 2)).unwrap();

        for _ in 0..5 {
            logger.log(false, None).unwrap();
        }

        let files = history_files(&dir);
        assert_eq!(files.len(), 2);
        assert_eq!(files.last().map(PathBuf::as_path), logger.current_path());
    }

    #[test]
    fn test_prune_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        let mut logger = TelemetryLogger::new(&logging_config(&dir, 1, 1)).unwrap();
        for _ in 0..3 {
            logger.log(false, None).unwrap();
        }

        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(history_files(&dir).len(), 2);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let config = LoggingConfig {
            log_dir: nested.to_string_lossy().to_string(),
            ..LoggingConfig::default()
        };

        let mut logger = TelemetryLogger::new(&config).unwrap();
        logger.log(false, None).unwrap();
        assert!(nested.is_dir());
    }
}
