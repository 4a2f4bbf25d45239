// Append-only prediction log
//
// The CSV log is the only persistent mutable state in the service. Every
// writer goes through `append`, which holds an in-process mutex and an
// exclusive advisory file lock while a single full row is written.

use chrono::Utc;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::record::{LOG_HEADER, PredictionRecord};
use super::stats::PredictionStats;
use crate::errors::{MonitorError, MonitorResult};

/// Capability the inference path depends on: record one served prediction
pub trait PredictionRecorder: Send + Sync {
    fn record_prediction(&self, record: &PredictionRecord) -> MonitorResult<()>;
}

/// Readable prediction history, used by stats and drift
pub trait PredictionLog: PredictionRecorder {
    /// Every record in append order
    fn read_all(&self) -> MonitorResult<Vec<PredictionRecord>>;

    /// The `n` most recent records, most recent last
    fn read_recent(&self, n: usize) -> MonitorResult<Vec<PredictionRecord>> {
        let mut records = self.read_all()?;
        let skip = records.len().saturating_sub(n);
        Ok(records.split_off(skip))
    }

    fn stats(&self) -> MonitorResult<PredictionStats> {
        Ok(PredictionStats::from_records(&self.read_all()?))
    }
}

/// CSV-backed prediction log
pub struct CsvPredictionLog {
    path: PathBuf,
    /// Rotate the active file once it reaches this size (None = never)
    rotate_after_bytes: Option<u64>,
    write_lock: Mutex<()>,
}

impl CsvPredictionLog {
    /// Open the log, creating the file and its header if absent
    pub fn open(path: impl Into<PathBuf>, rotate_after_bytes: Option<u64>) -> MonitorResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                MonitorError::logging(format!("cannot create {}", parent.display()), e)
            })?;
        }

        let log = Self {
            path,
            rotate_after_bytes,
            write_lock: Mutex::new(()),
        };

        let file = log.open_for_append()?;
        file.lock_exclusive()
            .map_err(|e| MonitorError::logging("cannot lock prediction log", e))?;
        let created = log.write_header_if_empty(&file)?;
        if created {
            info!(path = %log.path.display(), "Prediction log initialized");
        }

        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single CSV row
    pub fn append(&self, record: &PredictionRecord) -> MonitorResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| MonitorError::logging_msg("prediction log mutex poisoned"))?;

        let mut file = self.open_for_append()?;
        file.lock_exclusive()
            .map_err(|e| MonitorError::logging("cannot lock prediction log", e))?;

        if self.needs_rotation(&file)? {
            self.rotate()?;
            file = self.open_for_append()?;
            file.lock_exclusive()
                .map_err(|e| MonitorError::logging("cannot lock prediction log", e))?;
        }
        self.write_header_if_empty(&file)?;

        file.write_all(record.to_csv_row().as_bytes())
            .map_err(|e| MonitorError::logging("cannot append prediction", e))?;

        debug!(
            prediction = %record.prediction_name,
            confidence = record.confidence,
            "Prediction recorded"
        );
        // File lock released when `file` drops
        Ok(())
    }

    fn open_for_append(&self) -> MonitorResult<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                MonitorError::logging(format!("cannot open {}", self.path.display()), e)
            })
    }

    /// Returns true when the header was written
    fn write_header_if_empty(&self, mut file: &File) -> MonitorResult<bool> {
        let len = file
            .metadata()
            .map_err(|e| MonitorError::logging("cannot stat prediction log", e))?
            .len();
        if len > 0 {
            return Ok(false);
        }
        file.write_all(format!("{}\n", LOG_HEADER).as_bytes())
            .map_err(|e| MonitorError::logging("cannot write log header", e))?;
        Ok(true)
    }

    fn needs_rotation(&self, file: &File) -> MonitorResult<bool> {
        let Some(limit) = self.rotate_after_bytes else {
            return Ok(false);
        };
        let len = file
            .metadata()
            .map_err(|e| MonitorError::logging("cannot stat prediction log", e))?
            .len();
        Ok(len >= limit)
    }

    fn rotate(&self) -> MonitorResult<()> {
        let archive = self.archive_path();
        fs::rename(&self.path, &archive).map_err(|e| {
            MonitorError::logging(format!("cannot rotate to {}", archive.display()), e)
        })?;
        info!(archive = %archive.display(), "Prediction log rotated");
        Ok(())
    }

    fn archive_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("predictions_log");
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6f");
        self.path.with_file_name(format!("{}.{}.csv", stem, stamp))
    }
}

impl PredictionRecorder for CsvPredictionLog {
    fn record_prediction(&self, record: &PredictionRecord) -> MonitorResult<()> {
        self.append(record)
    }
}

impl PredictionLog for CsvPredictionLog {
    fn read_all(&self) -> MonitorResult<Vec<PredictionRecord>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MonitorError::logging(
                    format!("cannot open {}", self.path.display()),
                    e,
                ))
            }
        };

        // Shared lock keeps readers off half-written rows
        file.lock_shared()
            .map_err(|e| MonitorError::logging("cannot lock prediction log", e))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| MonitorError::logging("cannot read prediction log", e))?;
        drop(file);

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            if line == LOG_HEADER {
                continue;
            }
            match PredictionRecord::from_csv_row(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    debug!(error = %e, "Skipping malformed prediction row");
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, path = %self.path.display(), "Malformed rows in prediction log");
        }

        Ok(records)
    }
}

/// In-memory log for tests and embedding
#[derive(Default)]
pub struct MemoryPredictionLog {
    records: Mutex<Vec<PredictionRecord>>,
}

impl MemoryPredictionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PredictionRecorder for MemoryPredictionLog {
    fn record_prediction(&self, record: &PredictionRecord) -> MonitorResult<()> {
        self.records
            .lock()
            .map_err(|_| MonitorError::logging_msg("memory log mutex poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

impl PredictionLog for MemoryPredictionLog {
    fn read_all(&self) -> MonitorResult<Vec<PredictionRecord>> {
        Ok(self
            .records
            .lock()
            .map_err(|_| MonitorError::logging_msg("memory log mutex poisoned"))?
            .clone())
    }
}
