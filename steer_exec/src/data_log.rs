//! # Data collection log
//!
//! Each controller owns a `DataLog` which, while collecting, records the
//! time, target point and sentinel point of every advance. Collection can be
//! started and stopped at any time without losing buffered rows, and
//! resetting a controller never clears the log.
//!
//! The log is exported as tab delimited text without a header, one row per
//! advance:
//!
//! ```text
//! time target_x target_y target_z sentinel_x sentinel_y sentinel_z
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use csv::WriterBuilder;
use log::info;
use nalgebra::Vector3;
use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single collected sample.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct DataRow {
    pub time_s: f64,
    pub target_m: Vector3<f64>,
    pub sentinel_m: Vector3<f64>,
}

/// Controller owned log of target and sentinel points.
#[derive(Debug, Clone, Default)]
pub struct DataLog {
    collecting: bool,
    rows: Vec<DataRow>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DataLogError {
    #[error("Cannot create the data log file {0:?}: {1}")]
    FileError(PathBuf, std::io::Error),

    #[error("Cannot write a data log row: {0}")]
    CsvError(csv::Error),

    #[error("Cannot flush the data log: {0}")]
    FlushError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DataLog {
    /// Begin collecting rows.
    pub fn start(&mut self) {
        self.collecting = true;
    }

    /// Stop collecting rows. Buffered rows are kept.
    pub fn stop(&mut self) {
        self.collecting = false;
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Append a row if collection is active.
    pub fn push(&mut self, time_s: f64, target_m: Vector3<f64>, sentinel_m: Vector3<f64>) {
        if self.collecting {
            self.rows.push(DataRow {
                time_s,
                target_m,
                sentinel_m,
            });
        }
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    /// Discard all buffered rows.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Write all buffered rows to the given writer.
    pub fn write<W: Write>(&self, writer: W) -> Result<(), DataLogError> {
        let mut w = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(writer);

        for row in &self.rows {
            let record = [
                row.time_s,
                row.target_m.x, row.target_m.y, row.target_m.z,
                row.sentinel_m.x, row.sentinel_m.y, row.sentinel_m.z,
            ];

            w.write_record(record.iter().map(|v| format!("{:+.6e}", v)))
                .map_err(DataLogError::CsvError)?;
        }

        w.flush().map_err(DataLogError::FlushError)
    }

    /// Write all buffered rows to a new file at the given path.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), DataLogError> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| DataLogError::FileError(path.to_path_buf(), e))?;

        self.write(file)?;

        info!("Wrote {} data log rows to {:?}", self.rows.len(), path);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_push_only_while_collecting() {
        let mut log = DataLog::default();
        assert!(!log.is_collecting());

        log.push(0.0, Vector3::zeros(), Vector3::zeros());
        assert!(log.rows().is_empty());

        log.start();
        log.push(0.1, Vector3::x(), Vector3::y());
        log.stop();
        log.push(0.2, Vector3::x(), Vector3::y());

        assert_eq!(log.rows().len(), 1);
        assert_eq!(log.rows()[0].time_s, 0.1);

        // Restarting keeps the buffered rows
        log.start();
        log.push(0.3, Vector3::x(), Vector3::y());
        assert_eq!(log.rows().len(), 2);

        log.clear();
        assert!(log.rows().is_empty());
        assert!(log.is_collecting());
    }

    #[test]
    fn test_write_format() {
        let mut log = DataLog::default();
        log.start();
        log.push(
            0.5,
            Vector3::new(5.0, 0.0, 0.0),
            Vector3::new(5.0, -1.0, 0.0)
        );

        let mut buf: Vec<u8> = Vec::new();
        log.write(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let fields: Vec<&str> = text.trim_end().split('\t').collect();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0], "+5.000000e-1");
        assert_eq!(fields[1], "+5.000000e0");
        assert_eq!(fields[5], "-1.000000e0");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_write_file() {
        let path = std::env::temp_dir().join("steer_data_log_test.txt");

        let mut log = DataLog::default();
        log.start();
        for i in 0..3 {
            log.push(i as f64, Vector3::zeros(), Vector3::zeros());
        }
        log.write_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);

        std::fs::remove_file(&path).ok();
    }
}
