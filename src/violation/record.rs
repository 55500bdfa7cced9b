//! Violation records and the append-only CSV sink.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::speed::TrackId;

pub const CSV_HEADER: &str = "ID,Type,License Plate,Speed (km/h),Timestamp";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Plate text used when no plate could be read.
pub const UNKNOWN_PLATE: &str = "Unknown";

/// One logged overspeeding vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub id: TrackId,
    pub vehicle_type: String,
    pub plate: String,
    pub speed_kmph: f64,
    pub timestamp: NaiveDateTime,
}

impl LogRecord {
    /// Format as a CSV line (without the trailing newline).
    ///
    /// Commas and line breaks inside text fields are replaced with spaces
    /// so every line keeps exactly five fields.
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{:.1},{}",
            self.id,
            sanitize(&self.vehicle_type),
            sanitize(&self.plate),
            self.speed_kmph,
            self.timestamp.format(TIMESTAMP_FORMAT)
        )
    }

    pub fn has_plate(&self) -> bool {
        self.plate != UNKNOWN_PLATE
    }
}

fn sanitize(field: &str) -> String {
    field
        .chars()
        .map(|c| if matches!(c, ',' | '\n' | '\r') { ' ' } else { c })
        .collect()
}

/// Destination for violation records.
pub trait LogSink {
    /// Append one record. A record is either fully written or not at all.
    fn append(&mut self, record: &LogRecord) -> Result<()>;
}

/// In-memory sink, mostly for tests and embedding.
impl LogSink for Vec<LogRecord> {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Append-only CSV file with a fixed header.
#[derive(Debug)]
pub struct CsvLogSink {
    path: PathBuf,
    file: File,
}

impl CsvLogSink {
    /// Open `path` for appending, creating parent directories and writing
    /// the header when the file is new or empty. Existing content is kept,
    /// and an unterminated last line is closed before new rows go in.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let sink_error = |source| Error::LogSink {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(sink_error)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)
            .map_err(sink_error)?;

        let is_empty = file.metadata().map_err(sink_error)?.len() == 0;
        if is_empty {
            file.write_all(format!("{CSV_HEADER}\n").as_bytes())
                .map_err(sink_error)?;
        } else {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))
                .and_then(|_| file.read_exact(&mut last))
                .map_err(sink_error)?;
            if last[0] != b'\n' {
                file.write_all(b"\n").map_err(sink_error)?;
            }
        }
        file.flush().map_err(sink_error)?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for CsvLogSink {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        let line = format!("{}\n", record.to_csv_line());
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| Error::LogSink {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: TrackId, plate: &str) -> LogRecord {
        LogRecord {
            id,
            vehicle_type: "car".to_string(),
            plate: plate.to_string(),
            speed_kmph: 54.04,
            timestamp: NaiveDate::from_ymd_opt(2025, 3, 9)
                .unwrap()
                .and_hms_opt(14, 5, 7)
                .unwrap(),
        }
    }

    #[test]
    fn test_csv_line_format() {
        assert_eq!(
            record(7, "MH12AB1234").to_csv_line(),
            "7,car,MH12AB1234,54.0,2025-03-09 14:05:07"
        );
    }

    #[test]
    fn test_csv_line_keeps_five_fields() {
        let line = record(3, "AB,12\nCD").to_csv_line();
        assert_eq!(line.split(',').count(), 5);
        assert!(line.contains("AB 12 CD"));
    }

    #[test]
    fn test_sink_writes_header_once_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("overspeeding_log.csv");

        let mut sink = CsvLogSink::open(&path).unwrap();
        sink.append(&record(1, UNKNOWN_PLATE)).unwrap();
        drop(sink);

        let mut sink = CsvLogSink::open(&path).unwrap();
        sink.append(&record(2, "KA01")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("1,car,Unknown,"));
        assert!(lines[2].starts_with("2,car,KA01,"));
        for line in &lines {
            assert_eq!(line.split(',').count(), 5);
        }
    }

    #[test]
    fn test_sink_terminates_unfinished_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overspeeding_log.csv");
        fs::write(&path, format!("{CSV_HEADER}\n1,car,AB,20.0,2025-01-01 00:00:00")).unwrap();

        let mut sink = CsvLogSink::open(&path).unwrap();
        sink.append(&record(2, "KA01")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1,car,AB,20.0,2025-01-01 00:00:00");
        assert!(lines[2].starts_with("2,car,KA01,"));
        for line in &lines {
            assert_eq!(line.split(',').count(), 5, "{line}");
        }
    }

    #[test]
    fn test_sink_fails_on_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let result = CsvLogSink::open(blocker.join("log.csv"));
        assert!(matches!(result, Err(Error::LogSink { .. })));
    }
}
