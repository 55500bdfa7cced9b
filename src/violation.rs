//! Overspeeding violations: record format, log sinks and the recognition
//! pipeline that produces them.

mod pipeline;
mod record;

pub use pipeline::{Clock, ViolationPipeline};
pub use record::{CSV_HEADER, CsvLogSink, LogRecord, LogSink, TIMESTAMP_FORMAT, UNKNOWN_PLATE};
