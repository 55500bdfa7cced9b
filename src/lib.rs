//! Video-based vehicle overspeeding detection.
//!
//! Vehicles are tracked across two calibrated horizontal lines; the pixel
//! displacement and elapsed frames between the two crossings give a speed
//! estimate, and vehicles above the limit are logged once together with an
//! OCR-read licence plate.

pub mod config;
pub mod dataset;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod integration;
pub mod logging;
pub mod monitor;
pub mod speed;
pub mod tracker;
pub mod training;
pub mod video;
pub mod violation;

pub use config::Config;
pub use error::{Error, Result};
pub use frame::Image;
pub use geometry::BBox;
pub use integration::{
    Detection, DetectionBuilder, DetectionSource, PlateDetector, TextRecognition, TextRecognizer,
    TrackerPipeline, UpstreamTracks, VehicleTrack, VehicleTracker,
};
pub use monitor::{FrameReport, MonitorSettings, RunSummary, SpeedMonitor};
pub use speed::{
    Calibration, CrossingEvent, CrossingLines, LineCrossing, LogState, SpeedEstimator,
    SpeedMeasurement, TrackId, TrackStore, TrackedVehicle,
};
pub use tracker::{ByteTracker, TrackerConfig};
pub use violation::{CsvLogSink, LogRecord, LogSink, ViolationPipeline};
