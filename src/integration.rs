//! Integration with external detection, tracking and OCR engines.
//!
//! This module provides the traits the frame loop calls into, adapters that
//! combine a raw detector with the built-in tracker, and process-based,
//! libtesseract or Burn engine implementations.

mod builder;
mod command;
mod detector;
mod pipeline;
mod replay;

pub use builder::DetectionBuilder;
pub use command::{
    CommandDetector, CommandError, CommandPlateDetector, CommandSpec, CommandTextRecognizer,
};
pub use detector::{
    DetectionSource, PlateDetector, TextRecognition, TextRecognizer, VehicleTrack, VehicleTracker,
};
pub use pipeline::{TrackerPipeline, UpstreamTracks};
pub use replay::{DetectionReplay, ReplayError};

pub use crate::tracker::Detection;

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel, RawDetection};

#[cfg(feature = "tesseract")]
mod tesseract;

#[cfg(feature = "tesseract")]
pub use tesseract::{TesseractError, TesseractRecognizer};
