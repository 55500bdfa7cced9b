//! Traits for the external detection, tracking and recognition engines.

use crate::frame::Image;
use crate::geometry::BBox;
use crate::tracker::Detection;

/// A vehicle reported by the detector/tracker on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleTrack {
    /// Stable id for the same physical object across consecutive frames.
    pub id: u64,
    pub class_id: u32,
    pub bbox: BBox,
}

/// Multi-object detector + tracker.
///
/// Called once per frame. Returning no tracks is valid and makes the frame
/// loop skip the frame.
pub trait VehicleTracker {
    /// Error type for detection or tracking failures.
    type Error: std::error::Error + Send + Sync + 'static;

    fn detect_and_track(&mut self, image: &Image) -> Result<Vec<VehicleTrack>, Self::Error>;
}

/// Trait for per-frame object detection backends.
///
/// Implement this trait to connect any detection model to the built-in
/// tracker.
///
/// # Example
///
/// ```ignore
/// use overspeed::{Detection, DetectionSource, Image};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, image: &Image) -> Result<Vec<Detection>, Self::Error> {
///         // Run inference and return detections
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run inference on an RGB frame.
    fn detect(&mut self, image: &Image) -> Result<Vec<Detection>, Self::Error>;
}

/// Licence-plate region detector, run on vehicle crops.
pub trait PlateDetector {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Candidate plate boxes in `image` coordinates, in detector order.
    fn detect_plates(&mut self, image: &Image) -> Result<Vec<BBox>, Self::Error>;
}

/// One piece of text read by an OCR engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRecognition {
    pub text: String,
    pub confidence: f32,
}

impl TextRecognition {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// OCR engine, run on plate crops.
pub trait TextRecognizer {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Recognised text fragments in engine order.
    fn recognize(&mut self, image: &Image) -> Result<Vec<TextRecognition>, Self::Error>;
}

/// A missing plate detector yields no candidates.
impl<P: PlateDetector> PlateDetector for Option<P> {
    type Error = P::Error;

    fn detect_plates(&mut self, image: &Image) -> Result<Vec<BBox>, Self::Error> {
        match self {
            Some(detector) => detector.detect_plates(image),
            None => Ok(Vec::new()),
        }
    }
}
