//! Adapters turning a `DetectionSource` into a `VehicleTracker`.

use crate::frame::Image;
use crate::geometry::BBox;
use crate::tracker::{ByteTracker, TrackerConfig};

use super::{DetectionSource, VehicleTrack, VehicleTracker};

/// Bundles detection inference with the built-in BYTE tracker.
pub struct TrackerPipeline<D: DetectionSource> {
    detector: D,
    tracker: ByteTracker,
}

impl<D: DetectionSource> TrackerPipeline<D> {
    pub fn new(detector: D, config: TrackerConfig) -> Self {
        Self {
            detector,
            tracker: ByteTracker::new(config),
        }
    }

    pub fn with_default_config(detector: D) -> Self {
        Self::new(detector, TrackerConfig::default())
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn tracker(&self) -> &ByteTracker {
        &self.tracker
    }
}

impl<D: DetectionSource> VehicleTracker for TrackerPipeline<D> {
    type Error = D::Error;

    fn detect_and_track(&mut self, image: &Image) -> Result<Vec<VehicleTrack>, Self::Error> {
        let detections = self.detector.detect(image)?;
        Ok(self
            .tracker
            .update(&detections)
            .into_iter()
            .map(|t| VehicleTrack {
                id: t.track_id,
                class_id: t.class_id,
                bbox: BBox::from_tlbr_f32(t.tlbr()),
            })
            .collect())
    }
}

/// Uses identities already assigned by the detector (for engines with an
/// integrated tracker). Detections without an id are dropped.
pub struct UpstreamTracks<D: DetectionSource> {
    detector: D,
}

impl<D: DetectionSource> UpstreamTracks<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }
}

impl<D: DetectionSource> VehicleTracker for UpstreamTracks<D> {
    type Error = D::Error;

    fn detect_and_track(&mut self, image: &Image) -> Result<Vec<VehicleTrack>, Self::Error> {
        Ok(self
            .detector
            .detect(image)?
            .into_iter()
            .filter_map(|d| {
                Some(VehicleTrack {
                    id: d.track_id?,
                    class_id: d.class_id,
                    bbox: d.bbox(),
                })
            })
            .collect())
    }
}
