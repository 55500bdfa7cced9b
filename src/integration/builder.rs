//! Builder for creating Detection objects from various model output formats.

use crate::tracker::Detection;

/// Builder for creating `Detection` objects from various input formats.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    tlbr: [f32; 4],
    score: f32,
    class_id: u32,
    track_id: Option<u64>,
}

impl DetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.tlbr = [x1, y1, x2, y2];
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height),
    /// the native output of YOLO heads.
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.tlbr = [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0];
        self
    }

    /// Scale the box from model input space back to frame pixels.
    pub fn scale(mut self, sx: f32, sy: f32) -> Self {
        self.tlbr = [
            self.tlbr[0] * sx,
            self.tlbr[1] * sy,
            self.tlbr[2] * sx,
            self.tlbr[3] * sy,
        ];
        self
    }

    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn class_id(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    /// Identity assigned by an upstream tracker.
    pub fn track_id(mut self, track_id: u64) -> Self {
        self.track_id = Some(track_id);
        self
    }

    pub fn build(self) -> Detection {
        let [x1, y1, x2, y2] = self.tlbr;
        let detection = Detection::new(x1, y1, x2, y2, self.score, self.class_id);
        match self.track_id {
            Some(id) => detection.with_track_id(id),
            None => detection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_builder() {
        let det = DetectionBuilder::new()
            .xywh(50.0, 40.0, 20.0, 10.0)
            .scale(2.0, 2.0)
            .score(0.95)
            .class_id(7)
            .track_id(12)
            .build();

        assert_eq!(det.tlbr, [80.0, 70.0, 120.0, 90.0]);
        assert_eq!(det.score, 0.95);
        assert_eq!(det.class_id, 7);
        assert_eq!(det.track_id, Some(12));
    }
}
