//! A single object track maintained by the tracker.

use nalgebra::Vector4;

use crate::tracker::kalman_filter::{KalmanFilter, StateCovariance, StateMean};
use crate::tracker::matching::Detection;

/// Track lifecycle inside the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Created from a detection, not yet associated on a later frame
    #[default]
    New,
    Tracked,
    /// Missed on recent frames, kept for re-association
    Lost,
}

#[derive(Debug, Clone)]
pub struct Tracklet {
    /// Zero until the track is activated
    pub track_id: u64,
    pub class_id: u32,
    pub state: TrackState,
    /// Confirmed tracks are reported to callers
    pub is_activated: bool,
    pub score: f32,
    /// Last frame the track was associated with a detection
    pub frame_id: u32,
    pub start_frame: u32,
    pub hits: u32,
    mean: Option<StateMean>,
    covariance: Option<StateCovariance>,
    detection_tlbr: [f32; 4],
}

impl Tracklet {
    pub fn from_detection(detection: &Detection) -> Self {
        Self {
            track_id: 0,
            class_id: detection.class_id,
            state: TrackState::New,
            is_activated: false,
            score: detection.score,
            frame_id: 0,
            start_frame: 0,
            hits: 0,
            mean: None,
            covariance: None,
            detection_tlbr: detection.tlbr,
        }
    }

    /// Current box estimate in TLBR format.
    pub fn tlbr(&self) -> [f32; 4] {
        match &self.mean {
            Some(mean) => {
                let (cx, cy, aspect, h) = (mean[0], mean[1], mean[2], mean[3]);
                let w = aspect * h;
                [
                    (cx - w / 2.0) as f32,
                    (cy - h / 2.0) as f32,
                    (cx + w / 2.0) as f32,
                    (cy + h / 2.0) as f32,
                ]
            }
            None => self.detection_tlbr,
        }
    }

    /// Frames since the track was started (used to break duplicate ties).
    pub fn age(&self) -> u32 {
        self.frame_id.saturating_sub(self.start_frame)
    }

    pub(crate) fn activate(&mut self, kalman_filter: &KalmanFilter, track_id: u64, frame_id: u32) {
        let (mean, covariance) = kalman_filter.initiate(&to_xyah(&self.detection_tlbr));
        self.track_id = track_id;
        self.mean = Some(mean);
        self.covariance = Some(covariance);
        self.hits = 0;
        self.state = TrackState::Tracked;
        // Only tracks born on the very first frame skip confirmation.
        self.is_activated = frame_id == 1;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
    }

    pub(crate) fn re_activate(
        &mut self,
        detection: &Detection,
        kalman_filter: &KalmanFilter,
        frame_id: u32,
    ) {
        self.correct(detection, kalman_filter);
        self.hits = 0;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
        self.score = detection.score;
    }

    pub(crate) fn update(&mut self, detection: &Detection, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(detection, kalman_filter);
        self.hits += 1;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
        self.score = detection.score;
    }

    pub(crate) fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(covariance)) = (&self.mean, &self.covariance) {
            let mut mean = *mean;
            if self.state != TrackState::Tracked {
                mean[7] = 0.0;
            }
            let (mean, covariance) = kalman_filter.predict(&mean, covariance);
            self.mean = Some(mean);
            self.covariance = Some(covariance);
        }
    }

    pub(crate) fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    fn correct(&mut self, detection: &Detection, kalman_filter: &KalmanFilter) {
        self.detection_tlbr = detection.tlbr;
        let measurement = to_xyah(&detection.tlbr);
        match (&self.mean, &self.covariance) {
            (Some(mean), Some(covariance)) => {
                let (mean, covariance) = kalman_filter.update(mean, covariance, &measurement);
                self.mean = Some(mean);
                self.covariance = Some(covariance);
            }
            _ => {
                let (mean, covariance) = kalman_filter.initiate(&measurement);
                self.mean = Some(mean);
                self.covariance = Some(covariance);
            }
        }
    }
}

/// TLBR to `(center x, center y, aspect ratio, height)`.
fn to_xyah(tlbr: &[f32; 4]) -> Vector4<f64> {
    let w = f64::from(tlbr[2] - tlbr[0]);
    let h = f64::from(tlbr[3] - tlbr[1]);
    let aspect = if h > 0.0 { w / h } else { 0.0 };
    Vector4::new(
        f64::from(tlbr[0]) + w / 2.0,
        f64::from(tlbr[1]) + h / 2.0,
        aspect,
        h,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xyah_round_trip_through_filter() {
        let kf = KalmanFilter::new();
        let detection = Detection::new(10.0, 20.0, 40.0, 60.0, 0.9, 2);
        let mut track = Tracklet::from_detection(&detection);
        assert_eq!(track.tlbr(), [10.0, 20.0, 40.0, 60.0]);

        track.activate(&kf, 1, 1);
        let tlbr = track.tlbr();
        for (a, b) in tlbr.iter().zip([10.0, 20.0, 40.0, 60.0]) {
            assert!((a - b).abs() < 1e-4);
        }
        assert!(track.is_activated);
        assert_eq!(track.state, TrackState::Tracked);
    }

    #[test]
    fn test_late_tracks_need_confirmation() {
        let kf = KalmanFilter::new();
        let detection = Detection::new(10.0, 20.0, 40.0, 60.0, 0.9, 2);
        let mut track = Tracklet::from_detection(&detection);
        track.activate(&kf, 4, 12);
        assert!(!track.is_activated);

        track.update(&detection, &kf, 13);
        assert!(track.is_activated);
        assert_eq!(track.hits, 1);
        assert_eq!(track.age(), 1);
    }
}
