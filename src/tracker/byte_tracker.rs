//! Class-aware BYTE multi-object tracker.

use std::mem;

use serde::Deserialize;

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, ClassBox, Detection};
use crate::tracker::tracklet::{TrackState, Tracklet};

/// Detections at or below this score are ignored entirely.
const LOW_SCORE_FLOOR: f32 = 0.1;
const SECOND_MATCH_THRESH: f64 = 0.5;
const UNCONFIRMED_MATCH_THRESH: f64 = 0.7;
const DUPLICATE_IOU: f32 = 0.85;

/// Configuration for the [`ByteTracker`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections at or above this score take part in the first association.
    pub track_thresh: f32,
    /// Maximum fused IoU cost accepted in the first association.
    pub match_thresh: f32,
    /// How long (in frames at 30 fps) a lost track is kept.
    pub track_buffer: u32,
    pub frame_rate: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            match_thresh: 0.8,
            track_buffer: 30,
            frame_rate: 30.0,
        }
    }
}

pub struct ByteTracker {
    tracked: Vec<Tracklet>,
    lost: Vec<Tracklet>,
    frame_id: u32,
    next_id: u64,
    config: TrackerConfig,
    max_time_lost: u32,
    kalman_filter: KalmanFilter,
}

impl ByteTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let max_time_lost = (config.frame_rate / 30.0 * config.track_buffer as f32) as u32;
        Self {
            tracked: Vec::new(),
            lost: Vec::new(),
            frame_id: 0,
            next_id: 1,
            config,
            max_time_lost,
            kalman_filter: KalmanFilter::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Associate one frame of detections and return the confirmed tracks.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<Tracklet> {
        self.frame_id += 1;
        let frame_id = self.frame_id;
        let kf = &self.kalman_filter;

        let high: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.score >= self.config.track_thresh)
            .collect();
        let low: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.score > LOW_SCORE_FLOOR && d.score < self.config.track_thresh)
            .collect();

        let (confirmed, mut unconfirmed): (Vec<Tracklet>, Vec<Tracklet>) =
            mem::take(&mut self.tracked)
                .into_iter()
                .partition(|t| t.is_activated);
        let mut pool = confirmed;
        pool.append(&mut self.lost);
        for track in pool.iter_mut() {
            track.predict(kf);
        }

        let mut tracked = Vec::new();
        let mut lost = Vec::new();

        // First association: confirmed and lost tracks against high-score boxes.
        let mut cost = matching::iou_distance(&track_boxes(&pool), &detection_boxes(&high));
        matching::fuse_score(&mut cost, &scores(&high));
        let first = matching::linear_assignment(&cost, f64::from(self.config.match_thresh));

        let mut pool: Vec<Option<Tracklet>> = pool.into_iter().map(Some).collect();
        for &(itrack, idet) in &first.matches {
            if let Some(mut track) = pool[itrack].take() {
                if track.state == TrackState::Tracked {
                    track.update(high[idet], kf, frame_id);
                } else {
                    track.re_activate(high[idet], kf, frame_id);
                }
                tracked.push(track);
            }
        }

        // Second association: still-tracked leftovers against low-score boxes.
        let (mut remaining, still_lost): (Vec<Tracklet>, Vec<Tracklet>) = first
            .unmatched_rows
            .iter()
            .filter_map(|&i| pool[i].take())
            .partition(|t| t.state == TrackState::Tracked);
        lost.extend(still_lost);

        let cost = matching::iou_distance(&track_boxes(&remaining), &detection_boxes(&low));
        let second = matching::linear_assignment(&cost, SECOND_MATCH_THRESH);
        let mut matched_second = vec![false; remaining.len()];
        for &(itrack, idet) in &second.matches {
            remaining[itrack].update(low[idet], kf, frame_id);
            matched_second[itrack] = true;
        }
        for (i, mut track) in remaining.into_iter().enumerate() {
            if matched_second[i] {
                tracked.push(track);
            } else {
                track.mark_lost();
                lost.push(track);
            }
        }

        // Unconfirmed tracks get one chance against the leftover high boxes.
        let leftover: Vec<&Detection> = first.unmatched_cols.iter().map(|&j| high[j]).collect();
        let mut cost = matching::iou_distance(&track_boxes(&unconfirmed), &detection_boxes(&leftover));
        matching::fuse_score(&mut cost, &scores(&leftover));
        let third = matching::linear_assignment(&cost, UNCONFIRMED_MATCH_THRESH);
        let mut matched_unconfirmed = vec![false; unconfirmed.len()];
        for &(itrack, idet) in &third.matches {
            unconfirmed[itrack].update(leftover[idet], kf, frame_id);
            matched_unconfirmed[itrack] = true;
        }
        tracked.extend(
            unconfirmed
                .into_iter()
                .enumerate()
                .filter_map(|(i, t)| matched_unconfirmed[i].then_some(t)),
        );

        // New tracks from confident leftovers.
        for &idet in &third.unmatched_cols {
            let detection = leftover[idet];
            if detection.score < self.config.track_thresh + 0.1 {
                continue;
            }
            let mut track = Tracklet::from_detection(detection);
            track.activate(kf, self.next_id, frame_id);
            self.next_id += 1;
            tracked.push(track);
        }

        lost.retain(|t| frame_id - t.frame_id <= self.max_time_lost);

        let (tracked, lost) = remove_duplicates(tracked, lost);
        self.tracked = tracked;
        self.lost = lost;

        self.tracked
            .iter()
            .filter(|t| t.is_activated)
            .cloned()
            .collect()
    }
}

fn track_boxes(tracks: &[Tracklet]) -> Vec<ClassBox> {
    tracks.iter().map(|t| (t.tlbr(), t.class_id)).collect()
}

fn detection_boxes(detections: &[&Detection]) -> Vec<ClassBox> {
    detections.iter().map(|d| (d.tlbr, d.class_id)).collect()
}

fn scores(detections: &[&Detection]) -> Vec<f32> {
    detections.iter().map(|d| d.score).collect()
}

/// Drop overlapping tracked/lost pairs, keeping the longer-lived track.
fn remove_duplicates(tracked: Vec<Tracklet>, lost: Vec<Tracklet>) -> (Vec<Tracklet>, Vec<Tracklet>) {
    let mut drop_tracked = vec![false; tracked.len()];
    let mut drop_lost = vec![false; lost.len()];

    for (i, a) in tracked.iter().enumerate() {
        for (j, b) in lost.iter().enumerate() {
            if a.class_id != b.class_id || matching::iou(&a.tlbr(), &b.tlbr()) <= DUPLICATE_IOU {
                continue;
            }
            if a.age() > b.age() {
                drop_lost[j] = true;
            } else {
                drop_tracked[i] = true;
            }
        }
    }

    let keep = |tracks: Vec<Tracklet>, dropped: &[bool]| -> Vec<Tracklet> {
        tracks
            .into_iter()
            .zip(dropped)
            .filter_map(|(t, &d)| (!d).then_some(t))
            .collect()
    };
    (keep(tracked, &drop_tracked), keep(lost, &drop_lost))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(x: f32, y: f32, score: f32) -> Detection {
        Detection::new(x, y, x + 100.0, y + 100.0, score, 2)
    }

    #[test]
    fn test_ids_start_at_one_per_tracker() {
        let mut a = ByteTracker::new(TrackerConfig::default());
        let mut b = ByteTracker::new(TrackerConfig::default());
        assert_eq!(a.update(&[car(0.0, 0.0, 0.9)])[0].track_id, 1);
        assert_eq!(b.update(&[car(0.0, 0.0, 0.9)])[0].track_id, 1);
    }

    #[test]
    fn test_new_tracks_after_first_frame_need_confirmation() {
        let mut tracker = ByteTracker::new(TrackerConfig::default());
        assert!(tracker.update(&[]).is_empty());

        assert!(tracker.update(&[car(50.0, 50.0, 0.9)]).is_empty());
        let tracks = tracker.update(&[car(52.0, 52.0, 0.9)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].class_id, 2);
    }

    #[test]
    fn test_weak_first_detection_does_not_start_track() {
        let mut tracker = ByteTracker::new(TrackerConfig::default());
        assert!(tracker.update(&[car(0.0, 0.0, 0.55)]).is_empty());
    }

    #[test]
    fn test_class_change_starts_new_track() {
        let mut tracker = ByteTracker::new(TrackerConfig::default());
        let first = tracker.update(&[car(0.0, 0.0, 0.9)]);
        let id = first[0].track_id;

        let mut truck = car(2.0, 2.0, 0.9);
        truck.class_id = 7;
        tracker.update(&[truck.clone()]);
        let tracks = tracker.update(&[truck]);
        assert_eq!(tracks.len(), 1);
        assert_ne!(tracks[0].track_id, id);
        assert_eq!(tracks[0].class_id, 7);
    }

    #[test]
    fn test_lost_tracks_expire() {
        let config = TrackerConfig {
            track_buffer: 2,
            ..TrackerConfig::default()
        };
        let mut tracker = ByteTracker::new(config);
        let id = tracker.update(&[car(0.0, 0.0, 0.9)])[0].track_id;
        for _ in 0..4 {
            assert!(tracker.update(&[]).is_empty());
        }
        // Reappearing after expiry needs a fresh, confirmed track.
        assert!(tracker.update(&[car(0.0, 0.0, 0.9)]).is_empty());
        let tracks = tracker.update(&[car(0.0, 0.0, 0.9)]);
        assert_eq!(tracks.len(), 1);
        assert_ne!(tracks[0].track_id, id);
    }
}
