//! Pixel displacement to km/h conversion.

use super::crossing::CrossingLines;
use super::store::LineCrossing;

const MPS_TO_KMPH: f64 = 3.6;

/// Real-world calibration of the line pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Distance along the direction of travel between the two lines.
    pub real_distance_m: f64,
    pub lines: CrossingLines,
}

impl Calibration {
    pub fn new(real_distance_m: f64, lines: CrossingLines) -> Self {
        Self {
            real_distance_m,
            lines,
        }
    }

    /// Meters represented by one pixel row between the lines.
    pub fn meters_per_pixel(&self) -> f64 {
        self.real_distance_m / f64::from(self.lines.span())
    }
}

/// A computed speed for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedMeasurement {
    pub delta_pixels: i32,
    pub delta_frames: i64,
    pub speed_kmph: f64,
}

/// Converts entry/exit crossing pairs into speeds, assuming uniform linear
/// motion and no perspective correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedEstimator {
    fps: f64,
    meters_per_pixel: f64,
}

impl SpeedEstimator {
    pub fn new(fps: f64, calibration: &Calibration) -> Self {
        Self {
            fps,
            meters_per_pixel: calibration.meters_per_pixel(),
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn meters_per_pixel(&self) -> f64 {
        self.meters_per_pixel
    }

    /// Speed between two crossings, or `None` when the frame delta is not
    /// positive.
    pub fn estimate(&self, entry: &LineCrossing, exit: &LineCrossing) -> Option<SpeedMeasurement> {
        let delta_frames = exit.frame_index as i64 - entry.frame_index as i64;
        if delta_frames <= 0 {
            return None;
        }
        let delta_pixels = exit.position - entry.position;
        Some(SpeedMeasurement {
            delta_pixels,
            delta_frames,
            speed_kmph: speed_kmph(
                f64::from(delta_pixels),
                delta_frames as f64,
                self.fps,
                self.meters_per_pixel,
            ),
        })
    }
}

/// `(delta_pixels * meters_per_pixel) / (delta_frames / fps) * 3.6`
pub fn speed_kmph(delta_pixels: f64, delta_frames: f64, fps: f64, meters_per_pixel: f64) -> f64 {
    let distance_m = delta_pixels * meters_per_pixel;
    let time_s = delta_frames / fps;
    distance_m / time_s * MPS_TO_KMPH
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> SpeedEstimator {
        let lines = CrossingLines::new(330, 800).unwrap();
        SpeedEstimator::new(30.0, &Calibration::new(3.0, lines))
    }

    fn crossing(position: i32, frame_index: u64) -> LineCrossing {
        LineCrossing {
            position,
            frame_index,
        }
    }

    #[test]
    fn test_meters_per_pixel() {
        let mpp = estimator().meters_per_pixel();
        assert!((mpp - 3.0 / 470.0).abs() < 1e-12);
        assert!((mpp - 0.006383).abs() < 1e-6);
    }

    #[test]
    fn test_line_to_line_speed() {
        let measurement = estimator()
            .estimate(&crossing(330, 100), &crossing(800, 106))
            .unwrap();
        assert_eq!(measurement.delta_pixels, 470);
        assert_eq!(measurement.delta_frames, 6);
        assert!((measurement.speed_kmph - 54.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_frame_delta_is_skipped() {
        let estimator = estimator();
        assert!(estimator.estimate(&crossing(330, 10), &crossing(800, 10)).is_none());
        assert!(estimator.estimate(&crossing(330, 12), &crossing(800, 10)).is_none());
    }

    #[test]
    fn test_formula_is_deterministic() {
        let a = speed_kmph(235.0, 3.0, 25.0, 0.01);
        let b = speed_kmph(235.0, 3.0, 25.0, 0.01);
        assert_eq!(a, b);
        assert!((a - (235.0 * 0.01 / (3.0 / 25.0)) * 3.6).abs() < 1e-12);
    }
}
